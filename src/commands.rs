//! Voice-command definitions and transcript matching.
//!
//! [`CommandRegistry`] persists a list of [`CommandSpec`] records as JSON in
//! the platform-appropriate config directory:
//!
//! | Platform | Path |
//! |----------|------|
//! | Windows  | `%APPDATA%\speechos\commands.json` |
//! | macOS    | `~/Library/Application Support/speechos/commands.json` |
//! | Linux    | `~/.config/speechos/commands.json` |
//!
//! Records are validated on load: a spec with an empty id or no non-empty
//! phrase is dropped with a warning while the rest of the file is kept, so
//! one bad entry never disables every command.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// A single voice-command definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Stable identifier reported in `CommandMatched` events.
    pub id: String,
    /// Trigger phrases; matching is case-insensitive against the start of
    /// the transcript.
    pub phrases: Vec<String>,
    /// Human-readable description shown in settings UIs.
    pub description: String,
    /// Disabled specs are kept on disk but never matched.
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// CommandMatch
// ---------------------------------------------------------------------------

/// Result of matching a transcript against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMatch {
    /// Id of the matched [`CommandSpec`].
    pub command_id: String,
    /// Trailing transcript text after the matched phrase.
    pub args: String,
}

// ---------------------------------------------------------------------------
// Built-in commands
// ---------------------------------------------------------------------------

/// Default command set used when no `commands.json` exists yet.
pub fn builtin_commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            id: "new-line".into(),
            phrases: vec!["new line".into(), "next line".into()],
            description: "Insert a line break".into(),
            enabled: true,
        },
        CommandSpec {
            id: "new-paragraph".into(),
            phrases: vec!["new paragraph".into()],
            description: "Insert a paragraph break".into(),
            enabled: true,
        },
        CommandSpec {
            id: "delete-that".into(),
            phrases: vec!["delete that".into(), "scratch that".into()],
            description: "Delete the last inserted text".into(),
            enabled: true,
        },
        CommandSpec {
            id: "undo".into(),
            phrases: vec!["undo".into(), "undo that".into()],
            description: "Undo the last action".into(),
            enabled: true,
        },
    ]
}

// ---------------------------------------------------------------------------
// CommandRegistry
// ---------------------------------------------------------------------------

/// Manages voice-command definitions.
///
/// Specs are persisted to JSON after every [`add`](CommandRegistry::add)
/// call so user-defined commands survive restarts. An in-memory registry
/// (no path) is available for embedding and tests.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
    path: Option<PathBuf>,
}

impl CommandRegistry {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Load the registry from the platform config directory, or return the
    /// built-in command set when the file does not exist yet.
    pub fn load_or_default() -> Self {
        Self::load_from(AppPaths::new().commands_file)
    }

    /// Load from an explicit path (useful for tests). Missing file ⇒
    /// built-in commands.
    pub fn load_from(path: PathBuf) -> Self {
        let specs = if path.exists() {
            let data = std::fs::read_to_string(&path).unwrap_or_default();
            let parsed: Vec<CommandSpec> = serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("commands: unreadable commands.json ({e}) — using built-ins");
                builtin_commands()
            });
            Self::validated(parsed)
        } else {
            builtin_commands()
        };
        Self {
            specs,
            path: Some(path),
        }
    }

    /// Build a registry that is never persisted.
    pub fn in_memory(specs: Vec<CommandSpec>) -> Self {
        Self {
            specs: Self::validated(specs),
            path: None,
        }
    }

    /// Drop invalid specs, keeping the rest.
    fn validated(specs: Vec<CommandSpec>) -> Vec<CommandSpec> {
        specs
            .into_iter()
            .filter(|spec| {
                if spec.id.trim().is_empty() {
                    log::warn!("commands: dropping spec with empty id");
                    return false;
                }
                if !spec.phrases.iter().any(|p| !p.trim().is_empty()) {
                    log::warn!("commands: dropping spec {:?} with no usable phrase", spec.id);
                    return false;
                }
                true
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Add or replace a spec (matched by id), then persist to disk when the
    /// registry has a backing file.
    ///
    /// Invalid specs are rejected with a warning and the registry is left
    /// unchanged.
    pub fn add(&mut self, spec: CommandSpec) {
        if Self::validated(vec![spec.clone()]).is_empty() {
            return;
        }
        match self.specs.iter_mut().find(|s| s.id == spec.id) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        self.save();
    }

    // -----------------------------------------------------------------------
    // Matching
    // -----------------------------------------------------------------------

    /// Match `transcript` against all enabled specs.
    ///
    /// Matching is case-insensitive and anchored at the start of the
    /// trimmed transcript; when several phrases match, the longest one wins
    /// so `"new paragraph"` beats `"new"`. Returns the matched spec's id
    /// and the trailing transcript text.
    pub fn match_transcript(&self, transcript: &str) -> Option<CommandMatch> {
        let trimmed = transcript.trim();
        let lowered = trimmed.to_lowercase();

        let mut best: Option<(&CommandSpec, usize)> = None;

        for spec in self.specs.iter().filter(|s| s.enabled) {
            for phrase in &spec.phrases {
                let phrase = phrase.trim().to_lowercase();
                if phrase.is_empty() || !lowered.starts_with(&phrase) {
                    continue;
                }
                // Phrase must end on a word boundary.
                let boundary_ok = lowered.len() == phrase.len()
                    || lowered[phrase.len()..].starts_with(char::is_whitespace);
                if !boundary_ok {
                    continue;
                }
                if best.is_none_or(|(_, len)| phrase.len() > len) {
                    best = Some((spec, phrase.len()));
                }
            }
        }

        // Lowercasing may change byte lengths for non-ASCII transcripts, so
        // slice defensively rather than assuming index equivalence.
        best.map(|(spec, phrase_len)| CommandMatch {
            command_id: spec.id.clone(),
            args: trimmed
                .get(phrase_len..)
                .unwrap_or("")
                .trim()
                .to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All specs, including disabled ones.
    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    /// Total number of specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns `true` when there are no specs.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist to the backing file, if any. Write failures are logged and
    /// otherwise ignored — the in-memory registry stays usable.
    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("commands: could not create config dir: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(&self.specs) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("commands: could not write commands.json: {e}");
                }
            }
            Err(e) => log::warn!("commands: could not serialise specs: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
