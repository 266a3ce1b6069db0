//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir):
//!   Windows: %APPDATA%\speechos\
//!   macOS:   ~/Library/Application Support/speechos/
//!   Linux:   ~/.config/speechos/
//!
//! Files: `settings.toml` (client config), `voice.toml` (voice settings),
//! `commands.json` (voice-command registry).

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory that holds all persisted client state.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to `voice.toml`.
    pub voice_file: PathBuf,
    /// Full path to `commands.json`.
    pub commands_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "speechos";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let voice_file = config_dir.join("voice.toml");
        let commands_file = config_dir.join("commands.json");

        Self {
            config_dir,
            settings_file,
            voice_file,
            commands_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .voice_file
            .file_name()
            .is_some_and(|n| n == "voice.toml"));
        assert!(paths
            .commands_file
            .file_name()
            .is_some_and(|n| n == "commands.json"));
    }

    #[test]
    fn all_files_live_under_config_dir() {
        let paths = AppPaths::new();
        assert!(paths.settings_file.starts_with(&paths.config_dir));
        assert!(paths.voice_file.starts_with(&paths.config_dir));
        assert!(paths.commands_file.starts_with(&paths.config_dir));
    }
}
