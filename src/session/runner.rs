//! Session orchestrator — drives capture → backend streaming → events.
//!
//! [`DictationSession`] owns the [`SharedStatus`] and responds to
//! [`SessionCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Command flow
//!
//! ```text
//! SessionCommand::Start
//!   └─▶ Connecting → open backend session → clear buffer → Recording
//!         ├─ audio pump task: drain CaptureBuffer → send_audio
//!         │    → InputLevel events → auto-stop at max duration
//!         └─ transcript task: Partial/Final transcript events
//!
//! SessionCommand::Stop
//!   └─▶ stop pump → flush remainder → Processing
//!         → backend.stop_voice_session → await final transcript → Idle
//!
//! SessionCommand::Cancel
//!   └─▶ discard buffered audio, close session, → Idle
//!
//! EditText / RunCommand / Speak are request-reply side calls; they never
//! touch the recording lifecycle.
//! ```
//!
//! Backend failures surface as `SessionError` events and the `Error` state;
//! the next `Start` recovers. The orchestrator never panics on them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::{CaptureBuffer, InputLevels};
use crate::backend::{VoiceBackend, VoiceSessionOptions};
use crate::commands::CommandRegistry;
use crate::config::{ClientConfig, VoiceSettings};
use crate::events::{EventBus, SessionEvent};

use super::state::{SessionState, SharedStatus};

/// How often the audio pump drains the capture buffer.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// How long `Stop` waits for the final transcript before giving up.
const FINAL_TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// Everything a consumer can ask the session to do.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Open a voice session and begin streaming microphone audio.
    Start,
    /// Finish the utterance and wait for the final transcript.
    Stop,
    /// Abandon the utterance without requesting a transcript.
    Cancel,
    /// Rewrite `text` according to `instruction` via the backend.
    EditText { text: String, instruction: String },
    /// Resolve a command intent from a transcript.
    RunCommand { transcript: String },
    /// Synthesize speech for `text` with the configured voice.
    Speak { text: String },
}

// ---------------------------------------------------------------------------
// SharedCaptureBuffer
// ---------------------------------------------------------------------------

/// Thread-safe capture buffer shared between the audio callback thread and
/// the session orchestrator.
///
/// The capture thread pushes converted mono samples while the recording
/// flag is set; the audio pump drains it every [`PUMP_INTERVAL`].
pub type SharedCaptureBuffer = Arc<Mutex<CaptureBuffer>>;

// ---------------------------------------------------------------------------
// DictationSession
// ---------------------------------------------------------------------------

/// Drives the complete dictation lifecycle.
///
/// Create with [`DictationSession::new`], then call [`run`](Self::run)
/// inside a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use speechos::commands::CommandRegistry;
/// use speechos::config::{ClientConfig, VoiceSettings};
/// use speechos::events::EventBus;
/// use speechos::session::{DictationSession, SessionCommand};
///
/// # async fn example() {
/// # use speechos::backend::VoiceBackend;
/// # fn make_backend() -> Arc<dyn VoiceBackend> { unimplemented!() }
/// let config = ClientConfig::default();
/// let events = EventBus::default();
/// let (tx, rx) = tokio::sync::mpsc::channel::<SessionCommand>(16);
///
/// let session = DictationSession::new(
///     config,
///     VoiceSettings::default(),
///     CommandRegistry::in_memory(Vec::new()),
///     make_backend(),
///     events,
///     &tx,
/// );
/// let status = session.status();
/// tokio::spawn(session.run(rx));
///
/// tx.send(SessionCommand::Start).await.unwrap();
/// # }
/// ```
pub struct DictationSession {
    status: SharedStatus,
    events: EventBus,
    backend: Arc<dyn VoiceBackend>,
    capture: SharedCaptureBuffer,
    recording: Arc<AtomicBool>,
    registry: CommandRegistry,
    voice: VoiceSettings,
    config: ClientConfig,
    /// Lets the audio pump request an auto-stop without keeping the command
    /// channel alive.
    auto_stop: mpsc::WeakSender<SessionCommand>,
    pump_task: Option<JoinHandle<()>>,
    transcript_task: Option<JoinHandle<Option<String>>>,
}

impl DictationSession {
    /// Create a new session orchestrator.
    ///
    /// # Arguments
    ///
    /// * `config`     — validated client configuration.
    /// * `voice`      — persisted voice preferences (synthesis).
    /// * `registry`   — voice-command definitions for local matching.
    /// * `backend`    — speech-service transport (e.g. `NatsBackend`).
    /// * `events`     — bus the session publishes on.
    /// * `command_tx` — the sender side of the channel later passed to
    ///   [`run`](Self::run); only a weak reference is kept.
    pub fn new(
        config: ClientConfig,
        voice: VoiceSettings,
        registry: CommandRegistry,
        backend: Arc<dyn VoiceBackend>,
        events: EventBus,
        command_tx: &mpsc::Sender<SessionCommand>,
    ) -> Self {
        // Capacity for a full session plus one pump interval of slack.
        let capacity = (config.audio.sample_rate as usize)
            * (config.audio.max_session_secs as usize + 1);

        Self {
            status: super::state::new_shared_status(),
            events,
            backend,
            capture: Arc::new(Mutex::new(CaptureBuffer::new(capacity))),
            recording: Arc::new(AtomicBool::new(false)),
            registry,
            voice,
            config,
            auto_stop: command_tx.downgrade(),
            pump_task: None,
            transcript_task: None,
        }
    }

    /// Shared status snapshot, for polling consumers.
    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    /// Buffer the capture thread should push converted mono samples into.
    pub fn capture_buffer(&self) -> SharedCaptureBuffer {
        Arc::clone(&self.capture)
    }

    /// Flag the capture thread should check before pushing samples.
    pub fn recording_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.recording)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until `command_rx` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task. It never
    /// returns while the channel is open.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = command_rx.recv().await {
            match command {
                SessionCommand::Start => self.handle_start().await,
                SessionCommand::Stop => self.handle_stop().await,
                SessionCommand::Cancel => self.handle_cancel().await,
                SessionCommand::EditText { text, instruction } => {
                    self.handle_edit(text, instruction).await;
                }
                SessionCommand::RunCommand { transcript } => {
                    self.handle_run_command(transcript).await;
                }
                SessionCommand::Speak { text } => self.handle_speak(text).await,
            }
        }

        log::info!("session: command channel closed, orchestrator shutting down");

        // Tear down anything still running.
        self.recording.store(false, Ordering::SeqCst);
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }
        if let Err(e) = self.backend.stop_voice_session().await {
            log::warn!("session: shutdown stop failed: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Handle `Start`: open a backend session and begin streaming.
    async fn handle_start(&mut self) {
        if self.current_state().is_active() {
            log::warn!("session: start ignored — already active");
            return;
        }

        log::debug!("session: Start → Connecting");
        self.transition(SessionState::Connecting);
        {
            let mut st = self.status.lock().unwrap();
            st.partial_transcript = None;
            st.error_message = None;
            st.recorded_secs = 0.0;
            st.levels.clear();
        }

        // Fresh utterance: discard anything the capture thread pushed while
        // idle.
        self.capture.lock().unwrap().clear();

        let opts = VoiceSessionOptions {
            language: self.config.language.clone(),
            sample_rate: self.config.audio.sample_rate,
        };

        let handle = match self.backend.start_voice_session(opts).await {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(format!("could not start voice session: {e}"));
                return;
            }
        };

        log::debug!("session: backend session {} open", handle.session_id);

        // ── Transcript task ──────────────────────────────────────────────
        let mut transcripts = handle.transcripts;
        let status = Arc::clone(&self.status);
        let events = self.events.clone();

        self.transcript_task = Some(tokio::spawn(async move {
            while let Some(update) = transcripts.recv().await {
                if update.is_final {
                    {
                        let mut st = status.lock().unwrap();
                        st.last_transcript = Some(update.text.clone());
                        st.partial_transcript = None;
                    }
                    events.emit(SessionEvent::FinalTranscript {
                        text: update.text.clone(),
                    });
                    return Some(update.text);
                }

                {
                    let mut st = status.lock().unwrap();
                    st.partial_transcript = Some(update.text.clone());
                }
                events.emit(SessionEvent::PartialTranscript { text: update.text });
            }
            None
        }));

        // ── Audio pump task ──────────────────────────────────────────────
        self.recording.store(true, Ordering::SeqCst);

        let backend = Arc::clone(&self.backend);
        let capture = Arc::clone(&self.capture);
        let recording = Arc::clone(&self.recording);
        let status = Arc::clone(&self.status);
        let events = self.events.clone();
        let auto_stop = self.auto_stop.clone();
        let sample_rate = self.config.audio.sample_rate;
        let level_bars = self.config.audio.level_bars;
        let max_secs = self.config.audio.max_session_secs as f32;

        self.pump_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PUMP_INTERVAL);
            let mut total_samples: usize = 0;

            loop {
                ticker.tick().await;
                if !recording.load(Ordering::SeqCst) {
                    break;
                }

                let chunk: Vec<f32> = {
                    let mut buf = match capture.lock() {
                        Ok(buf) => buf,
                        Err(e) => {
                            Self::fail_shared(
                                &status,
                                &events,
                                format!("capture buffer lock poisoned: {e}"),
                            );
                            recording.store(false, Ordering::SeqCst);
                            break;
                        }
                    };
                    buf.take_all()
                };

                if chunk.is_empty() {
                    continue;
                }

                total_samples += chunk.len();
                let recorded_secs = total_samples as f32 / sample_rate as f32;

                if let Err(e) = backend.send_audio(&chunk, false).await {
                    Self::fail_shared(&status, &events, format!("audio streaming failed: {e}"));
                    recording.store(false, Ordering::SeqCst);
                    break;
                }

                let levels = InputLevels::compute(&chunk, level_bars);
                {
                    let mut st = status.lock().unwrap();
                    st.levels = levels.bars.clone();
                    st.recorded_secs = recorded_secs;
                }
                events.emit(SessionEvent::InputLevel { bars: levels.bars });

                if recorded_secs >= max_secs {
                    log::warn!(
                        "session: max duration of {max_secs}s reached — auto-stopping"
                    );
                    recording.store(false, Ordering::SeqCst);
                    if let Some(tx) = auto_stop.upgrade() {
                        let _ = tx.send(SessionCommand::Stop).await;
                    }
                    break;
                }
            }

            log::debug!("session: audio pump stopped");
        }));

        self.transition(SessionState::Recording);
    }

    /// Handle `Stop`: flush remaining audio, request the final transcript.
    async fn handle_stop(&mut self) {
        if self.current_state() != SessionState::Recording {
            log::warn!("session: stop ignored — not recording");
            return;
        }

        log::debug!("session: Stop → draining audio");

        // ── 1. Stop the pump and flush the remainder ─────────────────────
        self.recording.store(false, Ordering::SeqCst);
        if let Some(task) = self.pump_task.take() {
            if let Err(e) = task.await {
                log::warn!("session: audio pump task panicked: {e}");
            }
        }

        let remainder: Vec<f32> = self.capture.lock().unwrap().take_all();
        if !remainder.is_empty() {
            {
                let mut st = self.status.lock().unwrap();
                st.recorded_secs +=
                    remainder.len() as f32 / self.config.audio.sample_rate as f32;
            }
            if let Err(e) = self.backend.send_audio(&remainder, false).await {
                self.abort_transcript_task();
                self.fail(format!("audio streaming failed: {e}"));
                return;
            }
        }

        // ── 2. Too-short utterance guard ─────────────────────────────────
        let recorded_ms = {
            let st = self.status.lock().unwrap();
            st.recorded_secs * 1_000.0
        };
        if recorded_ms < self.config.audio.min_utterance_ms as f32 {
            self.abort_transcript_task();
            if let Err(e) = self.backend.stop_voice_session().await {
                log::warn!("session: stop after short utterance failed: {e}");
            }
            self.fail(format!(
                "utterance too short — {recorded_ms:.0} ms recorded, {} ms required",
                self.config.audio.min_utterance_ms
            ));
            return;
        }

        // ── 3. Ask the service to finalise ───────────────────────────────
        self.transition(SessionState::Processing);

        if let Err(e) = self.backend.stop_voice_session().await {
            self.abort_transcript_task();
            self.fail(format!("could not stop voice session: {e}"));
            return;
        }

        // ── 4. Wait (bounded) for the final transcript ───────────────────
        if let Some(mut task) = self.transcript_task.take() {
            match tokio::time::timeout(FINAL_TRANSCRIPT_TIMEOUT, &mut task).await {
                Ok(Ok(Some(text))) => {
                    log::debug!("session: final transcript ({} chars)", text.len());
                }
                Ok(Ok(None)) => {
                    log::warn!("session: transcript stream ended without a final transcript");
                }
                Ok(Err(e)) => {
                    log::warn!("session: transcript task panicked: {e}");
                }
                Err(_) => {
                    log::warn!(
                        "session: no final transcript within {FINAL_TRANSCRIPT_TIMEOUT:?}"
                    );
                    task.abort();
                }
            }
        }

        // ── 5. Finalise state ────────────────────────────────────────────
        {
            let mut st = self.status.lock().unwrap();
            st.partial_transcript = None;
            st.levels.clear();
        }
        self.transition(SessionState::Idle);
    }

    /// Handle `Cancel`: abandon the utterance without a transcript.
    async fn handle_cancel(&mut self) {
        if !self.current_state().is_active() {
            log::warn!("session: cancel ignored — no active session");
            return;
        }

        log::debug!("session: Cancel");

        self.recording.store(false, Ordering::SeqCst);
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        self.abort_transcript_task();
        self.capture.lock().unwrap().clear();

        if let Err(e) = self.backend.stop_voice_session().await {
            log::warn!("session: stop on cancel failed: {e}");
        }

        {
            let mut st = self.status.lock().unwrap();
            st.partial_transcript = None;
            st.levels.clear();
        }
        self.transition(SessionState::Idle);
    }

    /// Handle `EditText`: backend round trip with raw-text fallback.
    async fn handle_edit(&mut self, text: String, instruction: String) {
        if matches!(
            self.current_state(),
            SessionState::Recording | SessionState::Processing
        ) {
            log::warn!("session: edit ignored while an utterance is in flight");
            return;
        }

        match self.backend.request_edit_text(&text, &instruction).await {
            Ok(edited) => {
                log::debug!("session: edit completed ({} chars)", edited.len());
                self.events.emit(SessionEvent::EditCompleted { text: edited });
            }
            Err(e) => {
                // Graceful fallback — the consumer gets its text back
                // unchanged rather than an error.
                log::warn!("session: edit failed ({e}), returning original text");
                self.events.emit(SessionEvent::EditCompleted { text });
            }
        }
    }

    /// Handle `RunCommand`: local registry match first, backend second.
    async fn handle_run_command(&mut self, transcript: String) {
        if let Some(matched) = self.registry.match_transcript(&transcript) {
            log::debug!("session: local command match: {}", matched.command_id);
            self.events.emit(SessionEvent::CommandMatched {
                command_id: matched.command_id,
                args: matched.args,
            });
            return;
        }

        match self.backend.request_command(&transcript).await {
            Ok(outcome) => match outcome.command_id {
                Some(command_id) => {
                    log::debug!("session: backend command match: {command_id}");
                    self.events.emit(SessionEvent::CommandMatched {
                        command_id,
                        args: outcome.args,
                    });
                }
                None => {
                    log::debug!("session: no command intent in transcript");
                }
            },
            Err(e) => {
                log::warn!("session: command resolution failed: {e}");
            }
        }
    }

    /// Handle `Speak`: synthesize with the configured voice.
    async fn handle_speak(&mut self, text: String) {
        let voice = self.voice.resolve_voice();

        match self.backend.synthesize(&text, voice.id).await {
            Ok(speech) => {
                self.events.emit(SessionEvent::SpeechSynthesized {
                    audio: speech.audio,
                    sample_rate: speech.sample_rate,
                    voice_id: voice.id.to_string(),
                });
            }
            Err(e) => {
                log::warn!("session: synthesis failed: {e}");
                self.events.emit(SessionEvent::SessionError {
                    message: format!("speech synthesis failed: {e}"),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn current_state(&self) -> SessionState {
        self.status.lock().unwrap().state
    }

    /// Move to `to`, emitting `StateChanged` unless already there.
    fn transition(&self, to: SessionState) {
        let from = {
            let mut st = self.status.lock().unwrap();
            let from = st.state;
            st.state = to;
            from
        };
        if from != to {
            self.events.emit(SessionEvent::StateChanged { from, to });
        }
    }

    /// Enter the `Error` state with `message` and emit `SessionError`.
    fn fail(&self, message: String) {
        Self::fail_shared(&self.status, &self.events, message);
    }

    /// Static variant of [`fail`](Self::fail) usable from spawned tasks.
    fn fail_shared(status: &SharedStatus, events: &EventBus, message: String) {
        let from = {
            let mut st = status.lock().unwrap();
            let from = st.state;
            st.state = SessionState::Error;
            st.error_message = Some(message.clone());
            from
        };
        if from != SessionState::Error {
            events.emit(SessionEvent::StateChanged {
                from,
                to: SessionState::Error,
            });
        }
        events.emit(SessionEvent::SessionError {
            message: message.clone(),
        });
        log::error!("session error: {message}");
    }

    fn abort_transcript_task(&mut self) {
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockBackend, TranscriptUpdate};
    use crate::commands::CommandSpec;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Transcripts every happy-path session delivers.
    fn scripted_transcripts() -> Vec<TranscriptUpdate> {
        vec![
            TranscriptUpdate {
                text: "hello".into(),
                is_final: false,
            },
            TranscriptUpdate {
                text: "hello world".into(),
                is_final: true,
            },
        ]
    }

    /// 1 second of quiet noise at 16 kHz — passes the min-utterance check.
    fn one_second_of_audio() -> Vec<f32> {
        vec![0.01_f32; 16_000]
    }

    struct Harness {
        tx: mpsc::Sender<SessionCommand>,
        status: SharedStatus,
        capture: SharedCaptureBuffer,
        events: EventBus,
        backend: Arc<MockBackend>,
        runner: JoinHandle<()>,
    }

    fn spawn_session(backend: MockBackend) -> Harness {
        spawn_session_with(backend, ClientConfig::default().validate(), Vec::new())
    }

    fn spawn_session_with(
        backend: MockBackend,
        config: ClientConfig,
        specs: Vec<CommandSpec>,
    ) -> Harness {
        let backend = Arc::new(backend);
        let events = EventBus::new(64);
        let (tx, rx) = mpsc::channel(16);

        let session = DictationSession::new(
            config,
            VoiceSettings::default(),
            CommandRegistry::in_memory(specs),
            Arc::clone(&backend) as Arc<dyn VoiceBackend>,
            events.clone(),
            &tx,
        );
        let status = session.status();
        let capture = session.capture_buffer();
        let runner = tokio::spawn(session.run(rx));

        Harness {
            tx,
            status,
            capture,
            events,
            backend,
            runner,
        }
    }

    /// Poll `status` until it reaches `want` or the timeout elapses.
    async fn wait_for_state(status: &SharedStatus, want: SessionState, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if status.lock().unwrap().state == want {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "state never reached {want:?}; currently {:?}",
                    status.lock().unwrap().state
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `Start` should move the session to `Recording`.
    #[tokio::test]
    async fn start_reaches_recording_state() {
        let h = spawn_session(MockBackend::with_transcripts(scripted_transcripts()));

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// Full start → audio → stop cycle ends `Idle` with the final transcript.
    #[tokio::test]
    async fn full_cycle_reaches_idle_with_final_transcript() {
        let h = spawn_session(MockBackend::with_transcripts(scripted_transcripts()));

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;

        h.capture.lock().unwrap().push(&one_second_of_audio());
        // Give the pump a tick to stream the chunk.
        tokio::time::sleep(Duration::from_millis(150)).await;

        h.tx.send(SessionCommand::Stop).await.unwrap();
        wait_for_state(&h.status, SessionState::Idle, Duration::from_secs(2)).await;

        let st = h.status.lock().unwrap();
        assert_eq!(st.last_transcript.as_deref(), Some("hello world"));
        assert!(st.partial_transcript.is_none());
        assert!(st.recorded_secs >= 0.9);
        drop(st);

        assert!(h.backend.frames_sent.load(Ordering::SeqCst) >= 1);
        assert_eq!(h.backend.stops.load(Ordering::SeqCst), 1);

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// A failing backend start must surface as the `Error` state, not a
    /// panic.
    #[tokio::test]
    async fn backend_start_failure_sets_error_state() {
        let h = spawn_session(MockBackend::failing());

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Error, Duration::from_secs(1)).await;

        assert!(h.status.lock().unwrap().error_message.is_some());

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// `Stop` without a recording must be a warning no-op.
    #[tokio::test]
    async fn stop_without_recording_is_noop() {
        let h = spawn_session(MockBackend::with_transcripts(Vec::new()));

        h.tx.send(SessionCommand::Stop).await.unwrap();
        settle().await;

        assert_eq!(h.status.lock().unwrap().state, SessionState::Idle);
        assert_eq!(h.backend.stops.load(Ordering::SeqCst), 0);

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// A second `Start` while recording must be ignored.
    #[tokio::test]
    async fn start_while_recording_is_noop() {
        let h = spawn_session(MockBackend::with_transcripts(scripted_transcripts()));

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;
        h.tx.send(SessionCommand::Start).await.unwrap();
        settle().await;

        assert_eq!(h.status.lock().unwrap().state, SessionState::Recording);

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// Stopping with almost no audio recorded must enter `Error`.
    #[tokio::test]
    async fn too_short_utterance_sets_error() {
        let h = spawn_session(MockBackend::with_transcripts(scripted_transcripts()));

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;

        // 800 samples at 16 kHz = 50 ms, well below the 500 ms default.
        h.capture.lock().unwrap().push(&vec![0.01_f32; 800]);
        h.tx.send(SessionCommand::Stop).await.unwrap();
        wait_for_state(&h.status, SessionState::Error, Duration::from_secs(2)).await;

        let st = h.status.lock().unwrap();
        assert!(st
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("too short")));

        drop(st);
        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// `Cancel` discards the utterance and returns to `Idle`.
    #[tokio::test]
    async fn cancel_returns_to_idle_without_transcript() {
        let h = spawn_session(MockBackend::with_transcripts(Vec::new()));

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;

        h.capture.lock().unwrap().push(&one_second_of_audio());
        h.tx.send(SessionCommand::Cancel).await.unwrap();
        wait_for_state(&h.status, SessionState::Idle, Duration::from_secs(1)).await;

        let st = h.status.lock().unwrap();
        assert!(st.last_transcript.is_none());
        drop(st);
        assert!(h.capture.lock().unwrap().is_empty());

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// A session may be restarted after an error.
    #[tokio::test]
    async fn error_state_recovers_on_next_start() {
        let h = spawn_session(MockBackend::with_transcripts(scripted_transcripts()));

        // Force an error with a too-short utterance…
        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;
        h.tx.send(SessionCommand::Stop).await.unwrap();
        wait_for_state(&h.status, SessionState::Error, Duration::from_secs(2)).await;

        // …then start again.
        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;
        assert!(h.status.lock().unwrap().error_message.is_none());

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// The pump must auto-stop once the configured max duration is reached.
    #[tokio::test]
    async fn auto_stop_at_max_duration() {
        let mut config = ClientConfig::default().validate();
        config.audio.max_session_secs = 1;

        let h = spawn_session_with(
            MockBackend::with_transcripts(scripted_transcripts()),
            config,
            Vec::new(),
        );

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;

        // 1.5 s of audio — over the 1 s limit in a single pump drain.
        h.capture.lock().unwrap().push(&vec![0.01_f32; 24_000]);
        wait_for_state(&h.status, SessionState::Idle, Duration::from_secs(3)).await;

        assert_eq!(h.backend.stops.load(Ordering::SeqCst), 1);

        drop(h.tx);
        h.runner.await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Recording emits partial transcripts and input levels on the bus.
    #[tokio::test]
    async fn recording_emits_partial_and_level_events() {
        let h = spawn_session(MockBackend::with_transcripts(scripted_transcripts()));
        let mut rx = h.events.subscribe();

        h.tx.send(SessionCommand::Start).await.unwrap();
        wait_for_state(&h.status, SessionState::Recording, Duration::from_secs(1)).await;
        h.capture.lock().unwrap().push(&one_second_of_audio());
        tokio::time::sleep(Duration::from_millis(150)).await;
        h.tx.send(SessionCommand::Stop).await.unwrap();
        wait_for_state(&h.status, SessionState::Idle, Duration::from_secs(2)).await;

        let mut saw_partial = false;
        let mut saw_levels = false;
        let mut saw_final = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::PartialTranscript { .. } => saw_partial = true,
                SessionEvent::InputLevel { bars } => {
                    saw_levels = true;
                    assert!(!bars.is_empty());
                }
                SessionEvent::FinalTranscript { text } => {
                    saw_final = true;
                    assert_eq!(text, "hello world");
                }
                _ => {}
            }
        }
        assert!(saw_partial, "no PartialTranscript event seen");
        assert!(saw_levels, "no InputLevel event seen");
        assert!(saw_final, "no FinalTranscript event seen");

        drop(h.tx);
        h.runner.await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Edit / command / speak
    // -----------------------------------------------------------------------

    /// A successful edit emits the edited text.
    #[tokio::test]
    async fn edit_emits_edited_text() {
        let h = spawn_session(
            MockBackend::with_transcripts(Vec::new())
                .with_edit_reply(Ok("Hello, world!".into())),
        );
        let mut rx = h.events.subscribe();

        h.tx.send(SessionCommand::EditText {
            text: "hello world".into(),
            instruction: "add punctuation".into(),
        })
        .await
        .unwrap();
        settle().await;

        let mut edited = None;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::EditCompleted { text } = event {
                edited = Some(text);
            }
        }
        assert_eq!(edited.as_deref(), Some("Hello, world!"));

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// When the backend edit fails, the original text comes back unchanged
    /// — the session must NOT crash or enter `Error`.
    #[tokio::test]
    async fn edit_failure_falls_back_to_original_text() {
        let h = spawn_session(
            MockBackend::with_transcripts(Vec::new())
                .with_edit_reply(Err(BackendError::Timeout)),
        );
        let mut rx = h.events.subscribe();

        h.tx.send(SessionCommand::EditText {
            text: "keep me".into(),
            instruction: "rewrite".into(),
        })
        .await
        .unwrap();
        settle().await;

        let mut edited = None;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::EditCompleted { text } = event {
                edited = Some(text);
            }
        }
        assert_eq!(edited.as_deref(), Some("keep me"));
        assert_eq!(h.status.lock().unwrap().state, SessionState::Idle);

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// A transcript matching a registry phrase resolves locally, without a
    /// backend round trip.
    #[tokio::test]
    async fn command_matches_local_registry_first() {
        let specs = vec![CommandSpec {
            id: "insert-date".into(),
            phrases: vec!["insert the date".into()],
            description: "Insert today's date".into(),
            enabled: true,
        }];
        let h = spawn_session_with(
            MockBackend::with_transcripts(Vec::new()),
            ClientConfig::default().validate(),
            specs,
        );
        let mut rx = h.events.subscribe();

        h.tx.send(SessionCommand::RunCommand {
            transcript: "Insert the date in ISO format".into(),
        })
        .await
        .unwrap();
        settle().await;

        let mut matched = None;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::CommandMatched { command_id, args } = event {
                matched = Some((command_id, args));
            }
        }
        let (command_id, args) = matched.expect("no CommandMatched event");
        assert_eq!(command_id, "insert-date");
        assert_eq!(args, "in ISO format");

        drop(h.tx);
        h.runner.await.unwrap();
    }

    /// `Speak` emits synthesized speech with the configured voice.
    #[tokio::test]
    async fn speak_emits_synthesized_speech() {
        let h = spawn_session(MockBackend::with_transcripts(Vec::new()));
        let mut rx = h.events.subscribe();

        h.tx.send(SessionCommand::Speak {
            text: "read this aloud".into(),
        })
        .await
        .unwrap();
        settle().await;

        let mut seen = false;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::SpeechSynthesized {
                audio,
                sample_rate,
                voice_id,
            } = event
            {
                seen = true;
                assert!(!audio.is_empty());
                assert_eq!(sample_rate, 24_000);
                assert_eq!(voice_id, crate::config::DEFAULT_VOICE_ID);
            }
        }
        assert!(seen, "no SpeechSynthesized event seen");

        drop(h.tx);
        h.runner.await.unwrap();
    }
}
