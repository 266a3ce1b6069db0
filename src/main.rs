//! Terminal dictation demo — speechos.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load and validate [`ClientConfig`], [`VoiceSettings`] and the
//!    [`CommandRegistry`] (defaults on first run).
//! 3. Mint a transport token from the control plane (optional — local
//!    servers accept unauthenticated connections).
//! 4. Connect the [`NatsBackend`] with backoff.
//! 5. Spawn the [`DictationSession`] orchestrator and the event printer.
//! 6. Start the cpal microphone capture thread.
//! 7. Begin dictating; Ctrl-C stops the session and prints the final
//!    transcript.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;

use speechos::{
    audio::{downmix_to_mono, resample, AudioChunk, MicCapture},
    backend::{NatsBackend, SessionTokenProvider, VoiceBackend},
    commands::CommandRegistry,
    config::{ClientConfig, VoiceSettings},
    events::{EventBus, SessionEvent},
    session::{DictationSession, SessionCommand},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("speechos dictation demo starting up");

    // 2. Configuration
    let config = ClientConfig::load()
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            ClientConfig::default()
        })
        .validate();

    let voice = VoiceSettings::load().unwrap_or_else(|e| {
        log::warn!("Failed to load voice settings ({e}); using defaults");
        VoiceSettings::default()
    });

    let registry = CommandRegistry::load_or_default();
    let events = EventBus::default();

    // 3. Transport token (optional for local/dev servers)
    let token = match SessionTokenProvider::from_config(&config.api)
        .mint_token()
        .await
    {
        Ok(token) => Some(token),
        Err(e) => {
            log::warn!("Token minting failed ({e}); connecting unauthenticated");
            None
        }
    };

    // 4. Backend
    let backend = Arc::new(
        NatsBackend::connect(&config, &voice, token, events.clone()).await?,
    );

    // 5. Session orchestrator
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);

    let session = DictationSession::new(
        config.clone(),
        voice,
        registry,
        Arc::clone(&backend) as Arc<dyn VoiceBackend>,
        events.clone(),
        &command_tx,
    );
    let status = session.status();
    let capture_buf = session.capture_buffer();
    let recording = session.recording_flag();

    tokio::spawn(session.run(command_rx));

    // Event printer — partial transcripts overwrite the current line,
    // final transcripts commit it.
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match event {
                SessionEvent::PartialTranscript { text } => {
                    print!("\r{text}");
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
                SessionEvent::FinalTranscript { text } => {
                    println!("\r{text}");
                }
                SessionEvent::CommandMatched { command_id, args } => {
                    println!("[command] {command_id} {args}");
                }
                SessionEvent::SessionError { message } => {
                    eprintln!("error: {message}");
                }
                SessionEvent::Reconnecting { attempt } => {
                    eprintln!("reconnecting (attempt {attempt})…");
                }
                _ => {}
            }
        }
    });

    // 6. cpal microphone capture — converts chunks to the session's mono
    //    stream format and feeds the capture buffer while recording.
    let target_rate = config.audio.sample_rate;
    let _stream_handle = match MicCapture::new(config.audio.input_device.as_deref()) {
        Ok(capture) => {
            let source_channels = capture.channels();
            let (chunk_tx, chunk_rx) = std::sync::mpsc::channel::<AudioChunk>();

            let capture_buf = Arc::clone(&capture_buf);
            let recording = Arc::clone(&recording);
            std::thread::Builder::new()
                .name("audio-convert".into())
                .spawn(move || {
                    while let Ok(chunk) = chunk_rx.recv() {
                        if !recording.load(Ordering::SeqCst) {
                            continue;
                        }
                        let mono = downmix_to_mono(&chunk.samples, source_channels);
                        let converted = resample(&mono, chunk.sample_rate, target_rate);
                        capture_buf.lock().unwrap().push(&converted);
                    }
                })
                .expect("failed to spawn audio-convert thread");

            match capture.start(chunk_tx) {
                Ok(handle) => {
                    log::info!(
                        "Audio capture started ({} Hz, {} ch)",
                        capture.sample_rate(),
                        source_channels
                    );
                    Some(handle)
                }
                Err(e) => {
                    log::warn!("Failed to start audio stream: {e}");
                    None
                }
            }
        }
        Err(e) => {
            log::warn!("Audio capture unavailable: {e}");
            None
        }
    };

    // 7. Dictate until Ctrl-C.
    println!("Dictating — press Ctrl-C to finish.");
    command_tx.send(SessionCommand::Start).await?;

    tokio::signal::ctrl_c().await?;
    println!();
    command_tx.send(SessionCommand::Stop).await?;

    // Wait for the session to settle (final transcript or error).
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(15);
    loop {
        {
            let st = status.lock().unwrap();
            if !st.state.is_active() {
                if let Some(text) = &st.last_transcript {
                    println!("final transcript: {text}");
                }
                if let Some(error) = &st.error_message {
                    eprintln!("session ended with error: {error}");
                }
                break;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            log::warn!("session did not settle in time — exiting anyway");
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    backend.disconnect().await?;
    Ok(())
}
