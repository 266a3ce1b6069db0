//! Production [`VoiceBackend`] over NATS pub/sub.
//!
//! Audio frames are published on a per-session subject; transcript updates
//! are received on a matching subscription; edit, command and synthesis
//! calls use request-reply. The initial connection retries with exponential
//! backoff, reporting each attempt on the [`EventBus`] so UI consumers can
//! show reconnect progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, VoiceSettings};
use crate::events::{EventBus, SessionEvent};

use super::messages::{
    self, subjects, AudioFrameMessage, CommandRequest, CommandResponse, EditRequest, EditResponse,
    SessionStartRequest, SessionStartResponse, SessionStopRequest, SpeakRequest, SpeakResponse,
    TranscriptMessage,
};
use super::service::{
    BackendError, CommandOutcome, SynthesizedSpeech, TranscriptUpdate, VoiceBackend,
    VoiceSessionHandle, VoiceSessionOptions,
};

// ---------------------------------------------------------------------------
// ActiveSession
// ---------------------------------------------------------------------------

/// State of the one voice session a backend may have open.
struct ActiveSession {
    id: String,
    /// Sample rate negotiated at session start, stamped on every frame.
    sample_rate: u32,
    /// Sequence number of the next audio frame.
    sequence: u32,
    /// Forwards transcript messages to the session handle. Detached on
    /// stop (it exits once the handle's receiver is dropped); aborted on
    /// disconnect.
    forward_task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// NatsBackend
// ---------------------------------------------------------------------------

/// [`VoiceBackend`] implementation backed by a NATS connection.
///
/// Construct with [`NatsBackend::connect`]; the connection is shared by all
/// operations and `is_connected` is a lock-free flag check.
pub struct NatsBackend {
    client: async_nats::Client,
    events: EventBus,
    language: String,
    speaking_rate: f32,
    request_timeout: Duration,
    connected: AtomicBool,
    session: Mutex<Option<ActiveSession>>,
}

impl std::fmt::Debug for NatsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBackend")
            .field("language", &self.language)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl NatsBackend {
    /// Connect to the realtime server with exponential backoff.
    ///
    /// Attempts are bounded by `config.transport.reconnect_max_attempts`;
    /// the delay starts at `reconnect_initial_delay_ms` and doubles up to
    /// `reconnect_max_delay_ms`. Attempt number `n ≥ 2` emits
    /// [`SessionEvent::Reconnecting`]; success emits
    /// [`SessionEvent::Connected`].
    ///
    /// `token` is the transport token minted by the control plane; `None`
    /// connects unauthenticated (local/dev backends).
    ///
    /// # Errors
    ///
    /// [`BackendError::Connect`] with the last attempt's failure once the
    /// attempt budget is exhausted.
    pub async fn connect(
        config: &ClientConfig,
        voice: &VoiceSettings,
        token: Option<String>,
        events: EventBus,
    ) -> Result<Self, BackendError> {
        let transport = &config.transport;
        let connect_timeout = Duration::from_secs(transport.connect_timeout_secs);

        let mut delay = Duration::from_millis(transport.reconnect_initial_delay_ms);
        let max_delay = Duration::from_millis(transport.reconnect_max_delay_ms);
        let mut last_error = String::from("no connection attempt made");

        for attempt in 1..=transport.reconnect_max_attempts {
            if attempt > 1 {
                events.emit(SessionEvent::Reconnecting { attempt });
                log::info!(
                    "backend: reconnect attempt {attempt}/{} to {}",
                    transport.reconnect_max_attempts,
                    transport.server_url
                );
            }

            let options = match &token {
                Some(t) => async_nats::ConnectOptions::with_token(t.clone()),
                None => async_nats::ConnectOptions::new(),
            };

            match tokio::time::timeout(
                connect_timeout,
                options.connect(transport.server_url.as_str()),
            )
            .await
            {
                Ok(Ok(client)) => {
                    log::info!("backend: connected to {}", transport.server_url);
                    events.emit(SessionEvent::Connected);
                    return Ok(Self {
                        client,
                        events,
                        language: config.language.clone(),
                        speaking_rate: voice.speaking_rate,
                        request_timeout: Duration::from_secs(config.api.timeout_secs),
                        connected: AtomicBool::new(true),
                        session: Mutex::new(None),
                    });
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    log::warn!("backend: connection attempt {attempt} failed: {last_error}");
                }
                Err(_) => {
                    last_error = format!(
                        "connection attempt timed out after {}s",
                        transport.connect_timeout_secs
                    );
                    log::warn!("backend: {last_error}");
                }
            }

            if attempt < transport.reconnect_max_attempts {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }

        Err(BackendError::Connect(last_error))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// JSON request-reply with the configured timeout.
    async fn request<Req, Resp>(&self, subject: &str, req: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }

        let payload = serde_json::to_vec(req).map_err(|e| BackendError::Parse(e.to_string()))?;

        let reply = tokio::time::timeout(
            self.request_timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .map_err(|_| BackendError::Timeout)?
        .map_err(|e| BackendError::Transport(e.to_string()))?;

        serde_json::from_slice(&reply.payload).map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// Publish one audio frame for the open session.
    async fn publish_frame(
        &self,
        session_id: &str,
        sample_rate: u32,
        sequence: u32,
        samples: &[f32],
        last: bool,
    ) -> Result<(), BackendError> {
        let frame = AudioFrameMessage {
            session_id: session_id.to_string(),
            sequence,
            pcm: if samples.is_empty() {
                String::new()
            } else {
                messages::encode_pcm(samples)
            },
            sample_rate,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: last,
        };

        let payload =
            serde_json::to_vec(&frame).map_err(|e| BackendError::Parse(e.to_string()))?;

        self.client
            .publish(subjects::audio(session_id), payload.into())
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))
    }
}

#[async_trait]
impl VoiceBackend for NatsBackend {
    async fn start_voice_session(
        &self,
        opts: VoiceSessionOptions,
    ) -> Result<VoiceSessionHandle, BackendError> {
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }

        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(BackendError::Rejected(
                "a voice session is already open".into(),
            ));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let sample_rate = opts.sample_rate;

        let start: SessionStartResponse = self
            .request(
                subjects::SESSION_START,
                &SessionStartRequest {
                    session_id: session_id.clone(),
                    language: opts.language,
                    sample_rate,
                },
            )
            .await?;

        if !start.accepted {
            return Err(BackendError::Rejected(
                start.reason.unwrap_or_else(|| "session refused".into()),
            ));
        }

        let mut subscriber = self
            .client
            .subscribe(subjects::transcript(&session_id))
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<TranscriptUpdate>(32);
        let expected_id = session_id.clone();

        let forward_task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                    Ok(transcript) => {
                        if transcript.session_id != expected_id {
                            continue;
                        }
                        let update = TranscriptUpdate {
                            text: transcript.text,
                            is_final: !transcript.partial,
                        };
                        // Receiver dropped ⇒ the session is over.
                        if tx.send(update).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("backend: unparseable transcript message: {e}");
                    }
                }
            }
            log::debug!("backend: transcript forwarding stopped");
        });

        log::info!("backend: voice session {session_id} started");

        *session = Some(ActiveSession {
            id: session_id.clone(),
            sample_rate,
            sequence: 0,
            forward_task,
        });

        Ok(VoiceSessionHandle {
            session_id,
            transcripts: rx,
        })
    }

    async fn send_audio(&self, samples: &[f32], last: bool) -> Result<(), BackendError> {
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }

        let mut session = self.session.lock().await;
        let active = session.as_mut().ok_or(BackendError::NotConnected)?;

        let sequence = active.sequence;
        active.sequence += 1;
        let id = active.id.clone();
        let sample_rate = active.sample_rate;
        drop(session); // publish outside the lock

        self.publish_frame(&id, sample_rate, sequence, samples, last)
            .await
    }

    async fn stop_voice_session(&self) -> Result<(), BackendError> {
        let active = {
            let mut session = self.session.lock().await;
            match session.take() {
                Some(active) => active,
                None => return Ok(()), // nothing open — idempotent
            }
        };

        // Final empty frame tells the service the utterance is complete; the
        // forwarding task keeps running until the caller drops its handle,
        // so the final transcript still flows after this returns.
        self.publish_frame(&active.id, active.sample_rate, active.sequence, &[], true)
            .await?;

        self.request::<_, serde_json::Value>(
            subjects::SESSION_STOP,
            &SessionStopRequest {
                session_id: active.id.clone(),
            },
        )
        .await?;

        log::info!("backend: voice session {} stopped", active.id);
        Ok(())
    }

    async fn request_edit_text(
        &self,
        text: &str,
        instruction: &str,
    ) -> Result<String, BackendError> {
        let reply: EditResponse = self
            .request(
                subjects::EDIT,
                &EditRequest {
                    text: text.to_string(),
                    instruction: instruction.to_string(),
                    language: self.language.clone(),
                },
            )
            .await?;

        if let Some(error) = reply.error {
            return Err(BackendError::Rejected(error));
        }
        reply
            .text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BackendError::Parse("edit reply contained no text".into()))
    }

    async fn request_command(&self, transcript: &str) -> Result<CommandOutcome, BackendError> {
        let reply: CommandResponse = self
            .request(
                subjects::COMMAND,
                &CommandRequest {
                    transcript: transcript.to_string(),
                    language: self.language.clone(),
                },
            )
            .await?;

        Ok(CommandOutcome {
            command_id: reply.command_id,
            args: reply.args,
        })
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedSpeech, BackendError> {
        use base64::Engine;

        let reply: SpeakResponse = self
            .request(
                subjects::SPEAK,
                &SpeakRequest {
                    text: text.to_string(),
                    voice_id: voice_id.to_string(),
                    speaking_rate: self.speaking_rate,
                },
            )
            .await?;

        if let Some(error) = reply.error {
            return Err(BackendError::Rejected(error));
        }

        let encoded = reply
            .audio
            .ok_or_else(|| BackendError::Parse("synthesis reply contained no audio".into()))?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(SynthesizedSpeech {
            audio,
            sample_rate: reply.sample_rate,
        })
    }

    async fn disconnect(&self) -> Result<(), BackendError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(()); // already disconnected — idempotent
        }

        if let Some(active) = self.session.lock().await.take() {
            active.forward_task.abort();
        }

        // Flush any buffered frames before the connection goes away.
        if let Err(e) = self.client.flush().await {
            log::warn!("backend: flush on disconnect failed: {e}");
        }

        self.events
            .emit(SessionEvent::Disconnected { reason: None });
        log::info!("backend: disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
