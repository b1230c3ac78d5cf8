//! Per-call session orchestrator
//!
//! One `SessionBridge` owns the full lifecycle of a call: it connects the
//! speech-agent peer (behind the circuit breaker), translates audio in both
//! directions, enforces barge-in semantics, dispatches function calls, and
//! hands the call summary to the sink at teardown.
//!
//! The bridge runs as a single task selecting over both peers' channels, so
//! the speaking/interrupted flags are never raced. Every termination path
//! funnels through one teardown routine that flushes the audio buffer and
//! stores the summary exactly once.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use callbridge_config::Settings;
use callbridge_core::{codec, resample::resample, ChunkBuffer, ConversationTracker, TurnRole};
use callbridge_tools::FunctionDispatcher;

use crate::agent::{AgentCommand, AgentEvent, SettingsBody};
use crate::breaker::CircuitBreaker;
use crate::client::{AgentChannels, AgentConnector};
use crate::summary::SummarySink;
use crate::telephony::{MediaPayload, StartMeta, TransportCommand, TransportEvent, TransportFrame};

/// Session lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Session object exists, no transport stream yet.
    Idle,
    /// Transport start received, agent connection in progress.
    Streaming,
    /// Agent connected and configured, audio flowing.
    Active,
    Ended,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Clean stop event from the transport. Not an error.
    Stopped,
    TransportClosed,
    AgentClosed,
    ReceiveTimeout,
    ErrorBudgetExceeded,
    /// Breaker open or bounded retry exhausted.
    AgentUnavailable,
    AuthRejected,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Stopped => "stopped",
            EndReason::TransportClosed => "transport_closed",
            EndReason::AgentClosed => "agent_closed",
            EndReason::ReceiveTimeout => "receive_timeout",
            EndReason::ErrorBudgetExceeded => "error_budget_exceeded",
            EndReason::AgentUnavailable => "agent_unavailable",
            EndReason::AuthRejected => "auth_rejected",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the event loop should do after handling one event.
enum Flow {
    Continue,
    /// Agent connection established; start selecting on its events.
    AgentAttached(mpsc::Receiver<AgentEvent>),
}

/// Bridge between one telephony stream and one speech-agent connection.
pub struct SessionBridge {
    call_id: String,
    settings: Arc<Settings>,
    connector: Arc<dyn AgentConnector>,
    breaker: Arc<CircuitBreaker>,
    dispatcher: Arc<FunctionDispatcher>,
    sink: Arc<dyn SummarySink>,
    transport_tx: mpsc::Sender<TransportCommand>,
    agent_tx: Option<mpsc::Sender<AgentCommand>>,

    stage: Stage,
    stream_sid: Option<String>,
    call_sid: Option<String>,
    mark_counter: u64,
    agent_speaking: bool,
    interrupted: bool,
    /// Name of the last sent playback marker, cleared once acknowledged or
    /// superseded by newer agent audio. Stale acks must not touch the
    /// speaking flag.
    pending_mark: Option<String>,
    consecutive_errors: u32,
    buffer: ChunkBuffer,
    tracker: ConversationTracker,
}

impl SessionBridge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        call_id: impl Into<String>,
        settings: Arc<Settings>,
        connector: Arc<dyn AgentConnector>,
        breaker: Arc<CircuitBreaker>,
        dispatcher: Arc<FunctionDispatcher>,
        sink: Arc<dyn SummarySink>,
        transport_tx: mpsc::Sender<TransportCommand>,
    ) -> Self {
        let buffer = ChunkBuffer::new(
            settings.audio.chunk_target_bytes(),
            Duration::from_millis(settings.audio.max_buffer_delay_ms),
        );
        Self {
            call_id: call_id.into(),
            settings,
            connector,
            breaker,
            dispatcher,
            sink,
            transport_tx,
            agent_tx: None,
            stage: Stage::Idle,
            stream_sid: None,
            call_sid: None,
            mark_counter: 0,
            agent_speaking: false,
            interrupted: false,
            pending_mark: None,
            consecutive_errors: 0,
            buffer,
            tracker: ConversationTracker::new(),
        }
    }

    /// Drive the session to completion.
    ///
    /// Returns after teardown; the summary has been handed to the sink.
    pub async fn run(mut self, mut transport_rx: mpsc::Receiver<TransportFrame>) {
        let reason = self.event_loop(&mut transport_rx).await;
        self.teardown(reason).await;
    }

    async fn event_loop(
        &mut self,
        transport_rx: &mut mpsc::Receiver<TransportFrame>,
    ) -> EndReason {
        let mut agent_events: Option<mpsc::Receiver<AgentEvent>> = None;
        let receive_timeout = Duration::from_secs(self.settings.agent.receive_timeout_secs);

        loop {
            // Rolling deadline: every inbound message restarts the clock.
            let idle = tokio::time::sleep(receive_timeout);
            tokio::pin!(idle);

            let step = tokio::select! {
                frame = transport_rx.recv() => match frame {
                    Some(frame) => self.on_transport_frame(frame).await,
                    None => Err(EndReason::TransportClosed),
                },
                event = next_agent_event(&mut agent_events) => match event {
                    Some(event) => self.on_agent_event(event).await,
                    None => Err(EndReason::AgentClosed),
                },
                _ = &mut idle => Err(EndReason::ReceiveTimeout),
            };

            match step {
                Ok(Flow::Continue) => {}
                Ok(Flow::AgentAttached(events)) => agent_events = Some(events),
                Err(reason) => return reason,
            }
        }
    }

    async fn on_transport_frame(&mut self, frame: TransportFrame) -> Result<Flow, EndReason> {
        let event = match frame {
            TransportFrame::Event(event) => event,
            TransportFrame::Malformed(detail) => {
                warn!(call_id = %self.call_id, %detail, "Malformed transport frame");
                return self.count_error();
            }
        };
        // Media frames reset the error budget only after their payload
        // decodes, so consecutive bad payloads stay consecutive.
        if !matches!(event, TransportEvent::Media { .. }) {
            self.consecutive_errors = 0;
        }

        match event {
            TransportEvent::Connected => {
                debug!(call_id = %self.call_id, "Transport connected");
                Ok(Flow::Continue)
            }
            TransportEvent::Start { start } => self.on_start(start).await,
            TransportEvent::Media { media } => self.on_media(media).await,
            TransportEvent::Stop => {
                info!(call_id = %self.call_id, "Transport stop");
                Err(EndReason::Stopped)
            }
            TransportEvent::Mark { mark } => {
                if self.pending_mark.as_deref() == Some(mark.name.as_str()) {
                    debug!(call_id = %self.call_id, name = %mark.name, "Playback mark acknowledged");
                    self.agent_speaking = false;
                    self.pending_mark = None;
                } else {
                    debug!(call_id = %self.call_id, name = %mark.name, "Stale playback mark ignored");
                }
                Ok(Flow::Continue)
            }
            TransportEvent::Unknown => {
                debug!(call_id = %self.call_id, "Unhandled transport event");
                Ok(Flow::Continue)
            }
        }
    }

    async fn on_start(&mut self, start: StartMeta) -> Result<Flow, EndReason> {
        if self.stage != Stage::Idle {
            warn!(call_id = %self.call_id, "Duplicate start event ignored");
            return Ok(Flow::Continue);
        }
        info!(
            call_id = %self.call_id,
            stream_sid = %start.stream_sid,
            call_sid = %start.call_sid,
            "Stream started"
        );
        self.stream_sid = Some(start.stream_sid);
        self.call_sid = Some(start.call_sid);
        self.stage = Stage::Streaming;
        self.connect_agent().await
    }

    /// Connect the speech-agent peer, gated by the breaker, with bounded
    /// retry and exponential backoff for recoverable failures.
    async fn connect_agent(&mut self) -> Result<Flow, EndReason> {
        if !self.breaker.can_execute() {
            warn!(call_id = %self.call_id, "Agent connect short-circuited by open breaker");
            return Err(EndReason::AgentUnavailable);
        }

        let max_attempts = self.settings.agent.max_connect_attempts;
        let mut backoff = Duration::from_millis(self.settings.agent.initial_backoff_ms);

        for attempt in 1..=max_attempts {
            match self.connector.connect(&self.call_id).await {
                Ok(channels) => {
                    self.breaker.record_success();
                    return self.configure_agent(channels).await;
                }
                Err(e) if !e.is_recoverable() => {
                    error!(call_id = %self.call_id, error = %e, "Agent rejected credentials");
                    return Err(EndReason::AuthRejected);
                }
                Err(e) => {
                    warn!(call_id = %self.call_id, attempt, error = %e, "Agent connect failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        self.breaker.record_failure();
        Err(EndReason::AgentUnavailable)
    }

    async fn configure_agent(&mut self, channels: AgentChannels) -> Result<Flow, EndReason> {
        let body = SettingsBody::new(
            &self.settings.agent,
            &self.settings.audio,
            self.dispatcher.schemas(),
        );
        channels
            .commands
            .send(AgentCommand::Settings(body))
            .await
            .map_err(|_| EndReason::AgentClosed)?;

        self.agent_tx = Some(channels.commands);
        self.stage = Stage::Active;
        info!(call_id = %self.call_id, "Session active");
        Ok(Flow::AgentAttached(channels.events))
    }

    /// Caller audio: companded bytes in, buffered PCM16 out to the agent.
    async fn on_media(&mut self, media: MediaPayload) -> Result<Flow, EndReason> {
        let mulaw = match BASE64.decode(media.payload.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(call_id = %self.call_id, error = %e, "Undecodable media payload");
                return self.count_error();
            }
        };
        self.consecutive_errors = 0;

        let pcm = codec::decode(&mulaw);
        let pcm = convert_rate(
            pcm,
            self.settings.audio.telephony_rate,
            self.settings.audio.agent_rate,
        );

        if let Some(chunk) = self.buffer.add(&pcm) {
            self.send_agent(AgentCommand::AudioData {
                audio: BASE64.encode(&chunk),
            })
            .await?;
        }
        Ok(Flow::Continue)
    }

    async fn on_agent_event(&mut self, event: AgentEvent) -> Result<Flow, EndReason> {
        match event {
            AgentEvent::Welcome => {
                debug!(call_id = %self.call_id, "Agent welcome");
            }
            AgentEvent::SettingsApplied => {
                debug!(call_id = %self.call_id, "Agent settings applied");
            }
            AgentEvent::UserStartedSpeaking => {
                if self.agent_speaking {
                    info!(call_id = %self.call_id, "Barge-in detected");
                    self.interrupted = true;
                    self.tracker.record_interruption();
                    if let Some(sid) = self.stream_sid.clone() {
                        self.send_transport(TransportCommand::clear(sid)).await?;
                    }
                }
            }
            AgentEvent::UtteranceEnd => {
                self.interrupted = false;
            }
            AgentEvent::ConversationAudio { audio } => {
                return self.on_agent_audio(audio).await;
            }
            AgentEvent::ConversationText { role, content } => {
                let role = if role == "user" {
                    TurnRole::Caller
                } else {
                    TurnRole::Agent
                };
                self.tracker.add_turn(role, content, self.interrupted);
            }
            AgentEvent::FunctionCallRequest {
                function_call_id,
                function_name,
                arguments,
            } => {
                return self
                    .on_function_call(function_call_id, function_name, arguments)
                    .await;
            }
            AgentEvent::AgentAudioDone => {
                self.agent_speaking = false;
                self.mark_counter += 1;
                let name = format!("agent-audio-{}", self.mark_counter);
                self.pending_mark = Some(name.clone());
                if let Some(sid) = self.stream_sid.clone() {
                    self.send_transport(TransportCommand::mark(sid, name)).await?;
                }
            }
            AgentEvent::Error { description } => {
                warn!(call_id = %self.call_id, %description, "Agent reported an error");
            }
            AgentEvent::Unknown => {
                debug!(call_id = %self.call_id, "Unhandled agent event");
            }
        }
        Ok(Flow::Continue)
    }

    /// Agent audio: PCM16 in, companded bytes out to the transport.
    ///
    /// Dropped outright while a barge-in is in progress so the agent never
    /// talks over the caller.
    async fn on_agent_audio(&mut self, audio: String) -> Result<Flow, EndReason> {
        if self.interrupted {
            debug!(call_id = %self.call_id, "Suppressing agent audio during barge-in");
            return Ok(Flow::Continue);
        }

        let pcm = match BASE64.decode(audio.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(call_id = %self.call_id, error = %e, "Undecodable agent audio");
                return self.count_error();
            }
        };
        self.consecutive_errors = 0;

        let pcm = convert_rate(
            pcm,
            self.settings.audio.agent_rate,
            self.settings.audio.telephony_rate,
        );
        let mulaw = codec::encode(&pcm);

        self.agent_speaking = true;
        // New playback supersedes any marker still awaiting acknowledgement.
        self.pending_mark = None;
        if let Some(sid) = self.stream_sid.clone() {
            self.send_transport(TransportCommand::media(sid, BASE64.encode(&mulaw)))
                .await?;
        }
        Ok(Flow::Continue)
    }

    /// Dispatch a function call and reply before the next agent event is
    /// consumed. Transport frames keep queuing meanwhile.
    async fn on_function_call(
        &mut self,
        function_call_id: String,
        name: String,
        arguments: Value,
    ) -> Result<Flow, EndReason> {
        info!(call_id = %self.call_id, function = %name, "Function call requested");

        let outcome = self.dispatcher.dispatch(&name, arguments).await;
        if let Some(facts) = outcome.facts {
            self.tracker.apply_facts(facts);
        }

        self.send_agent(AgentCommand::FunctionCallResponse {
            function_call_id,
            output: outcome.result.to_string(),
        })
        .await?;
        Ok(Flow::Continue)
    }

    fn count_error(&mut self) -> Result<Flow, EndReason> {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= self.settings.limits.max_consecutive_errors {
            error!(
                call_id = %self.call_id,
                errors = self.consecutive_errors,
                "Consecutive-error budget exceeded"
            );
            Err(EndReason::ErrorBudgetExceeded)
        } else {
            Ok(Flow::Continue)
        }
    }

    async fn send_transport(&self, command: TransportCommand) -> Result<(), EndReason> {
        self.transport_tx
            .send(command)
            .await
            .map_err(|_| EndReason::TransportClosed)
    }

    async fn send_agent(&self, command: AgentCommand) -> Result<(), EndReason> {
        match &self.agent_tx {
            Some(tx) => tx.send(command).await.map_err(|_| EndReason::AgentClosed),
            None => {
                debug!(call_id = %self.call_id, "Agent not connected, command dropped");
                Ok(())
            }
        }
    }

    /// Single teardown path: flush trailing audio, store the summary, close
    /// the agent connection.
    async fn teardown(&mut self, reason: EndReason) {
        self.stage = Stage::Ended;

        if let Some(chunk) = self.buffer.flush() {
            if let Some(tx) = &self.agent_tx {
                let _ = tx
                    .send(AgentCommand::AudioData {
                        audio: BASE64.encode(&chunk),
                    })
                    .await;
            }
        }
        // Dropping the command sender closes the agent socket.
        self.agent_tx = None;

        let summary = self.tracker.summary(&self.call_id, self.stream_sid.clone());
        info!(
            call_id = %self.call_id,
            call_sid = self.call_sid.as_deref().unwrap_or(""),
            reason = %reason,
            duration_secs = summary.duration_secs,
            turns = summary.transcript.len(),
            interruptions = summary.analytics.interruptions,
            "Session ended"
        );

        if let Err(e) = self.sink.store(summary).await {
            warn!(call_id = %self.call_id, error = %e, "Failed to store call summary");
        }
    }
}

async fn next_agent_event(rx: &mut Option<mpsc::Receiver<AgentEvent>>) -> Option<AgentEvent> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Convert PCM16 bytes between peer sample rates. Identity when they match.
fn convert_rate(pcm: Vec<u8>, from_rate: u32, to_rate: u32) -> Vec<u8> {
    if from_rate == to_rate {
        return pcm;
    }
    let samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    resample(&samples, from_rate, to_rate)
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_rate_identity_keeps_bytes() {
        let pcm = vec![1, 2, 3, 4];
        assert_eq!(convert_rate(pcm.clone(), 8000, 8000), pcm);
    }

    #[test]
    fn test_convert_rate_doubles_sample_count() {
        let pcm: Vec<u8> = [100i16, 200, 300, 400]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let out = convert_rate(pcm, 8000, 16000);
        assert_eq!(out.len(), 16);
    }
}
