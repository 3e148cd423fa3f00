//! Feed client state machine
//!
//! Owns one transport and drives the feed dialogue: connect, start/stop
//! streaming, playback speed changes, start acknowledgement timeout, and the
//! single-shot reconnect when the connection drops mid-stream.
//!
//! The client is pull-driven: the owner awaits [`next_event`] in a loop and
//! reacts to the returned [`StreamEvent`]s. All timing (ack deadline,
//! reconnect delay) lives inside `next_event`, so tests can drive it under
//! paused tokio time.
//!
//! [`next_event`]: TelemetryStreamClient::next_event

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::retry::{RetryPolicy, RECONNECT_DELAY_SECS};
use super::transport::Transport;
use super::{StreamError, StreamEvent};
use crate::protocol::{self, ClientCommand, ServerMessage};
use crate::types::ConnectionState;

/// Seconds to wait for `stream_started` after requesting a start.
pub const START_ACK_TIMEOUT_SECS: u64 = 5;

pub struct TelemetryStreamClient<T: Transport> {
    transport: T,
    state: ConnectionState,
    /// A start request is in flight, awaiting `stream_started`
    start_pending: bool,
    start_deadline: Option<Instant>,
    retry: RetryPolicy,
    /// Earliest time the scheduled reconnect may run
    reconnect_at: Option<Instant>,
    /// Arguments of the last start request, replayed after a reconnect
    last_start: Option<(u64, f64)>,
    /// Highest sample index accepted on the current stream
    last_sequence: Option<u64>,
    /// Events produced by message handling, drained by `next_event`
    queue: VecDeque<StreamEvent>,
    ack_timeout: Duration,
    reconnect_delay: Duration,
}

impl<T: Transport> TelemetryStreamClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            start_pending: false,
            start_deadline: None,
            retry: RetryPolicy::new(),
            reconnect_at: None,
            last_start: None,
            last_sequence: None,
            queue: VecDeque::new(),
            ack_timeout: Duration::from_secs(START_ACK_TIMEOUT_SECS),
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
        }
    }

    /// Override the start acknowledgement window.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Override the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connect to the feed. Idempotent: a second call while already
    /// connected is a no-op.
    pub async fn connect(&mut self) -> Result<(), StreamError> {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Streaming
        ) {
            debug!("Already connected, ignoring connect request");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        match self.transport.connect().await {
            Ok(()) => {
                self.retry.mark_connected();
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Error);
                Err(e.into())
            }
        }
    }

    /// Ask the feed to begin streaming samples. Arms the acknowledgement
    /// deadline; `stream_started` must arrive within the ack window.
    pub async fn start_streaming(&mut self, session_id: u64, speed: f64) -> Result<(), StreamError> {
        if !protocol::is_valid_speed(speed) {
            return Err(StreamError::InvalidSpeed(speed));
        }
        if self.state != ConnectionState::Connected {
            return Err(StreamError::NotConnected);
        }
        if self.start_pending {
            debug!("Start already pending, ignoring duplicate request");
            return Ok(());
        }

        info!(session_id, speed, "Requesting stream start");
        self.send_command(&ClientCommand::StartStream { session_id, speed })
            .await?;
        self.start_pending = true;
        self.start_deadline = Some(Instant::now() + self.ack_timeout);
        self.last_start = Some((session_id, speed));
        self.retry.set_streaming_intent(true);
        Ok(())
    }

    /// Ask the feed to stop streaming. Clears streaming intent, so a
    /// subsequent close is treated as deliberate; also drops any scheduled
    /// reconnect. No-op when there is nothing to stop.
    pub async fn stop_streaming(&mut self) -> Result<(), StreamError> {
        self.retry.set_streaming_intent(false);
        self.reconnect_at = None;
        self.start_pending = false;
        self.start_deadline = None;

        if !matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Streaming
        ) {
            return Ok(());
        }

        info!("Requesting stream stop");
        self.send_command(&ClientCommand::StopStream).await
    }

    /// Change playback speed mid-stream. Invalid speeds are rejected before
    /// anything reaches the wire.
    pub async fn set_speed(&mut self, speed: f64) -> Result<(), StreamError> {
        if !protocol::is_valid_speed(speed) {
            return Err(StreamError::InvalidSpeed(speed));
        }
        if self.state != ConnectionState::Streaming {
            return Err(StreamError::NotConnected);
        }
        info!(speed, "Changing stream speed");
        if let Some((_, last_speed)) = self.last_start.as_mut() {
            *last_speed = speed;
        }
        self.send_command(&ClientCommand::SetSpeed { speed }).await
    }

    /// Tell the feed which exercise the user is about to run.
    pub async fn announce_exercise(
        &mut self,
        exercise_type: crate::types::PlanKind,
        session_id: u64,
    ) -> Result<(), StreamError> {
        if !matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Streaming
        ) {
            return Err(StreamError::NotConnected);
        }
        self.send_command(&ClientCommand::ExerciseSelected {
            exercise_type,
            session_id,
        })
        .await
    }

    /// Liveness probe.
    pub async fn ping(&mut self) -> Result<(), StreamError> {
        self.send_command(&ClientCommand::Ping).await
    }

    /// Await the next event from the feed.
    ///
    /// Returns `None` once the connection is gone for good: closed
    /// deliberately, closed without streaming intent, or the single retry
    /// already spent.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }

            // A scheduled reconnect takes priority over reading: the
            // transport is down anyway.
            if let Some(at) = self.reconnect_at {
                tokio::time::sleep_until(at).await;
                self.reconnect_at = None;
                self.run_reconnect().await;
                continue;
            }

            if !matches!(
                self.state,
                ConnectionState::Connected | ConnectionState::Streaming
            ) {
                return None;
            }

            let received = match self.start_deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.transport.recv()).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(
                                timeout_secs = self.ack_timeout.as_secs(),
                                "No stream start acknowledgement from feed"
                            );
                            self.start_pending = false;
                            self.start_deadline = None;
                            self.retry.set_streaming_intent(false);
                            self.queue.push_back(StreamEvent::StartTimedOut);
                            continue;
                        }
                    }
                }
                None => self.transport.recv().await,
            };

            match received {
                Ok(Some(line)) => match protocol::decode_message(&line) {
                    Ok(message) => self.handle_message(message),
                    Err(e) => {
                        // One bad line does not kill the stream
                        warn!(error = %e, "Discarding malformed feed message");
                    }
                },
                Ok(None) => self.handle_close(),
                Err(e) => {
                    warn!(error = %e, "Feed transport error");
                    self.start_pending = false;
                    self.start_deadline = None;
                    self.set_state(ConnectionState::Error);
                    self.schedule_retry();
                }
            }
        }
    }

    /// Dispatch one decoded feed message, queueing the resulting events.
    pub(crate) fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ConnectionEstablished { message } => {
                debug!(message = %message, "Feed greeting received");
            }
            ServerMessage::ConcentrationData { data } => {
                // Drop stale or duplicated samples after a reconnect replay.
                // Legacy samples carry no index and bypass the check.
                if let Some(index) = data.sequence_index {
                    if let Some(last) = self.last_sequence {
                        if index <= last {
                            debug!(index, last, "Dropping out-of-order sample");
                            return;
                        }
                    }
                    self.last_sequence = Some(index);
                }
                self.queue.push_back(StreamEvent::Sample(data));
            }
            ServerMessage::StreamStarted { speed } => {
                info!(speed, "Stream started");
                self.start_pending = false;
                self.start_deadline = None;
                self.last_sequence = None;
                self.set_state(ConnectionState::Streaming);
                self.queue.push_back(StreamEvent::StreamStarted { speed });
            }
            ServerMessage::StreamStopped => {
                info!("Stream stopped");
                self.retry.set_streaming_intent(false);
                self.set_state(ConnectionState::Connected);
                self.queue.push_back(StreamEvent::StreamStopped);
            }
            ServerMessage::Error { message } => {
                warn!(message = %message, "Feed reported an error");
                self.queue.push_back(StreamEvent::ServerError(message));
            }
            ServerMessage::ExerciseSuggestion {
                exercises,
                current_concentration,
            } => {
                let candidates = exercises.iter().map(|e| e.candidate()).collect();
                self.queue.push_back(StreamEvent::InterventionHint {
                    exercises: candidates,
                    current_concentration,
                });
            }
            ServerMessage::Pong => {
                debug!("Pong received");
            }
            ServerMessage::CalibrationProgress { data } => {
                debug!(progress = %data, "Calibration progress");
            }
        }
    }

    fn handle_close(&mut self) {
        warn!("Feed closed the connection");
        self.set_state(ConnectionState::Disconnected);
        self.start_pending = false;
        self.start_deadline = None;
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        if self.retry.should_retry(false) {
            info!(
                delay_secs = self.reconnect_delay.as_secs(),
                "Scheduling reconnect attempt"
            );
            self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
        }
    }

    /// The single reconnect attempt. On success the previous start request
    /// is replayed so streaming resumes without operator action.
    async fn run_reconnect(&mut self) {
        self.set_state(ConnectionState::Connecting);
        match self.transport.connect().await {
            Ok(()) => {
                self.retry.mark_connected();
                self.set_state(ConnectionState::Connected);
                if let Some((session_id, speed)) = self.last_start {
                    info!(session_id, speed, "Reconnected, resuming stream");
                    if let Err(e) = self.start_streaming(session_id, speed).await {
                        warn!(error = %e, "Failed to resume stream after reconnect");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Reconnect attempt failed");
                self.retry.set_streaming_intent(false);
                self.set_state(ConnectionState::Error);
            }
        }
    }

    async fn send_command(&mut self, command: &ClientCommand) -> Result<(), StreamError> {
        let line = protocol::encode_command(command)?;
        self.transport.send(&line).await?;
        Ok(())
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Connection state changed");
            self.state = state;
            self.queue.push_back(StreamEvent::StatusChanged(state));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
