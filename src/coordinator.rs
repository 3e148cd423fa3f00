//! Session coordinator
//!
//! The top-level loop that ties the pieces together: feed events flow into
//! the sample buffer and the intervention trigger; a trigger firing suspends
//! monitoring and hands control to a guided session; session completion
//! resumes monitoring. Exactly one intervention runs at a time.
//!
//! The coordinator is generic over its output seams ([`CueSink`],
//! [`Navigator`]) and the feed transport, so the whole flow runs in tests
//! against in-memory fakes.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::config::MonitorConfig;
use crate::session::{rate_effectiveness, GuidedSession, SessionEvent, SessionStatus};
use crate::stream::{StreamError, StreamEvent, TelemetryStreamClient, Transport};
use crate::trigger::InterventionTrigger;
use crate::types::{ConnectionState, InterventionRequest, PlanKind, Sample};

// ============================================================================
// Output seams
// ============================================================================

/// Plays audio cues requested by guided sessions.
pub trait CueSink: Send {
    fn play(&mut self, sound: &str);
}

/// Surfaces screen changes to whatever front-end is attached.
pub trait Navigator: Send {
    fn show_exercise(&mut self, plan: PlanKind);
    fn show_monitoring(&mut self);
}

/// Default sinks that just log. Useful headless and in tests.
pub struct LoggingCueSink;

impl CueSink for LoggingCueSink {
    fn play(&mut self, sound: &str) {
        info!(sound, "Audio cue");
    }
}

pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn show_exercise(&mut self, plan: PlanKind) {
        info!(plan = %plan, "Switching to exercise view");
    }

    fn show_monitoring(&mut self) {
        info!("Switching to monitoring view");
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// What the coordinator is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Monitoring,
    InIntervention(PlanKind),
}

pub struct SessionCoordinator<T: Transport, C: CueSink, N: Navigator> {
    client: TelemetryStreamClient<T>,
    buffer: SampleBuffer,
    trigger: InterventionTrigger,
    activity: Activity,
    session: Option<GuidedSession>,
    config: MonitorConfig,
    cues: C,
    navigator: N,
    /// Concentration at the moment the intervention fired, for the
    /// post-session effectiveness rating
    concentration_at_trigger: Option<f64>,
    /// A session ended while the stop-command ack was still in flight;
    /// streaming restarts once `stream_stopped` arrives
    resume_pending: bool,
    samples_processed: u64,
    interventions_run: u64,
}

impl<T: Transport, C: CueSink, N: Navigator> SessionCoordinator<T, C, N> {
    pub fn new(
        client: TelemetryStreamClient<T>,
        config: MonitorConfig,
        cues: C,
        navigator: N,
    ) -> Self {
        let buffer = SampleBuffer::new(config.buffer_capacity);
        let trigger =
            InterventionTrigger::new(config.concentration_threshold, config.baseline_concentration);
        Self {
            client,
            buffer,
            trigger,
            activity: Activity::Monitoring,
            session: None,
            config,
            cues,
            navigator,
            concentration_at_trigger: None,
            resume_pending: false,
            samples_processed: 0,
            interventions_run: 0,
        }
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Connect and request the stream per the configuration.
    pub async fn start(&mut self) -> Result<(), StreamError> {
        self.client.connect().await?;
        self.client
            .start_streaming(self.config.session_id, self.config.stream_speed)
            .await
    }

    /// Main loop. Runs until the cancel token fires or the feed is gone
    /// for good.
    pub async fn run(&mut self, cancel_token: CancellationToken) {
        let mut session_clock = tokio::time::interval(Duration::from_secs(1));
        session_clock.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut feed_done = false;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                event = self.client.next_event(), if !feed_done => {
                    match event {
                        Some(event) => self.handle_stream_event(event).await,
                        None => {
                            warn!("Feed connection is gone, monitoring stopped");
                            feed_done = true;
                            if self.session.is_none() {
                                break;
                            }
                        }
                    }
                }
                _ = session_clock.tick(), if self.session.is_some() => {
                    self.tick_session().await;
                    if feed_done && self.session.is_none() {
                        break;
                    }
                }
            }
        }

        info!(
            samples = self.samples_processed,
            interventions = self.interventions_run,
            "Coordinator stopped"
        );
    }

    async fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Sample(sample) => self.handle_sample(sample).await,
            StreamEvent::StatusChanged(state) => {
                debug!(state = %state, "Feed status changed");
            }
            StreamEvent::StreamStarted { speed } => {
                info!(speed, "Monitoring active");
            }
            StreamEvent::StreamStopped => {
                info!("Monitoring paused");
                if self.resume_pending {
                    self.resume_pending = false;
                    self.resume_streaming().await;
                }
            }
            StreamEvent::StartTimedOut => {
                warn!("Feed never acknowledged the stream start");
            }
            StreamEvent::ServerError(message) => {
                warn!(message = %message, "Feed error");
            }
            StreamEvent::InterventionHint {
                exercises,
                current_concentration,
            } => {
                // Server-side suggestion: honor it unless already intervening
                let sample = Sample {
                    concentration: current_concentration
                        .or_else(|| self.buffer.latest().map(|s| s.concentration))
                        .unwrap_or_default(),
                    ..self.buffer.latest().cloned().unwrap_or_default()
                };
                let mut request = InterventionRequest::with_defaults(sample);
                if !exercises.is_empty() {
                    request.candidate_exercises = exercises;
                }
                self.request_intervention(request).await;
            }
        }
    }

    async fn handle_sample(&mut self, sample: Sample) {
        self.samples_processed += 1;
        let fired = self.trigger.evaluate(&sample);
        self.buffer.push(sample);

        if let Some(request) = fired {
            self.request_intervention(request).await;
        }
    }

    /// Begin an intervention, unless one is already running (the second
    /// request is dropped, the active session keeps going).
    async fn request_intervention(&mut self, request: InterventionRequest) {
        if let Activity::InIntervention(plan) = self.activity {
            debug!(active = %plan, "Intervention already in progress, ignoring trigger");
            return;
        }
        let Some(choice) = request.candidate_exercises.first() else {
            warn!("Intervention request carried no exercise candidates");
            return;
        };

        let plan = choice.kind;
        info!(
            concentration = request.triggering_sample.concentration,
            plan = %plan,
            "Concentration low, starting intervention"
        );

        self.concentration_at_trigger = Some(request.triggering_sample.concentration);
        self.activity = Activity::InIntervention(plan);
        self.interventions_run += 1;
        self.session = Some(GuidedSession::new(plan));
        self.navigator.show_exercise(plan);

        if let Err(e) = self
            .client
            .announce_exercise(plan, self.config.session_id)
            .await
        {
            warn!(error = %e, "Could not announce exercise to feed");
        }
        if self.config.pause_streaming_during_session {
            if let Err(e) = self.client.stop_streaming().await {
                warn!(error = %e, "Could not pause the stream");
            }
        }
    }

    /// Drive the active session's 1-second clock.
    async fn tick_session(&mut self) {
        let events = match self.session.as_mut() {
            Some(session) => session.tick(),
            None => return,
        };
        self.dispatch_session_events(events).await;
    }

    /// Operator confirmation for a manual session phase.
    pub async fn advance_session(&mut self) {
        let events = match self.session.as_mut() {
            Some(session) => session.advance(),
            None => return,
        };
        self.dispatch_session_events(events).await;
    }

    /// Abort the active session and resume monitoring.
    pub async fn cancel_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.cancel();
            self.finish_session(SessionStatus::Cancelled).await;
        }
    }

    async fn dispatch_session_events(&mut self, events: Vec<SessionEvent>) {
        let mut completed = false;
        for event in events {
            match event {
                SessionEvent::PhaseStarted { phase } => {
                    debug!(phase, "Session phase started");
                }
                SessionEvent::Progress { percent, .. } => {
                    debug!(percent, "Session phase progress");
                }
                SessionEvent::CueRequested { sound } => {
                    self.cues.play(sound);
                }
                SessionEvent::CycleCompleted { repetitions } => {
                    info!(repetitions, "Breathing cycle complete");
                }
                SessionEvent::Completed => completed = true,
            }
        }
        if completed {
            self.finish_session(SessionStatus::Complete).await;
        }
    }

    /// Tear down the session state and return to monitoring.
    async fn finish_session(&mut self, status: SessionStatus) {
        let plan = self.session.as_ref().map(GuidedSession::kind);
        self.session = None;
        self.activity = Activity::Monitoring;
        self.navigator.show_monitoring();

        let after = self.buffer.latest().map(|s| s.concentration);
        let rating = rate_effectiveness(self.concentration_at_trigger, after);
        info!(
            plan = %plan.map(|p| p.to_string()).unwrap_or_default(),
            status = ?status,
            effectiveness = %rating,
            "Session finished, resuming monitoring"
        );
        self.concentration_at_trigger = None;

        if self.config.pause_streaming_during_session {
            // The stop ack may still be in flight; restart only once the
            // feed confirms the stop, otherwise the start is rejected.
            if self.client.state() == ConnectionState::Streaming {
                self.resume_pending = true;
            } else {
                self.resume_streaming().await;
            }
        }
    }

    async fn resume_streaming(&mut self) {
        if let Err(e) = self
            .client
            .start_streaming(self.config.session_id, self.config.stream_speed)
            .await
        {
            warn!(error = %e, "Could not resume the stream");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;
    use crate::stream::ChannelTransport;

    struct RecordingCues(Vec<String>);

    impl CueSink for RecordingCues {
        fn play(&mut self, sound: &str) {
            self.0.push(sound.to_string());
        }
    }

    struct RecordingNav(Vec<String>);

    impl Navigator for RecordingNav {
        fn show_exercise(&mut self, plan: PlanKind) {
            self.0.push(format!("exercise:{plan}"));
        }

        fn show_monitoring(&mut self) {
            self.0.push("monitoring".to_string());
        }
    }

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            pause_streaming_during_session: false,
            ..MonitorConfig::default()
        }
    }

    async fn test_coordinator() -> SessionCoordinator<ChannelTransport, RecordingCues, RecordingNav>
    {
        let (transport, _feed) = ChannelTransport::new();
        let mut client = TelemetryStreamClient::new(transport);
        client.connect().await.unwrap();
        client.handle_message(ServerMessage::StreamStarted { speed: 1.0 });
        SessionCoordinator::new(client, test_config(), RecordingCues(Vec::new()), RecordingNav(Vec::new()))
    }

    fn low_sample(concentration: f64) -> Sample {
        Sample {
            concentration,
            ..Sample::default()
        }
    }

    #[tokio::test]
    async fn test_low_sample_starts_intervention() {
        let mut coordinator = test_coordinator().await;
        coordinator.handle_sample(low_sample(25.0)).await;
        assert_eq!(
            coordinator.activity(),
            Activity::InIntervention(PlanKind::Breathing)
        );
        assert_eq!(coordinator.navigator.0, vec!["exercise:breathing"]);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let mut coordinator = test_coordinator().await;
        coordinator.handle_sample(low_sample(30.0)).await;
        assert_eq!(coordinator.activity(), Activity::Monitoring);
    }

    #[tokio::test]
    async fn test_second_trigger_ignored_during_session() {
        let mut coordinator = test_coordinator().await;
        coordinator.handle_sample(low_sample(25.0)).await;
        coordinator.handle_sample(low_sample(5.0)).await;
        assert_eq!(coordinator.interventions_run, 1);
        // Samples still buffered while intervening
        assert_eq!(coordinator.buffer().len(), 2);
    }

    #[tokio::test]
    async fn test_session_completion_resumes_monitoring() {
        let mut coordinator = test_coordinator().await;
        coordinator.handle_sample(low_sample(25.0)).await;

        // Breathing: 5 cycles of 24 seconds
        for _ in 0..(24 * 5) {
            coordinator.tick_session().await;
        }
        assert_eq!(coordinator.activity(), Activity::Monitoring);
        assert!(coordinator.session.is_none());
        assert_eq!(coordinator.navigator.0.last().unwrap(), "monitoring");
    }

    #[tokio::test]
    async fn test_cancel_session_resumes_monitoring() {
        let mut coordinator = test_coordinator().await;
        coordinator.handle_sample(low_sample(25.0)).await;
        coordinator.cancel_session().await;
        assert_eq!(coordinator.activity(), Activity::Monitoring);

        // And a new trigger can fire again
        coordinator.handle_sample(low_sample(20.0)).await;
        assert_eq!(coordinator.interventions_run, 2);
    }

    #[tokio::test]
    async fn test_calibration_cue_reaches_sink() {
        let mut coordinator = test_coordinator().await;
        let request = InterventionRequest::with_defaults(low_sample(25.0));
        let mut request = request;
        request.candidate_exercises = vec![crate::types::ExerciseCandidate {
            kind: PlanKind::Calibration,
            duration_seconds: 30,
        }];
        coordinator.request_intervention(request).await;

        coordinator.advance_session().await;
        coordinator.advance_session().await;
        for _ in 0..10 {
            coordinator.tick_session().await;
        }
        assert_eq!(coordinator.cues.0, vec!["calibration-complete"]);
        assert_eq!(coordinator.activity(), Activity::Monitoring);
    }

    #[tokio::test]
    async fn test_resume_waits_for_stop_ack() {
        let (transport, _feed) = ChannelTransport::new();
        let sent = transport.sent();
        let mut client = TelemetryStreamClient::new(transport);
        client.connect().await.unwrap();
        client.handle_message(ServerMessage::StreamStarted { speed: 1.0 });

        // Default config pauses streaming during sessions
        let mut coordinator = SessionCoordinator::new(
            client,
            MonitorConfig::default(),
            RecordingCues(Vec::new()),
            RecordingNav(Vec::new()),
        );

        coordinator.handle_sample(low_sample(25.0)).await;
        coordinator.cancel_session().await;

        // The stop ack has not arrived yet, so no restart was sent
        assert!(!sent.lock().unwrap().iter().any(|l| l.contains("start_stream")));
        assert_eq!(coordinator.activity(), Activity::Monitoring);

        // Once the feed confirms the stop, streaming restarts
        coordinator.client.handle_message(ServerMessage::StreamStopped);
        coordinator
            .handle_stream_event(StreamEvent::StreamStopped)
            .await;
        assert!(sent.lock().unwrap().iter().any(|l| l.contains("start_stream")));
    }

    #[tokio::test]
    async fn test_server_hint_uses_suggested_exercises() {
        let mut coordinator = test_coordinator().await;
        coordinator
            .handle_stream_event(StreamEvent::InterventionHint {
                exercises: vec![crate::types::ExerciseCandidate {
                    kind: PlanKind::Movement,
                    duration_seconds: 180,
                }],
                current_concentration: Some(22.0),
            })
            .await;
        assert_eq!(
            coordinator.activity(),
            Activity::InIntervention(PlanKind::Movement)
        );
    }
}
