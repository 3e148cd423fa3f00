//! Guided Session Integration Tests
//!
//! Walk each exercise protocol end to end through the public API, the way
//! an attached front-end would: manual confirmations, per-second ticks,
//! cue playback ordering, and the post-session effectiveness rating.

use focusguard::session::{rate_effectiveness, Effectiveness, SessionEvent, SessionStatus};
use focusguard::{GuidedSession, PlanKind};

fn tick_n(session: &mut GuidedSession, n: u32) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(session.tick());
    }
    events
}

/// Full breathing protocol: five 4-7-8-5 cycles, 120 seconds total.
#[test]
fn test_breathing_protocol_end_to_end() {
    let mut session = GuidedSession::new(PlanKind::Breathing);

    let events = tick_n(&mut session, 120);
    let cycles: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::CycleCompleted { repetitions } => Some(*repetitions),
            _ => None,
        })
        .collect();
    assert_eq!(cycles, vec![1, 2, 3, 4, 5]);
    assert_eq!(session.status(), SessionStatus::Complete);

    // Exactly one completion event, at the very end
    let completions = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Completed))
        .count();
    assert_eq!(completions, 1);
    assert!(matches!(events.last(), Some(SessionEvent::Completed)));
}

/// Full calibration protocol: two manual confirmations, a 10-second timed
/// close phase, the completion cue, then the terminal phase.
#[test]
fn test_calibration_protocol_end_to_end() {
    let mut session = GuidedSession::new(PlanKind::Calibration);
    assert_eq!(session.current_phase().name, "put_on");

    // Headset on, calibration armed
    session.advance();
    session.advance();
    assert_eq!(session.current_phase().name, "close");
    assert_eq!(session.progress_percent(), Some(0.0));

    let events = tick_n(&mut session, 10);
    let cue_position = events
        .iter()
        .position(|e| matches!(e, SessionEvent::CueRequested { sound: "calibration-complete" }))
        .expect("cue must fire");
    let final_position = events
        .iter()
        .position(|e| matches!(e, SessionEvent::PhaseStarted { phase: "final" }))
        .expect("final phase must start");
    assert!(cue_position < final_position);
    assert_eq!(session.status(), SessionStatus::Complete);
}

/// Movement is entirely operator-paced; the clock plays no part.
#[test]
fn test_movement_protocol_ignores_the_clock() {
    let mut session = GuidedSession::new(PlanKind::Movement);
    assert!(tick_n(&mut session, 60).is_empty());
    assert_eq!(session.current_phase().name, "activity");

    session.advance();
    assert_eq!(session.current_phase().name, "dance");
    let events = session.advance();
    assert!(events.contains(&SessionEvent::Completed));
}

/// Cancellation mid-protocol is terminal.
#[test]
fn test_cancelled_session_stays_cancelled() {
    let mut session = GuidedSession::new(PlanKind::Breathing);
    tick_n(&mut session, 10);
    session.cancel();
    assert_eq!(session.status(), SessionStatus::Cancelled);
    assert!(tick_n(&mut session, 200).is_empty());
}

/// Ratings reflect the before/after concentration delta.
#[test]
fn test_effectiveness_rating_after_session() {
    assert_eq!(rate_effectiveness(Some(25.0), Some(45.0)), Effectiveness::High);
    assert_eq!(rate_effectiveness(Some(25.0), Some(32.0)), Effectiveness::Medium);
    assert_eq!(rate_effectiveness(Some(25.0), Some(26.0)), Effectiveness::Neutral);
    assert_eq!(rate_effectiveness(Some(25.0), Some(15.0)), Effectiveness::Low);
    assert_eq!(rate_effectiveness(None, Some(40.0)), Effectiveness::Neutral);
}
