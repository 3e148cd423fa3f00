//! Exercise plan definitions
//!
//! Each plan is an immutable ordered list of phases. The active phase index,
//! held by [`GuidedSession`](super::GuidedSession), is the only cursor.

use crate::types::PlanKind;

/// How a phase moves to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceMode {
    /// Auto-advances once the per-second tick reaches this duration (seconds)
    Timed(u32),
    /// Advances only on an explicit proceed signal from the operator
    Manual,
}

/// One step of an exercise plan.
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    /// Stable identifier (matches the feed's naming)
    pub name: &'static str,
    /// Operator-facing headline
    pub display_title: &'static str,
    /// Operator-facing instruction text
    pub instruction: &'static str,
    pub advance: AdvanceMode,
    /// Sound asset requested the moment this phase's timer elapses
    pub completion_cue: Option<&'static str>,
    /// Entering this phase completes the session
    pub terminal: bool,
}

const BREATHING: &[Phase] = &[
    Phase {
        name: "inhale",
        display_title: "Breathe in...",
        instruction: "Take a deep breath through your nose",
        advance: AdvanceMode::Timed(4),
        completion_cue: None,
        terminal: false,
    },
    Phase {
        name: "hold",
        display_title: "Hold your breath",
        instruction: "Keep the air in",
        advance: AdvanceMode::Timed(7),
        completion_cue: None,
        terminal: false,
    },
    Phase {
        name: "exhale",
        display_title: "Slowly breathe out...",
        instruction: "Release the air through your mouth",
        advance: AdvanceMode::Timed(8),
        completion_cue: None,
        terminal: false,
    },
    Phase {
        name: "rest",
        display_title: "",
        instruction: "Rest before the next cycle",
        advance: AdvanceMode::Timed(5),
        completion_cue: None,
        terminal: false,
    },
];

const CALIBRATION: &[Phase] = &[
    Phase {
        name: "put_on",
        display_title: "Put on the headset",
        instruction: "Make sure the sensors sit snugly against your head",
        advance: AdvanceMode::Manual,
        completion_cue: None,
        terminal: false,
    },
    Phase {
        name: "calibrate",
        display_title: "Start the calibration",
        instruction: "You will need to close your eyes. A sound will play when calibration finishes",
        advance: AdvanceMode::Manual,
        completion_cue: None,
        terminal: false,
    },
    Phase {
        name: "close",
        display_title: "Close your eyes, calibrating",
        instruction: "You will hear a sound when it is done",
        advance: AdvanceMode::Timed(10),
        completion_cue: Some("calibration-complete"),
        terminal: false,
    },
    Phase {
        name: "final",
        display_title: "Calibration complete",
        instruction: "You can now start a session",
        advance: AdvanceMode::Manual,
        completion_cue: None,
        terminal: true,
    },
];

const MOVEMENT: &[Phase] = &[
    Phase {
        name: "activity",
        display_title: "Do the exercise",
        instruction: "Push-ups, squats and head turns improve circulation",
        advance: AdvanceMode::Manual,
        completion_cue: None,
        terminal: false,
    },
    Phase {
        name: "dance",
        display_title: "Put on your favourite music and dance!",
        instruction: "Favourite songs raise dopamine levels",
        advance: AdvanceMode::Manual,
        completion_cue: None,
        terminal: false,
    },
];

/// The immutable phase list for a plan.
pub fn phases(kind: PlanKind) -> &'static [Phase] {
    match kind {
        PlanKind::Breathing => BREATHING,
        PlanKind::Calibration => CALIBRATION,
        PlanKind::Movement => MOVEMENT,
    }
}

/// Completed-cycle count at which a plan reaches its terminal state.
/// Only breathing cycles; the other plans run their phase list once.
pub fn repetition_target(kind: PlanKind) -> u32 {
    match kind {
        PlanKind::Breathing => 5,
        PlanKind::Calibration | PlanKind::Movement => 1,
    }
}

/// Whether completing the last phase wraps back to the first.
pub fn cycles(kind: PlanKind) -> bool {
    matches!(kind, PlanKind::Breathing)
}
