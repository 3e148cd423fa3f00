//! Guided session state machine
//!
//! A [`GuidedSession`] walks through the phases of one exercise plan. It is
//! driven from outside by two inputs only:
//!
//! - `tick()` once per second while a timed phase is active
//! - `advance()` when the operator confirms a manual phase
//!
//! Each input returns the events it produced, so the caller decides how to
//! surface them (log lines, cue playback, UI updates).

use tracing::debug;

use super::plan::{self, AdvanceMode, Phase};
use crate::types::PlanKind;

// ============================================================================
// Events & Status
// ============================================================================

/// Terminal states are absorbing: no further events are ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Complete,
    Cancelled,
}

/// What a `tick()` or `advance()` call produced, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseStarted { phase: &'static str },
    /// Progress within the current timed phase
    Progress { percent: f64, elapsed_seconds: u32 },
    /// A sound cue should be played now
    CueRequested { sound: &'static str },
    /// A full breathing cycle finished; `repetitions` completed so far
    CycleCompleted { repetitions: u32 },
    Completed,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug)]
pub struct GuidedSession {
    kind: PlanKind,
    phase_index: usize,
    /// Whole seconds elapsed inside the current timed phase
    elapsed: u32,
    repetitions: u32,
    status: SessionStatus,
}

impl GuidedSession {
    pub fn new(kind: PlanKind) -> Self {
        debug!(plan = %kind, "Guided session started");
        Self {
            kind,
            phase_index: 0,
            elapsed: 0,
            repetitions: 0,
            status: SessionStatus::Running,
        }
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_phase(&self) -> &'static Phase {
        &plan::phases(self.kind)[self.phase_index]
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    /// Fraction of the current timed phase already elapsed, `None` for
    /// manual phases.
    pub fn progress_percent(&self) -> Option<f64> {
        match self.current_phase().advance {
            AdvanceMode::Timed(duration) => {
                Some((f64::from(self.elapsed) / f64::from(duration) * 100.0).min(100.0))
            }
            AdvanceMode::Manual => None,
        }
    }

    /// Advance the per-second clock. Only meaningful while a timed phase is
    /// active; manual phases and finished sessions ignore ticks entirely.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        if self.status != SessionStatus::Running {
            return Vec::new();
        }
        let AdvanceMode::Timed(duration) = self.current_phase().advance else {
            return Vec::new();
        };

        self.elapsed += 1;
        if self.elapsed < duration {
            return vec![SessionEvent::Progress {
                percent: f64::from(self.elapsed) / f64::from(duration) * 100.0,
                elapsed_seconds: self.elapsed,
            }];
        }

        // Timer elapsed: emit the phase's cue (if any) before transitioning.
        let mut events = Vec::new();
        if let Some(sound) = self.current_phase().completion_cue {
            events.push(SessionEvent::CueRequested { sound });
        }
        events.extend(self.transition());
        events
    }

    /// Operator confirmation for a manual phase. Ticking phases and finished
    /// sessions ignore it.
    pub fn advance(&mut self) -> Vec<SessionEvent> {
        if self.status != SessionStatus::Running {
            return Vec::new();
        }
        if self.current_phase().advance != AdvanceMode::Manual {
            return Vec::new();
        }
        self.transition()
    }

    /// Abort the session. Idempotent; a completed session stays complete.
    pub fn cancel(&mut self) {
        if self.status == SessionStatus::Running {
            debug!(plan = %self.kind, "Guided session cancelled");
            self.status = SessionStatus::Cancelled;
        }
    }

    /// Move past the current phase, handling cycle wrap and completion.
    fn transition(&mut self) -> Vec<SessionEvent> {
        let phases = plan::phases(self.kind);
        let mut events = Vec::new();
        self.elapsed = 0;

        let at_last = self.phase_index + 1 >= phases.len();
        if at_last {
            self.repetitions += 1;
            if plan::cycles(self.kind) {
                events.push(SessionEvent::CycleCompleted {
                    repetitions: self.repetitions,
                });
            }
            if self.repetitions >= plan::repetition_target(self.kind) {
                self.status = SessionStatus::Complete;
                events.push(SessionEvent::Completed);
                return events;
            }
            // Wrap to the start of the next cycle
            self.phase_index = 0;
        } else {
            self.phase_index += 1;
        }

        let next = self.current_phase();
        if next.terminal {
            self.status = SessionStatus::Complete;
            events.push(SessionEvent::PhaseStarted { phase: next.name });
            events.push(SessionEvent::Completed);
        } else {
            events.push(SessionEvent::PhaseStarted { phase: next.name });
        }
        events
    }
}

// ============================================================================
// Tests
// ============================================================================
