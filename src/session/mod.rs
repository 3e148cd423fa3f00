//! Guided exercise sessions
//!
//! A guided session walks the user through one fixed exercise protocol as a
//! sequence of phases. Timed phases advance on a 1-second tick cadence;
//! manual phases advance only on an explicit proceed signal. The state
//! machine itself never touches the clock: production drives it from a real
//! timer, tests from synthetic tick calls.

mod plan;
mod report;
mod state_machine;

pub use plan::{AdvanceMode, Phase};
pub use report::{rate_effectiveness, Effectiveness};
pub use state_machine::{GuidedSession, SessionEvent, SessionStatus};
