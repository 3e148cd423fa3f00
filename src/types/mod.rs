//! Shared data structures for the attention-monitoring pipeline
//!
//! Core types flowing through the system:
//! - `Sample`: one decoded biosignal telemetry reading
//! - `ConnectionState`: lifecycle state of the telemetry stream client
//! - `InterventionRequest` / `ExerciseCandidate`: output of the trigger stage
//! - `PlanKind`: the guided exercise protocols

mod intervention;
mod sample;

pub use intervention::*;
pub use sample::*;
