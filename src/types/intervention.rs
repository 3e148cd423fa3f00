//! Intervention request types emitted by the trigger stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Sample;

/// The guided exercise protocols.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// 4-7-8 breathing cadence, five repetitions
    #[default]
    Breathing,
    /// Headset fitting and eyes-closed baseline calibration
    Calibration,
    /// Light physical activity steps
    Movement,
}

impl std::fmt::Display for PlanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanKind::Breathing => write!(f, "breathing"),
            PlanKind::Calibration => write!(f, "calibration"),
            PlanKind::Movement => write!(f, "movement"),
        }
    }
}

/// One proposed corrective exercise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExerciseCandidate {
    pub kind: PlanKind,
    /// Nominal duration shown to the user, in seconds
    pub duration_seconds: u64,
}

/// Default candidate list proposed when the upstream source supplies none:
/// breathing (5 nominal minutes) and movement (3 nominal minutes).
pub fn default_candidates() -> Vec<ExerciseCandidate> {
    vec![
        ExerciseCandidate {
            kind: PlanKind::Breathing,
            duration_seconds: 300,
        },
        ExerciseCandidate {
            kind: PlanKind::Movement,
            duration_seconds: 180,
        },
    ]
}

/// Request for a guided exercise, emitted when concentration drops.
///
/// Ephemeral: consumed by the coordinator, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct InterventionRequest {
    /// The sample whose concentration reading fired the trigger
    pub triggering_sample: Sample,
    /// Proposed exercises, in preference order
    pub candidate_exercises: Vec<ExerciseCandidate>,
    pub created_at: DateTime<Utc>,
}

impl InterventionRequest {
    /// Build a request for `sample` with the default candidate list.
    pub fn with_defaults(sample: Sample) -> Self {
        Self {
            triggering_sample: sample,
            candidate_exercises: default_candidates(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates() {
        let candidates = default_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].kind, PlanKind::Breathing);
        assert_eq!(candidates[0].duration_seconds, 300);
        assert_eq!(candidates[1].kind, PlanKind::Movement);
        assert_eq!(candidates[1].duration_seconds, 180);
    }

    #[test]
    fn test_plan_kind_wire_format() {
        assert_eq!(
            serde_json::to_string(&PlanKind::Breathing).unwrap(),
            "\"breathing\""
        );
        assert_eq!(
            serde_json::from_str::<PlanKind>("\"movement\"").unwrap(),
            PlanKind::Movement
        );
    }
}
