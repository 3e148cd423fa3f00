//! Post-session effectiveness rating
//!
//! Compares concentration at intervention time with the first reading after
//! the session ends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effectiveness {
    High,
    Medium,
    Low,
    Neutral,
}

impl std::fmt::Display for Effectiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effectiveness::High => write!(f, "high"),
            Effectiveness::Medium => write!(f, "medium"),
            Effectiveness::Low => write!(f, "low"),
            Effectiveness::Neutral => write!(f, "neutral"),
        }
    }
}

/// Rate how much an exercise session helped. `Neutral` when either reading
/// is missing or the change is small.
pub fn rate_effectiveness(before: Option<f64>, after: Option<f64>) -> Effectiveness {
    let (Some(before), Some(after)) = (before, after) else {
        return Effectiveness::Neutral;
    };
    let improvement = after - before;
    if improvement > 10.0 {
        Effectiveness::High
    } else if improvement > 5.0 {
        Effectiveness::Medium
    } else if improvement < -5.0 {
        Effectiveness::Low
    } else {
        Effectiveness::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bands() {
        assert_eq!(rate_effectiveness(Some(20.0), Some(35.0)), Effectiveness::High);
        assert_eq!(rate_effectiveness(Some(20.0), Some(27.0)), Effectiveness::Medium);
        assert_eq!(rate_effectiveness(Some(40.0), Some(30.0)), Effectiveness::Low);
        assert_eq!(rate_effectiveness(Some(30.0), Some(32.0)), Effectiveness::Neutral);
    }

    #[test]
    fn test_band_edges_are_exclusive() {
        assert_eq!(rate_effectiveness(Some(20.0), Some(30.0)), Effectiveness::Medium);
        assert_eq!(rate_effectiveness(Some(20.0), Some(25.0)), Effectiveness::Neutral);
        assert_eq!(rate_effectiveness(Some(30.0), Some(25.0)), Effectiveness::Neutral);
    }

    #[test]
    fn test_missing_readings_are_neutral() {
        assert_eq!(rate_effectiveness(None, Some(50.0)), Effectiveness::Neutral);
        assert_eq!(rate_effectiveness(Some(50.0), None), Effectiveness::Neutral);
    }
}
