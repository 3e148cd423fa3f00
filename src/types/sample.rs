//! Biosignal sample and connection-state types

use serde::{Deserialize, Serialize};

/// One biosignal telemetry reading from the upstream feed.
///
/// Primary channels (`concentration`, `stress`, `heart_rate`, `focus`) are
/// unit-normalized to 0–100 by the source. Secondary channels are present
/// on newer feed versions only and default to `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    /// Concentration level (0-100). Required; its presence is what
    /// identifies a legacy bare-sample message.
    pub concentration: f64,
    /// Stress level (0–100)
    #[serde(default)]
    pub stress: f64,
    /// Heart rate (bpm)
    #[serde(default)]
    pub heart_rate: f64,
    /// Focus level (0–100)
    #[serde(default)]
    pub focus: f64,
    /// Display timestamp assigned by the source (e.g. "03:17")
    #[serde(default)]
    pub timestamp: String,
    /// Monotonically increasing index assigned by the source. Absent on
    /// legacy bare samples; when present, out-of-order or duplicate
    /// indices are dropped by the stream client.
    #[serde(default, rename = "data_index", skip_serializing_if = "Option::is_none")]
    pub sequence_index: Option<u64>,
    /// Total samples in the source's full dataset, for progress display only
    #[serde(default, rename = "total_points", skip_serializing_if = "Option::is_none")]
    pub total_expected: Option<u64>,

    // === Secondary channels (newer feed versions) ===
    /// Attention index (0–100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention: Option<f64>,
    /// Cognitive load index (0–100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_load: Option<f64>,
    /// Relaxation index (0–100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxation: Option<f64>,
    /// Fatigue score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatigue_score: Option<f64>,
}

impl Sample {
    /// Fraction of the source dataset already streamed, if the source
    /// reported its total size.
    pub fn progress_percent(&self) -> Option<f64> {
        match (self.sequence_index, self.total_expected) {
            (Some(index), Some(total)) if total > 0 => {
                Some((index as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            concentration: 0.0,
            stress: 0.0,
            heart_rate: 0.0,
            focus: 0.0,
            timestamp: String::new(),
            sequence_index: None,
            total_expected: None,
            attention: None,
            cognitive_load: None,
            relaxation: None,
            fatigue_score: None,
        }
    }
}

/// Lifecycle state of the telemetry stream client.
///
/// Exactly one value at a time; owned exclusively by the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Streaming,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Streaming => write!(f, "streaming"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_progress_percent() {
        let mut sample = Sample {
            concentration: 55.0,
            sequence_index: Some(25),
            total_expected: Some(100),
            ..Default::default()
        };
        assert_eq!(sample.progress_percent(), Some(25.0));

        sample.total_expected = None;
        assert_eq!(sample.progress_percent(), None);

        sample.total_expected = Some(0);
        assert_eq!(sample.progress_percent(), None);
    }

    #[test]
    fn test_sample_deserializes_wire_field_names() {
        let json = r#"{
            "concentration": 42.5,
            "stress": 18.0,
            "heart_rate": 72.0,
            "focus": 61.0,
            "timestamp": "02:15",
            "data_index": 135,
            "total_points": 600
        }"#;

        let sample: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.concentration, 42.5);
        assert_eq!(sample.sequence_index, Some(135));
        assert_eq!(sample.total_expected, Some(600));
        assert_eq!(sample.attention, None);
    }

    #[test]
    fn test_sample_requires_concentration() {
        // Anything without a concentration field must not decode as a sample.
        let json = r#"{"stress": 10.0, "heart_rate": 70.0}"#;
        assert!(serde_json::from_str::<Sample>(json).is_err());
    }
}
