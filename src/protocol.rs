//! Telemetry wire protocol
//!
//! The feed speaks newline-delimited JSON over a persistent bidirectional
//! channel. Every message carries a `type` tag, with one exception: legacy
//! feeds emit bare samples with no tag at all, identified by the presence of
//! a `concentration` field and decoded as `concentration_data` for backward
//! compatibility.
//!
//! Unknown or malformed messages are a [`ProtocolError`]; the caller logs
//! and drops them without terminating the connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ExerciseCandidate, PlanKind, Sample};

/// Playback-speed multipliers the feed accepts.
pub const VALID_SPEEDS: [f64; 4] = [0.5, 1.0, 2.0, 5.0];

/// Whether `speed` is one of the enumerated multipliers.
pub fn is_valid_speed(speed: f64) -> bool {
    VALID_SPEEDS.iter().any(|&s| s == speed)
}

/// Wire protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// Outbound commands
// ============================================================================

/// Commands sent to the feed.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartStream {
        session_id: u64,
        speed: f64,
    },
    StopStream,
    SetSpeed {
        speed: f64,
    },
    ExerciseSelected {
        exercise_type: PlanKind,
        session_id: u64,
    },
    Ping,
}

/// Encode a command as one JSON line (without the trailing newline).
pub fn encode_command(command: &ClientCommand) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(command)?)
}

// ============================================================================
// Inbound messages
// ============================================================================

/// Exercise entry as the feed sends it: duration in nominal minutes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WireExercise {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: PlanKind,
    /// Nominal duration in minutes
    #[serde(default)]
    pub duration: f64,
}

impl WireExercise {
    pub fn candidate(&self) -> ExerciseCandidate {
        ExerciseCandidate {
            kind: self.kind,
            duration_seconds: (self.duration * 60.0).round().max(0.0) as u64,
        }
    }
}

fn default_speed() -> f64 {
    1.0
}

/// Messages received from the feed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection acknowledgment sent right after accept
    ConnectionEstablished {
        #[serde(default)]
        message: String,
    },
    /// One telemetry sample. Older feed versions tag these
    /// `concentration_update`.
    #[serde(alias = "concentration_update")]
    ConcentrationData { data: Sample },
    /// Acknowledgment of a start command
    StreamStarted {
        #[serde(default = "default_speed")]
        speed: f64,
    },
    /// Acknowledgment of a stop command
    StreamStopped,
    /// Server-side error report; the connection stays up
    Error {
        #[serde(default)]
        message: String,
    },
    /// Server-proposed exercise list. Takes precedence over the local
    /// default candidates when non-empty.
    #[serde(alias = "exercise_notification")]
    ExerciseSuggestion {
        #[serde(default)]
        exercises: Vec<WireExercise>,
        #[serde(default)]
        current_concentration: Option<f64>,
    },
    /// Keepalive response
    Pong,
    /// Calibration progress report, informational only
    CalibrationProgress {
        #[serde(default)]
        data: serde_json::Value,
    },
}

/// Decode one inbound line.
///
/// Falls back to the legacy bare-sample form (no `type` tag, but a
/// `concentration` field) before giving up.
pub fn decode_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => Ok(message),
        Err(tagged_err) => {
            if let Ok(sample) = serde_json::from_str::<Sample>(text) {
                return Ok(ServerMessage::ConcentrationData { data: sample });
            }
            Err(ProtocolError::Malformed(tagged_err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_stream() {
        let line = encode_command(&ClientCommand::StartStream {
            session_id: 1,
            speed: 1.0,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "start_stream");
        assert_eq!(value["session_id"], 1);
        assert_eq!(value["speed"], 1.0);
    }

    #[test]
    fn test_encode_exercise_selected() {
        let line = encode_command(&ClientCommand::ExerciseSelected {
            exercise_type: PlanKind::Breathing,
            session_id: 7,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "exercise_selected");
        assert_eq!(value["exercise_type"], "breathing");
        assert_eq!(value["session_id"], 7);
    }

    #[test]
    fn test_decode_concentration_data() {
        let text = r#"{
            "type": "concentration_data",
            "data": {
                "concentration": 47.2,
                "stress": 22.0,
                "heart_rate": 68.0,
                "focus": 51.0,
                "timestamp": "01:42",
                "data_index": 102,
                "total_points": 600
            },
            "timestamp": "2024-05-01T10:00:00"
        }"#;

        match decode_message(text).unwrap() {
            ServerMessage::ConcentrationData { data } => {
                assert_eq!(data.concentration, 47.2);
                assert_eq!(data.sequence_index, Some(102));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_bare_sample() {
        let text = r#"{"concentration": 28.5, "stress": 40.0, "heart_rate": 80.0}"#;
        match decode_message(text).unwrap() {
            ServerMessage::ConcentrationData { data } => {
                assert_eq!(data.concentration, 28.5);
                assert_eq!(data.sequence_index, None);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_exercise_notification_alias() {
        let text = r#"{
            "type": "exercise_notification",
            "exercises": [
                {"id": 1, "name": "Breathing exercise", "type": "breathing", "duration": 5},
                {"id": 2, "name": "Movement exercise", "type": "movement", "duration": 3}
            ],
            "current_concentration": 24.1
        }"#;

        match decode_message(text).unwrap() {
            ServerMessage::ExerciseSuggestion {
                exercises,
                current_concentration,
            } => {
                assert_eq!(exercises.len(), 2);
                assert_eq!(exercises[0].candidate().duration_seconds, 300);
                assert_eq!(exercises[1].candidate().duration_seconds, 180);
                assert_eq!(current_concentration, Some(24.1));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_type_is_error() {
        let text = r#"{"type": "current_metrics", "data": {"avg": 1.0}}"#;
        assert!(decode_message(text).is_err());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode_message("not json at all").is_err());
        assert!(decode_message("{\"stress\": 12.0}").is_err());
    }

    #[test]
    fn test_speed_validation() {
        for speed in VALID_SPEEDS {
            assert!(is_valid_speed(speed));
        }
        assert!(!is_valid_speed(3.0));
        assert!(!is_valid_speed(0.0));
        assert!(!is_valid_speed(-1.0));
    }
}
