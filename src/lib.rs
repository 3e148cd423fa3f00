//! FocusGuard: Biosignal Attention Monitoring
//!
//! Streams concentration telemetry from a headset feed, watches for
//! attention drops, and walks the user through guided recovery exercises.
//!
//! ## Architecture
//!
//! - **Stream Client**: TCP line-JSON feed client with ack timeouts and a
//!   single-shot reconnect
//! - **Sample Buffer**: fixed-capacity FIFO of the most recent readings
//! - **Intervention Trigger**: threshold and baseline-dip detection
//! - **Guided Sessions**: breathing / calibration / movement state machines
//! - **Coordinator**: ties monitoring and interventions together

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod session;
pub mod stream;
pub mod trigger;
pub mod types;

// Re-export the configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{ConnectionState, ExerciseCandidate, InterventionRequest, PlanKind, Sample};

// Re-export the main moving parts
pub use buffer::SampleBuffer;
pub use coordinator::{Activity, SessionCoordinator};
pub use session::{GuidedSession, SessionEvent, SessionStatus};
pub use stream::{StreamError, StreamEvent, TcpTransport, TelemetryStreamClient};
pub use trigger::InterventionTrigger;
