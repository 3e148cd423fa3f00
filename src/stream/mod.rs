//! Telemetry stream client
//!
//! Connects to a biosignal feed over TCP, speaking newline-delimited JSON.
//! The client owns the connection lifecycle (connect, start/stop streaming,
//! one-shot reconnect on unexpected close) and surfaces everything the feed
//! sends as a stream of [`StreamEvent`]s.

mod client;
mod retry;
mod transport;

pub use client::TelemetryStreamClient;
pub use retry::RetryPolicy;
pub use transport::{ChannelFeed, ChannelTransport, TcpTransport, Transport, TransportError};

use thiserror::Error;

use crate::protocol::ProtocolError;
use crate::types::{ConnectionState, Sample};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f64),

    #[error("Not connected to the feed")]
    NotConnected,
}

/// Everything the client can report back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    StatusChanged(ConnectionState),
    Sample(Sample),
    /// The feed suggested exercises alongside a live concentration reading
    InterventionHint {
        exercises: Vec<crate::types::ExerciseCandidate>,
        current_concentration: Option<f64>,
    },
    StreamStarted {
        speed: f64,
    },
    StreamStopped,
    /// No start acknowledgement arrived within the ack window
    StartTimedOut,
    ServerError(String),
}
