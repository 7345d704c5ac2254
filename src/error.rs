//! Error types for the relay
//!
//! Errors from the external collaborators (negotiation library, voice client,
//! outbound sinks) get their own types so adapters can match on them. Sink
//! errors stay inside the egress worker; the crate-level [`Error`] wraps the
//! other two for the coordinator and control surface.

use axum::http::StatusCode;

use crate::voice::Destination;

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed or incompatible session description
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalingError {
    /// The offer could not be parsed
    #[error("malformed session description: {0}")]
    Malformed(String),
    /// The negotiation library refused the offer
    #[error("negotiation failed: {0}")]
    Negotiation(String),
}

/// Failure talking to the voice platform
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    /// No voice session has been started yet
    #[error("voice session not started")]
    NotStarted,
    /// Opening the voice session failed
    #[error("failed to start voice session: {0}")]
    Start(String),
    /// Joining a voice channel failed
    #[error("failed to join {destination}: {reason}")]
    Join {
        destination: Destination,
        reason: String,
    },
    /// Leaving a voice channel failed
    #[error("failed to leave {destination}: {reason}")]
    Leave {
        destination: Destination,
        reason: String,
    },
    /// Any other platform failure (metadata lookups etc.)
    #[error("voice platform error: {0}")]
    Platform(String),
}

/// Failure reported by an outbound audio sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The sink is gone for good
    #[error("sink closed")]
    Closed,
    /// A single send failed; later sends may succeed
    #[error("send failed: {0}")]
    Failed(String),
}

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The destination already has a live subscription
    #[error("already joined {0}")]
    AlreadyJoined(Destination),

    /// The broadcast hub control loop has exited
    #[error("broadcast hub is shut down")]
    HubClosed,

    /// Reading an inbound track failed
    #[error("inbound track failed: {0}")]
    Track(String),

    /// A coordinator task panicked or was aborted
    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status the control surface answers with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Signaling(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyJoined(_) => StatusCode::CONFLICT,
            Error::Connection(ConnectionError::NotStarted) => StatusCode::PRECONDITION_FAILED,
            Error::Connection(_) | Error::Track(_) => StatusCode::BAD_GATEWAY,
            Error::HubClosed => StatusCode::SERVICE_UNAVAILABLE,
            Error::Task(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
