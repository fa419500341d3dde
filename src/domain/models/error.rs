use thiserror::Error;

pub const TRANSPORT_FAILURE_MESSAGE: &str = "Streaming recognition failed, please retry";
pub const SERVER_FAILURE_MESSAGE: &str = "Stream error";
pub const FALLBACK_FAILURE_MESSAGE: &str = "Recognition failed, please retry";
pub const CANCELLED_NOTICE: &str = "Recognition cancelled";

/// A single malformed frame. Never fatal: the frame is skipped and decoding
/// carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse stream frame: {reason}")]
pub struct ProtocolParseError {
    pub reason: String,
    pub payload: String,
}

/// Failures that end a recognition job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The channel closed or errored without a terminal frame.
    #[error("{0}")]
    Transport(String),

    /// The service sent an explicit `error` frame.
    #[error("{0}")]
    Server(String),

    /// The synchronous fallback request failed.
    #[error("{0}")]
    Fallback(String),
}

/// A request the service answered with an error status and a `detail`
/// message meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct ServiceRejection {
    pub status: u16,
    pub detail: String,
}
