//! Session error types.

use thiserror::Error;

use pioneer_api::{ApiError, ErrorCode};

/// Errors surfaced by the session layer.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The session is not connected and ready.
    #[error("AVR connection is not available")]
    Unavailable,

    /// `connect` was called while a session is already up.
    #[error("AVR connection already established")]
    AlreadyConnected,

    /// Dial or handshake failed, or the link dropped mid-request.
    #[error("could not connect to AVR: {0}")]
    ConnectionFailed(String),

    /// No matching response arrived within the deadline.
    #[error("AVR command {command} timed out")]
    ResponseTimeout { command: String },

    /// The AVR answered the request with an `E0x` error frame.
    #[error("AVR command {command} returned error: {code}")]
    Device { command: String, code: ErrorCode },

    /// The queue or session was torn down while the request was pending.
    #[error("request cancelled")]
    Cancelled,

    /// The command is not in the code table for the requested zone.
    #[error(transparent)]
    UnknownCommand(#[from] ApiError),
}

/// Convenience alias for results using [`SessionError`].
pub type Result<T> = std::result::Result<T, SessionError>;
