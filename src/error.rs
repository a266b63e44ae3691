// ABOUTME: Crate-wide error taxonomy for the RESP client's transport, protocol and queueing layers
// ABOUTME: Mirrors the teacher's client::error::SmppError shape: one thiserror variant per failure class

use std::io;
use thiserror::Error;

/// Error returned by connection, pool, queue and client operations.
///
/// The variants follow the taxonomy from the design: transport/protocol errors
/// terminate the connection that produced them, while `ServerError` represents a
/// well-formed RESP error frame and is not a transport-level failure at all.
#[derive(Debug, Error, Clone)]
pub enum RespError {
    /// Socket I/O failure. Triggers connection teardown.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame, oversize length, depth exceeded, bare LF, unknown prefix.
    /// Triggers connection teardown.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection holding the request went `Failed` mid-flight. Safe to
    /// retry only if the caller knows the command is idempotent.
    #[error("connection broken while request was in flight")]
    Broken,

    /// A well-formed `-ERR`/`-WRONGTYPE`/etc RESP error frame, surfaced to the
    /// caller as data rather than as a transport-level exception.
    #[error("server error: {0}")]
    ServerError(String),

    /// Submission cancelled before it was dispatched onto a connection.
    #[error("submission cancelled before dispatch")]
    Cancelled,

    /// `command_timeout` elapsed; the dispatcher continues draining the reply.
    #[error("command timed out")]
    TimedOut,

    /// Ingress channel was full under `OverflowMode::Error`, or this specific
    /// item was evicted under `OverflowMode::DropOldest`.
    #[error("submission queue overflowed")]
    QueueOverflow,

    /// A command wrapper that assumes a specific reply shape (e.g. SET's
    /// simple-string `OK`) received something else.
    #[error("protocol violation: expected {expected}, got {actual}")]
    ProtocolViolation { expected: String, actual: String },

    /// Submission made after the client was shut down.
    #[error("client is closed")]
    ClosedClient,

    /// No live connection was available to satisfy a lease request.
    #[error("no healthy connection available in pool")]
    PoolExhausted,
}

impl From<io::Error> for RespError {
    fn from(err: io::Error) -> Self {
        RespError::Transport(err.to_string())
    }
}

impl From<crate::resp::reader::ReaderError> for RespError {
    fn from(err: crate::resp::reader::ReaderError) -> Self {
        RespError::Protocol(err.to_string())
    }
}

/// A specialized `Result` type for RESP client operations.
pub type RespResult<T> = std::result::Result<T, RespError>;
