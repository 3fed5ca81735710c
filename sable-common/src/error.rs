//! Shared error model for cross-crate APIs.

use thiserror::Error;

/// Unified result type used by all public interfaces in `sable`.
pub type SableResult<T> = Result<T, SableError>;

/// High-level error categories shared by the facade, core, and server crates.
///
/// Command-level validation failures (arity, WRONGTYPE, value domain) are not represented here;
/// they travel as reply-text results and become RESP Error frames at the dispatch boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SableError {
    /// Configuration is invalid for the requested operation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Runtime state does not allow this operation.
    #[error("invalid runtime state: {0}")]
    InvalidState(&'static str),

    /// Client protocol payload is malformed. Fatal to the offending connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Socket or filesystem I/O failed.
    #[error("io error: {0}")]
    Io(String),
}
