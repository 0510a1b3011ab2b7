//! Membership error types

use thiserror::Error;

use super::types::Endpoint;

/// Result type for membership operations
pub type Result<T> = std::result::Result<T, MembershipError>;

/// Membership errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    // ==================== Codec Errors ====================
    #[error("unexpected end of buffer")]
    UnexpectedEnd,

    #[error("unknown message kind: {0}")]
    UnknownKind(u8),

    #[error("invalid snapshot length: {0}")]
    InvalidLength(i64),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("field value out of range: {0}")]
    OutOfRange(i64),

    // ==================== Transport Errors ====================
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(Endpoint),

    // ==================== Lifecycle Errors ====================
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("node has crashed")]
    Crashed,
}

impl MembershipError {
    /// Errors caused by a malformed inbound payload. These are dropped silently
    /// and left to periodic gossip to repair.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            MembershipError::UnexpectedEnd
                | MembershipError::UnknownKind(_)
                | MembershipError::InvalidLength(_)
                | MembershipError::TrailingBytes(_)
                | MembershipError::OutOfRange(_)
        )
    }
}
