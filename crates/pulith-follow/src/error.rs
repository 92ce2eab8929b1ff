//! Error types for pulith-follow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("range not satisfiable at offset {offset}")]
    RangeNotSatisfiable { offset: u64 },

    #[error("unexpected HTTP status {status} ({attempts} consecutive attempts)")]
    UnexpectedStatus { status: u16, attempts: u32 },

    #[error("response body ended early: expected {expected} bytes, received {received}")]
    ShortBody { expected: u64, received: u64 },
}

impl FollowError {
    pub(crate) fn transport<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        FollowError::Transport(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, FollowError>;
