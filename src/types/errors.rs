//! Error types surfaced by the chat core

use thiserror::Error;

/// Rejected chat input, reported before any generation work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormattingError {
    #[error("message is empty after trimming whitespace")]
    EmptyMessage,
}

/// Errors returned when starting a streamed response.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid chat input: {0}")]
    Formatting(#[from] FormattingError),

    #[error("failed to spawn generation worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The consuming half of a stream channel has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream receiver dropped")]
pub struct ChannelClosed;
