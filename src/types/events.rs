use serde::{Deserialize, Serialize};

/// How a generation run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The generation routine returned normally.
    Completed,
    /// The consumer asked the worker to stop early.
    Cancelled,
    /// The tokenizer or generation routine failed; carries the reason.
    Failed(String),
}

impl Termination {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One event on the worker -> decoder channel.
///
/// A channel carries zero or more `Content` items followed by exactly one
/// `Termination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Content(u32),
    Termination(Termination),
}

/// Events pushed to HTTP clients over SSE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Full decoded text so far
    Snapshot { text: String },
    /// Terminal event
    Complete(Termination),
}

impl StreamEvent {
    pub fn snapshot(text: String) -> Self {
        Self::Snapshot { text }
    }

    pub fn complete(termination: Termination) -> Self {
        Self::Complete(termination)
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::Complete(_) => "complete",
        }
    }

    /// Payload written to the SSE `data:` field
    pub fn to_sse_data(&self) -> String {
        match self {
            Self::Snapshot { text } => text.clone(),
            Self::Complete(termination) => serde_json::to_string(termination).unwrap_or_default(),
        }
    }
}
