pub mod errors;
pub mod events;
pub mod message;

pub use errors::{ChannelClosed, ChatError, FormattingError};
pub use events::{StreamEvent, StreamItem, Termination};
pub use message::{ChatRequest, GenerationOverrides, Turn};
