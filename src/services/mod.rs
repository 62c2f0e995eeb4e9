pub mod chat;
mod metrics;
pub mod streaming;

pub use chat::ChatService;
pub use metrics::{MetricsService, MetricsStats};
pub use streaming::{CancellationToken, StreamingDecoder, TokenStream};
