//! Token streaming between a blocking generator and a snapshot consumer

pub mod cancel;
pub mod channel;
pub mod decoder;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use channel::{stream_channel, StreamReceiver, StreamSender};
pub use decoder::{StreamingDecoder, TokenStream};
pub use worker::GenerationWorker;
