//! Generation backends

pub mod engine;
pub mod generation;
pub mod stub;

pub use engine::CandleEngine;
pub use generation::{GenerationConfig, TokenGenerator, TokenSink};
pub use stub::StubGenerator;
