//! Generation boundary shared by every backend
//!
//! A backend runs one blocking generation call per request and reports each
//! produced token through a [`TokenSink`]. Backends echo the prompt before
//! producing new tokens: the first `put` of a run carries the last prompt
//! token, and consumers drop it.

use candle_transformers::generation::{LogitsProcessor, Sampling};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Sampling settings for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature; `<= 0` means greedy decoding
    pub temperature: f64,
    /// Nucleus sampling cutoff
    pub top_p: f64,
    /// Maximum number of new tokens
    pub max_tokens: usize,
    /// Seed for reproducible sampling
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            top_p: 0.9,
            max_tokens: 4096,
            seed: 42,
        }
    }
}

impl GenerationConfig {
    /// Build a candle logits processor for these settings
    pub fn logits_processor(&self) -> LogitsProcessor {
        let sampling = if self.temperature <= 0.0 {
            Sampling::ArgMax
        } else if self.top_p > 0.0 && self.top_p < 1.0 {
            Sampling::TopP {
                p: self.top_p,
                temperature: self.temperature,
            }
        } else {
            Sampling::All {
                temperature: self.temperature,
            }
        };
        LogitsProcessor::from_sampling(self.seed, sampling)
    }
}

/// Receives tokens as a backend produces them.
pub trait TokenSink {
    /// Deliver one token. `Break` asks the backend to stop generating.
    fn put(&mut self, token_id: u32) -> ControlFlow<()>;
}

impl<F> TokenSink for F
where
    F: FnMut(u32) -> ControlFlow<()>,
{
    fn put(&mut self, token_id: u32) -> ControlFlow<()> {
        self(token_id)
    }
}

/// A blocking text generation backend.
///
/// Implementations may be called from several worker threads at once and
/// must serialize internally if the underlying model is not reentrant.
pub trait TokenGenerator: Send + Sync {
    /// Short backend name used in logs and health output
    fn name(&self) -> &str;

    /// Generate a continuation of `input_ids`, pushing every token into `sink`.
    ///
    /// Returns `Ok(())` when generation finished or the sink asked to stop.
    fn generate(
        &self,
        input_ids: &[u32],
        config: &GenerationConfig,
        sink: &mut dyn TokenSink,
    ) -> anyhow::Result<()>;
}
