//! Quantized Llama backend on candle

use super::generation::{GenerationConfig, TokenGenerator, TokenSink};
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::models::quantized_llama::{ModelWeights, MAX_SEQ_LEN};
use std::fs::File;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Llama 2 end-of-sequence token `</s>`
pub const LLAMA2_EOS_TOKEN: u32 = 2;

pub struct CandleEngine {
    // Weights hold the KV cache, so one generation runs at a time.
    weights: Mutex<ModelWeights>,
    device: Device,
    eos_token_id: u32,
    context_length: usize,
}

impl CandleEngine {
    /// Load GGUF weights onto `device`
    pub fn from_gguf<P: AsRef<Path>>(path: P, device: &Device) -> anyhow::Result<Self> {
        let path = path.as_ref();
        tracing::info!("📦 Loading GGUF model from {}", path.display());
        let start = Instant::now();

        let mut file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open model {:?}: {}", path, e))?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| e.with_path(path))?;

        tracing::info!(
            "📊 GGUF: {} tensors, {} metadata entries",
            content.tensor_infos.len(),
            content.metadata.len()
        );

        let weights = ModelWeights::from_gguf(content, &mut file, device)?;
        tracing::info!("✅ Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self {
            weights: Mutex::new(weights),
            device: device.clone(),
            eos_token_id: LLAMA2_EOS_TOKEN,
            context_length: MAX_SEQ_LEN,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn next_logits(weights: &mut ModelWeights, input: &Tensor, position: usize) -> candle_core::Result<Tensor> {
        weights.forward(input, position)?.squeeze(0)
    }
}

impl TokenGenerator for CandleEngine {
    fn name(&self) -> &str {
        "candle-quantized-llama"
    }

    fn generate(
        &self,
        input_ids: &[u32],
        config: &GenerationConfig,
        sink: &mut dyn TokenSink,
    ) -> anyhow::Result<()> {
        let Some(&last_prompt_token) = input_ids.last() else {
            anyhow::bail!("cannot generate from an empty prompt");
        };
        if input_ids.len() >= self.context_length {
            anyhow::bail!(
                "prompt has {} tokens, context window is {}",
                input_ids.len(),
                self.context_length
            );
        }

        let mut weights = lock_weights(&self.weights);
        let mut logits_processor = config.logits_processor();
        let budget = config.max_tokens.min(self.context_length - input_ids.len());

        // Prompt echo
        if sink.put(last_prompt_token).is_break() {
            return Ok(());
        }

        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        let logits = Self::next_logits(&mut weights, &input, 0)?;
        let prompt_len = input_ids.len();

        decode_loop(
            logits,
            budget,
            self.eos_token_id,
            sink,
            |logits| Ok(logits_processor.sample(logits)?),
            |token, step| {
                let input = Tensor::new(&[token], &self.device)?.unsqueeze(0)?;
                Ok(Self::next_logits(&mut weights, &input, prompt_len + step)?)
            },
        )
    }
}

/// Sample up to `budget` tokens starting from the prompt's `logits`.
///
/// EOS ends the run without reaching the sink, and no forward pass runs
/// after the last token of the budget.
fn decode_loop<L>(
    mut logits: L,
    budget: usize,
    eos_token_id: u32,
    sink: &mut dyn TokenSink,
    mut sample: impl FnMut(&L) -> anyhow::Result<u32>,
    mut forward: impl FnMut(u32, usize) -> anyhow::Result<L>,
) -> anyhow::Result<()> {
    for step in 0..budget {
        let next_token = sample(&logits)?;
        tracing::trace!(step, next_token, "sampled token");

        if next_token == eos_token_id {
            tracing::debug!(step, "end of sequence");
            break;
        }
        if let ControlFlow::Break(()) = sink.put(next_token) {
            tracing::debug!(step, "generation stopped by consumer");
            return Ok(());
        }
        if step + 1 == budget {
            break;
        }
        logits = forward(next_token, step)?;
    }
    Ok(())
}

/// Lock model state even if an earlier generation panicked while holding it.
///
/// Every run starts at position 0, which resets the KV cache, so state left
/// behind by a panicked run is never read.
fn lock_weights<T>(weights: &Mutex<T>) -> MutexGuard<'_, T> {
    weights.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("⚠️ Model lock poisoned by an earlier panic, reusing weights");
        weights.clear_poison();
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    /// Feeds `tokens` through the loop; "logits" are just the step index.
    fn run_loop(tokens: &[u32], budget: usize) -> anyhow::Result<(Vec<u32>, usize)> {
        let mut seen = Vec::new();
        let mut forwards = 0;
        decode_loop(
            0usize,
            budget,
            LLAMA2_EOS_TOKEN,
            &mut |id: u32| {
                seen.push(id);
                ControlFlow::Continue(())
            },
            |step| Ok(tokens[*step]),
            |_, step| {
                forwards += 1;
                Ok(step + 1)
            },
        )?;
        Ok((seen, forwards))
    }

    #[test]
    fn test_eos_is_not_forwarded() -> anyhow::Result<()> {
        let (seen, forwards) = run_loop(&[10, 11, LLAMA2_EOS_TOKEN, 12], 8)?;
        assert_eq!(seen, vec![10, 11]);
        assert_eq!(forwards, 2);
        Ok(())
    }

    #[test]
    fn test_no_forward_after_last_budgeted_token() -> anyhow::Result<()> {
        let (seen, forwards) = run_loop(&[10, 11, 12, 13], 3)?;
        assert_eq!(seen, vec![10, 11, 12]);
        assert_eq!(forwards, 2);
        Ok(())
    }

    #[test]
    fn test_sink_break_stops_loop() -> anyhow::Result<()> {
        let mut forwards = 0;
        decode_loop(
            0usize,
            8,
            LLAMA2_EOS_TOKEN,
            &mut |_: u32| ControlFlow::Break(()),
            |_| Ok(5),
            |_, step| {
                forwards += 1;
                Ok(step + 1)
            },
        )?;
        assert_eq!(forwards, 0);
        Ok(())
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let weights = Mutex::new(vec![1u32, 2, 3]);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut guard = lock_weights(&weights);
            guard.push(4);
            panic!("forward pass failed");
        }));
        assert!(result.is_err());
        assert!(weights.is_poisoned());

        // Later runs still get the state.
        assert_eq!(*lock_weights(&weights), vec![1, 2, 3, 4]);
        assert!(!weights.is_poisoned());
        assert_eq!(lock_weights(&weights).len(), 4);
    }
}
