use super::generation::{GenerationConfig, TokenGenerator, TokenSink};
use crate::tokenizer::TextTokenizer;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Stub backend for running without model files.
///
/// Streams a canned reply word by word through the configured tokenizer.
pub struct StubGenerator {
    tokenizer: Arc<dyn TextTokenizer>,
    token_delay: Duration,
}

impl StubGenerator {
    pub fn new(tokenizer: Arc<dyn TextTokenizer>) -> Self {
        tracing::info!("📦 Creating stub generator (no model loaded)");
        Self {
            tokenizer,
            token_delay: Duration::from_millis(50),
        }
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    fn reply(&self, prompt_tokens: usize) -> String {
        format!(
            "This is a stub response to a prompt of {} tokens. \
             No model is loaded, so the streaming bridge is replaying canned text.",
            prompt_tokens
        )
    }
}

impl TokenGenerator for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate(
        &self,
        input_ids: &[u32],
        config: &GenerationConfig,
        sink: &mut dyn TokenSink,
    ) -> anyhow::Result<()> {
        let echo = input_ids.last().copied().unwrap_or_default();
        if sink.put(echo).is_break() {
            return Ok(());
        }

        let reply = self.tokenizer.encode(&self.reply(input_ids.len()))?;
        for token_id in reply.into_iter().take(config.max_tokens) {
            if !self.token_delay.is_zero() {
                thread::sleep(self.token_delay);
            }
            if sink.put(token_id).is_break() {
                break;
            }
        }
        Ok(())
    }
}
