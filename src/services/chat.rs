//! Chat entry point: prompt formatting plus streaming generation

use crate::inference::{GenerationConfig, TokenGenerator};
use crate::llama2::ChatTemplate;
use crate::services::streaming::{StreamingDecoder, TokenStream};
use crate::tokenizer::TextTokenizer;
use crate::types::{ChatError, Turn};
use std::sync::Arc;

/// Immutable per-process chat configuration shared by every request.
pub struct ChatService {
    template: ChatTemplate,
    system_prompt: String,
    defaults: GenerationConfig,
    decoder: StreamingDecoder,
    backend: String,
}

impl ChatService {
    pub fn new(
        template: ChatTemplate,
        system_prompt: impl Into<String>,
        defaults: GenerationConfig,
        generator: Arc<dyn TokenGenerator>,
        tokenizer: Arc<dyn TextTokenizer>,
    ) -> Self {
        let backend = generator.name().to_string();
        tracing::info!("💬 Chat service ready (backend: {})", backend);
        Self {
            template,
            system_prompt: system_prompt.into(),
            defaults,
            decoder: StreamingDecoder::new(generator, tokenizer),
            backend,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn defaults(&self) -> &GenerationConfig {
        &self.defaults
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Stream a reply to `message` with the configured generation settings.
    pub fn stream_response(&self, message: &str, history: &[Turn]) -> Result<TokenStream, ChatError> {
        self.stream_response_with(message, history, self.defaults.clone())
    }

    /// Stream a reply with explicit generation settings.
    ///
    /// Formatting errors are returned before any worker is started.
    pub fn stream_response_with(
        &self,
        message: &str,
        history: &[Turn],
        config: GenerationConfig,
    ) -> Result<TokenStream, ChatError> {
        let prompt = self.template.format(history, message, &self.system_prompt)?;
        tracing::debug!(
            history_turns = history.len(),
            prompt_chars = prompt.len(),
            "prompt formatted"
        );
        tracing::trace!("prompt: {}", prompt);
        self.decoder.stream(prompt, config)
    }
}
