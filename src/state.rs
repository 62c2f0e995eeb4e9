use crate::config::Config;
use crate::inference::{CandleEngine, StubGenerator, TokenGenerator};
use crate::llama2::{ChatTemplate, PromptMarkers};
use crate::services::{ChatService, MetricsService};
use crate::tokenizer::{LlamaTokenizer, StubTokenizer, TextTokenizer};
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<ChatService>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        tracing::info!("[STATE] Initializing AppState...");
        tracing::info!("[STATE]   Model: {} ({})", config.model_id, config.model_path);
        tracing::info!("[STATE]   Device: {:?}", config.device);

        let (generator, tokenizer) = if config.stub_mode {
            tracing::info!("[STATE] 📦 Stub mode requested");
            stub_backend()
        } else {
            match load_backend(&config) {
                Ok(backend) => {
                    tracing::info!("[STATE] ✅ Model loaded successfully");
                    backend
                }
                Err(e) => {
                    tracing::error!("[STATE] ⚠️ Model loading failed: {:#}", e);
                    tracing::warn!("[STATE] 🌐 Server will answer with the stub backend");
                    stub_backend()
                }
            }
        };

        let chat = ChatService::new(
            ChatTemplate::new(PromptMarkers::llama2()),
            config.system_prompt.clone(),
            config.generation.clone(),
            generator,
            tokenizer,
        );

        Ok(Self {
            config: Arc::new(config),
            chat: Arc::new(chat),
            metrics: Arc::new(MetricsService::new()),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }
}

type Backend = (Arc<dyn TokenGenerator>, Arc<dyn TextTokenizer>);

fn load_backend(config: &Config) -> Result<Backend> {
    let tokenizer: Arc<dyn TextTokenizer> = Arc::new(LlamaTokenizer::from_file(&config.tokenizer_path)?);
    let engine: Arc<dyn TokenGenerator> =
        Arc::new(CandleEngine::from_gguf(&config.model_path, &config.to_candle_device())?);
    Ok((engine, tokenizer))
}

fn stub_backend() -> Backend {
    let tokenizer: Arc<dyn TextTokenizer> = Arc::new(StubTokenizer::new());
    let generator: Arc<dyn TokenGenerator> = Arc::new(StubGenerator::new(tokenizer.clone()));
    (generator, tokenizer)
}
