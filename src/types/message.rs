use serde::{Deserialize, Serialize};

use crate::inference::GenerationConfig;

/// One user/assistant exchange of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user_message: String,
    pub assistant_message: String,
}

impl Turn {
    pub fn new(user_message: impl Into<String>, assistant_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            assistant_message: assistant_message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default)]
    pub generation: Option<GenerationOverrides>,
}

/// Per-request sampling knobs; unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOverrides {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<usize>,
}

impl GenerationOverrides {
    pub fn apply(&self, defaults: &GenerationConfig) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            seed: defaults.seed,
        }
    }
}
