use crate::inference::GenerationConfig;
use crate::llama2::DEFAULT_SYSTEM_PROMPT;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub host: String,
    pub port: u16,

    // Model configuration
    pub model_id: String,
    pub model_path: String,
    pub tokenizer_path: String,
    pub device: DeviceConfig,
    pub stub_mode: bool,

    // Chat behavior
    pub system_prompt: String,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceConfig {
    Cpu,
    Cuda(usize),
    Metal,
}

impl FromStr for DeviceConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceConfig::Cpu),
            "cuda" => Ok(DeviceConfig::Cuda(0)),
            "metal" => Ok(DeviceConfig::Metal),
            other => match other.strip_prefix("cuda:") {
                Some(idx) => Ok(DeviceConfig::Cuda(idx.parse()?)),
                None => anyhow::bail!("Unknown device '{}', expected cpu, cuda[:N] or metal", s),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            model_id: "llama-2-7b-chat".to_string(),
            model_path: "models/llama-2-7b-chat.Q4_K_M.gguf".to_string(),
            tokenizer_path: "models/tokenizer.json".to_string(),
            device: DeviceConfig::Cpu,
            stub_mode: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let sampling = &defaults.generation;

        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,

            model_id: lookup("MODEL_ID").unwrap_or(defaults.model_id),
            model_path: lookup("MODEL_PATH").unwrap_or(defaults.model_path),
            tokenizer_path: lookup("TOKENIZER_PATH").unwrap_or(defaults.tokenizer_path),
            device: parse_or(&lookup, "DEVICE", defaults.device)?,
            stub_mode: lookup("STUB_MODE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.stub_mode),

            system_prompt: lookup("SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            generation: GenerationConfig {
                temperature: parse_or(&lookup, "TEMPERATURE", sampling.temperature)?,
                top_p: parse_or(&lookup, "TOP_P", sampling.top_p)?,
                max_tokens: parse_or(&lookup, "MAX_TOKENS", sampling.max_tokens)?,
                seed: parse_or(&lookup, "SEED", sampling.seed)?,
            },
        })
    }

    pub fn to_candle_device(&self) -> candle_core::Device {
        match &self.device {
            DeviceConfig::Cpu => candle_core::Device::Cpu,
            DeviceConfig::Cuda(idx) => candle_core::Device::new_cuda(*idx).unwrap_or_else(|e| {
                tracing::warn!("⚠️ CUDA device {} unavailable ({}), using CPU", idx, e);
                candle_core::Device::Cpu
            }),
            DeviceConfig::Metal => candle_core::Device::new_metal(0).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Metal device unavailable ({}), using CPU", e);
                candle_core::Device::Cpu
            }),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[]))?;
        assert_eq!(config.port, 3000);
        assert_eq!(config.device, DeviceConfig::Cpu);
        assert!(!config.stub_mode);
        assert_eq!(config.generation, GenerationConfig::default());
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        Ok(())
    }

    #[test]
    fn test_overrides_are_parsed() -> anyhow::Result<()> {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DEVICE", "cuda:1"),
            ("TEMPERATURE", "0"),
            ("MAX_TOKENS", "64"),
            ("STUB_MODE", "true"),
            ("SYSTEM_PROMPT", "Answer in French."),
        ]))?;
        assert_eq!(config.port, 8080);
        assert_eq!(config.device, DeviceConfig::Cuda(1));
        assert_eq!(config.generation.temperature, 0.0);
        assert_eq!(config.generation.max_tokens, 64);
        assert_eq!(config.generation.top_p, 0.9);
        assert!(config.stub_mode);
        assert_eq!(config.system_prompt, "Answer in French.");
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(Config::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DEVICE", "tpu")])).is_err());
    }

    #[test]
    fn test_device_parsing() -> anyhow::Result<()> {
        assert_eq!("CPU".parse::<DeviceConfig>()?, DeviceConfig::Cpu);
        assert_eq!("cuda".parse::<DeviceConfig>()?, DeviceConfig::Cuda(0));
        assert_eq!("metal".parse::<DeviceConfig>()?, DeviceConfig::Metal);
        assert!("cuda:x".parse::<DeviceConfig>().is_err());
        Ok(())
    }
}
