//! Text <-> token id conversion

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// Tokenizer boundary used by the streaming core.
///
/// Decoding must be deterministic for a fixed id sequence and must accept
/// any prefix of a generated sequence.
pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Hugging Face `tokenizer.json` wrapper for Llama models
pub struct LlamaTokenizer {
    inner: tokenizers::Tokenizer,
}

impl LlamaTokenizer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer from {:?}: {}", path, e))?;
        tracing::info!(
            "🔤 Tokenizer loaded: {} tokens in vocabulary",
            inner.get_vocab_size(true)
        );
        Ok(Self { inner })
    }
}

impl TextTokenizer for LlamaTokenizer {
    /// Encodes with special tokens so the prompt starts with `<s>`.
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenizer error: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("Tokenizer decode error: {}", e))
    }
}

/// Whitespace word tokenizer for stub mode and tests.
///
/// Unknown words are assigned the next free id on first encode, so ids are
/// stable for the lifetime of the tokenizer. Id 0 is `</s>` and is skipped
/// when decoding.
pub struct StubTokenizer {
    vocab: RwLock<Vocab>,
}

#[derive(Default)]
struct Vocab {
    words: Vec<String>,
    ids: HashMap<String, u32>,
}

impl StubTokenizer {
    pub const EOS: &'static str = "</s>";
    pub const EOS_ID: u32 = 0;

    pub fn new() -> Self {
        let mut vocab = Vocab::default();
        vocab.intern(Self::EOS);
        Self {
            vocab: RwLock::new(vocab),
        }
    }
}

impl Default for StubTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocab {
    fn intern(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as u32;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }
}

impl TextTokenizer for StubTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut vocab = self
            .vocab
            .write()
            .map_err(|_| anyhow::anyhow!("stub vocabulary poisoned"))?;
        Ok(text.split_whitespace().map(|word| vocab.intern(word)).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let vocab = self
            .vocab
            .read()
            .map_err(|_| anyhow::anyhow!("stub vocabulary poisoned"))?;
        let mut words = Vec::with_capacity(ids.len());
        for &id in ids {
            if id == Self::EOS_ID {
                continue;
            }
            let word = vocab
                .words
                .get(id as usize)
                .ok_or_else(|| anyhow::anyhow!("unknown token id {}", id))?;
            words.push(word.as_str());
        }
        Ok(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_roundtrip_normalizes_whitespace() -> Result<()> {
        let tokenizer = StubTokenizer::new();
        let ids = tokenizer.encode("  Hello   streaming world ")?;
        assert_eq!(ids.len(), 3);
        assert_eq!(tokenizer.decode(&ids)?, "Hello streaming world");
        Ok(())
    }

    #[test]
    fn test_stub_ids_are_stable() -> Result<()> {
        let tokenizer = StubTokenizer::new();
        let first = tokenizer.encode("a b a")?;
        let second = tokenizer.encode("b a")?;
        assert_eq!(first[0], first[2]);
        assert_eq!(second, vec![first[1], first[0]]);
        Ok(())
    }

    #[test]
    fn test_stub_skips_eos_and_rejects_unknown() -> Result<()> {
        let tokenizer = StubTokenizer::new();
        let mut ids = tokenizer.encode("done")?;
        ids.push(StubTokenizer::EOS_ID);
        assert_eq!(tokenizer.decode(&ids)?, "done");
        assert!(tokenizer.decode(&[999]).is_err());
        Ok(())
    }

    #[test]
    fn test_stub_prefix_decodes_grow() -> Result<()> {
        let tokenizer = StubTokenizer::new();
        let ids = tokenizer.encode("one two three")?;
        let mut previous = String::new();
        for end in 1..=ids.len() {
            let text = tokenizer.decode(&ids[..end])?;
            assert!(text.starts_with(&previous));
            previous = text;
        }
        Ok(())
    }
}
