//! Scripted backend for exercising the streaming protocol

use crate::inference::{GenerationConfig, TokenGenerator, TokenSink};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    Token(u32),
    Fail(&'static str),
    Panic,
}

/// Echoes the last prompt token, then plays back its script.
pub struct ScriptedGenerator {
    script: Vec<Step>,
    endless: Option<u32>,
    delay: Duration,
    pub emitted: Arc<AtomicUsize>,
    pub stopped_by_sink: Arc<AtomicBool>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            endless: None,
            delay: Duration::ZERO,
            emitted: Arc::new(AtomicUsize::new(0)),
            stopped_by_sink: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn tokens(ids: &[u32]) -> Self {
        Self::new(ids.iter().copied().map(Step::Token).collect())
    }

    /// Repeats `token_id` until the sink asks to stop.
    pub fn endless(token_id: u32, delay: Duration) -> Self {
        Self {
            endless: Some(token_id),
            delay,
            ..Self::new(Vec::new())
        }
    }

    fn put(&self, sink: &mut dyn TokenSink, token_id: u32) -> bool {
        if sink.put(token_id).is_break() {
            self.stopped_by_sink.store(true, Ordering::SeqCst);
            return false;
        }
        self.emitted.fetch_add(1, Ordering::SeqCst);
        true
    }
}

impl TokenGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(
        &self,
        input_ids: &[u32],
        _config: &GenerationConfig,
        sink: &mut dyn TokenSink,
    ) -> anyhow::Result<()> {
        let echo = input_ids.last().copied().unwrap_or_default();
        if !self.put(sink, echo) {
            return Ok(());
        }

        if let Some(token_id) = self.endless {
            loop {
                thread::sleep(self.delay);
                if !self.put(sink, token_id) {
                    return Ok(());
                }
            }
        }

        for step in &self.script {
            match step {
                Step::Token(id) => {
                    if !self.put(sink, *id) {
                        return Ok(());
                    }
                }
                Step::Fail(reason) => anyhow::bail!("{}", reason),
                Step::Panic => panic!("scripted panic"),
            }
        }
        Ok(())
    }
}

/// Fails before producing anything, like a tokenizer rejecting the prompt.
pub struct FailingTokenizer;

impl crate::tokenizer::TextTokenizer for FailingTokenizer {
    fn encode(&self, _text: &str) -> anyhow::Result<Vec<u32>> {
        anyhow::bail!("tokenizer unavailable")
    }

    fn decode(&self, _ids: &[u32]) -> anyhow::Result<String> {
        anyhow::bail!("tokenizer unavailable")
    }
}
