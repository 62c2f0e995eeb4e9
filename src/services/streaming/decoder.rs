//! Consumer side of the streaming bridge

use super::cancel::CancellationToken;
use super::channel::{stream_channel, StreamReceiver};
use super::worker::GenerationWorker;
use crate::inference::{GenerationConfig, TokenGenerator};
use crate::tokenizer::TextTokenizer;
use crate::types::{ChatError, StreamItem, Termination};
use std::iter::FusedIterator;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Turns a prompt into a lazily decoded, growing sequence of text snapshots.
#[derive(Clone)]
pub struct StreamingDecoder {
    worker: GenerationWorker,
    tokenizer: Arc<dyn TextTokenizer>,
}

impl StreamingDecoder {
    pub fn new(generator: Arc<dyn TokenGenerator>, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        Self {
            worker: GenerationWorker::new(generator, tokenizer.clone()),
            tokenizer,
        }
    }

    /// Start generating and return the snapshot stream.
    ///
    /// The worker thread is already running when this returns; iterate the
    /// stream on a thread that may block.
    pub fn stream(&self, prompt: String, config: GenerationConfig) -> Result<TokenStream, ChatError> {
        let (sender, receiver) = stream_channel();
        let cancel = CancellationToken::new();
        let handle = self
            .worker
            .spawn(prompt, config, sender, cancel.clone())
            .map_err(ChatError::Spawn)?;

        Ok(TokenStream {
            receiver,
            tokenizer: self.tokenizer.clone(),
            token_ids: Vec::new(),
            worker: Some(handle),
            cancel,
            primed: false,
            last_snapshot: String::new(),
            termination: None,
        })
    }
}

/// Growing-prefix text snapshots of one generation run.
///
/// Each item is the decode of every token received so far. Iteration ends
/// after the worker's termination item has been received and the worker
/// thread joined. Dropping the stream early cancels and joins the worker.
pub struct TokenStream {
    receiver: StreamReceiver,
    tokenizer: Arc<dyn TextTokenizer>,
    token_ids: Vec<u32>,
    worker: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    primed: bool,
    last_snapshot: String,
    termination: Option<Termination>,
}

impl TokenStream {
    /// How the run ended, once iteration has finished
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Tokens accumulated so far, without the discarded prompt echo
    pub fn token_ids(&self) -> &[u32] {
        &self.token_ids
    }

    /// Ask the worker to stop; the stream then ends with `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn finish(&mut self, termination: Termination) {
        self.join_worker();
        tracing::debug!(tokens = self.token_ids.len(), outcome = ?termination, "stream finished");
        self.termination = Some(termination);
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("generation worker panicked outside its guard");
            }
        }
    }
}

impl Iterator for TokenStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.termination.is_some() {
            return None;
        }

        if !self.primed {
            self.primed = true;
            // The first item echoes the prompt and is never shown.
            if let StreamItem::Termination(termination) = self.receiver.receive() {
                self.finish(termination);
                return None;
            }
        }

        loop {
            match self.receiver.receive() {
                StreamItem::Termination(termination) => {
                    self.finish(termination);
                    return None;
                }
                StreamItem::Content(token_id) => {
                    self.token_ids.push(token_id);
                    // Decode everything: token boundaries are not character boundaries.
                    match self.tokenizer.decode(&self.token_ids) {
                        // Special or partial byte tokens can leave the text unchanged.
                        Ok(text) if text == self.last_snapshot => {
                            tracing::trace!(token_id, "token did not change the text");
                        }
                        Ok(text) => {
                            self.last_snapshot.clone_from(&text);
                            return Some(text);
                        }
                        Err(e) => {
                            tracing::warn!(tokens = self.token_ids.len(), "skipping snapshot: {:#}", e);
                        }
                    }
                }
            }
        }
    }
}

impl FusedIterator for TokenStream {}

impl Drop for TokenStream {
    fn drop(&mut self) {
        if self.worker.is_some() {
            tracing::debug!("stream dropped before completion, cancelling worker");
            self.cancel.cancel();
            self.join_worker();
        }
    }
}
