//! Producer side of the streaming bridge

use super::cancel::CancellationToken;
use super::channel::StreamSender;
use crate::inference::{GenerationConfig, TokenGenerator, TokenSink};
use crate::tokenizer::TextTokenizer;
use crate::types::Termination;
use std::any::Any;
use std::io;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Runs one blocking generation call on a dedicated thread.
#[derive(Clone)]
pub struct GenerationWorker {
    generator: Arc<dyn TokenGenerator>,
    tokenizer: Arc<dyn TextTokenizer>,
}

impl GenerationWorker {
    pub fn new(generator: Arc<dyn TokenGenerator>, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        Self { generator, tokenizer }
    }

    /// Start generating `prompt` on a new thread.
    ///
    /// The thread sends exactly one termination item into `sender` before it
    /// exits, whatever happens inside the tokenizer or generator.
    pub fn spawn(
        &self,
        prompt: String,
        config: GenerationConfig,
        sender: StreamSender,
        cancel: CancellationToken,
    ) -> io::Result<JoinHandle<()>> {
        let worker = self.clone();
        thread::Builder::new()
            .name("generation-worker".to_string())
            .spawn(move || worker.run(&prompt, &config, sender, cancel))
    }

    fn run(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        sender: StreamSender,
        cancel: CancellationToken,
    ) {
        let start = Instant::now();
        let mut sink = ChannelSink::new(sender, cancel);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            let input_ids = self.tokenizer.encode(prompt)?;
            tracing::debug!(
                backend = self.generator.name(),
                prompt_tokens = input_ids.len(),
                "generation started"
            );
            self.generator.generate(&input_ids, config, &mut sink)
        }));

        let termination = match outcome {
            Ok(Ok(())) if sink.stopped => Termination::Cancelled,
            Ok(Ok(())) => Termination::Completed,
            Ok(Err(e)) => {
                tracing::error!("❌ Generation failed: {:#}", e);
                Termination::Failed(format!("{:#}", e))
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!("❌ Generation panicked: {}", reason);
                Termination::Failed(format!("generation panicked: {}", reason))
            }
        };

        tracing::info!(
            tokens = sink.sent,
            elapsed_ms = start.elapsed().as_millis() as u64,
            outcome = ?termination,
            "generation finished"
        );
        sink.finish(termination);
    }
}

/// Forwards generated tokens into the channel and owns the termination step.
///
/// Dropping it without calling [`ChannelSink::finish`] still terminates the
/// stream, as a failure.
struct ChannelSink {
    sender: Option<StreamSender>,
    cancel: CancellationToken,
    sent: usize,
    // set once a put was refused, so the generator returned early
    stopped: bool,
}

impl ChannelSink {
    fn new(sender: StreamSender, cancel: CancellationToken) -> Self {
        Self {
            sender: Some(sender),
            cancel,
            sent: 0,
            stopped: false,
        }
    }

    fn finish(mut self, termination: Termination) {
        self.terminate(termination);
    }

    fn terminate(&mut self, termination: Termination) {
        if let Some(sender) = self.sender.take() {
            if sender.terminate(termination).is_err() {
                tracing::debug!("consumer gone before termination was delivered");
            }
        }
    }
}

impl TokenSink for ChannelSink {
    fn put(&mut self, token_id: u32) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            self.stopped = true;
            return ControlFlow::Break(());
        }
        let Some(sender) = &self.sender else {
            self.stopped = true;
            return ControlFlow::Break(());
        };
        match sender.send(token_id) {
            Ok(()) => {
                self.sent += 1;
                ControlFlow::Continue(())
            }
            Err(_) => {
                // Receiver dropped: nobody is listening anymore.
                self.cancel.cancel();
                self.stopped = true;
                ControlFlow::Break(())
            }
        }
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        self.terminate(Termination::failed("generation worker exited unexpectedly"));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
