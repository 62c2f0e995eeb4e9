//! Single-producer, single-consumer hand-off between the worker and decoder

use crate::types::{ChannelClosed, StreamItem, Termination};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Create a fresh channel for one generation run
pub fn stream_channel() -> (StreamSender, StreamReceiver) {
    let (tx, rx) = unbounded_channel();
    (StreamSender { tx }, StreamReceiver { rx })
}

/// Producer half. Consumed by [`StreamSender::terminate`], so nothing can be
/// sent after the termination item.
pub struct StreamSender {
    tx: UnboundedSender<StreamItem>,
}

impl StreamSender {
    /// Queue one token. Never blocks.
    pub fn send(&self, token_id: u32) -> Result<(), ChannelClosed> {
        self.tx
            .send(StreamItem::Content(token_id))
            .map_err(|_| ChannelClosed)
    }

    /// Queue the final item and close the channel.
    pub fn terminate(self, termination: Termination) -> Result<(), ChannelClosed> {
        self.tx
            .send(StreamItem::Termination(termination))
            .map_err(|_| ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half
pub struct StreamReceiver {
    rx: UnboundedReceiver<StreamItem>,
}

impl StreamReceiver {
    /// Block until the next item arrives.
    ///
    /// Must not be called from an async task; use `spawn_blocking`. A
    /// sender dropped without terminating is reported as a failure.
    pub fn receive(&mut self) -> StreamItem {
        self.rx.blocking_recv().unwrap_or_else(|| {
            StreamItem::Termination(Termination::failed(
                "stream sender dropped without termination",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_items_arrive_in_send_order() {
        let (tx, mut rx) = stream_channel();
        for id in [5, 3, 9] {
            tx.send(id).unwrap();
        }
        tx.terminate(Termination::Completed).unwrap();

        assert_eq!(rx.receive(), StreamItem::Content(5));
        assert_eq!(rx.receive(), StreamItem::Content(3));
        assert_eq!(rx.receive(), StreamItem::Content(9));
        assert_eq!(rx.receive(), StreamItem::Termination(Termination::Completed));
    }

    #[test]
    fn test_receive_blocks_across_threads() {
        let (tx, mut rx) = stream_channel();
        let producer = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            tx.send(1).unwrap();
            tx.terminate(Termination::Completed).unwrap();
        });

        assert_eq!(rx.receive(), StreamItem::Content(1));
        assert_eq!(rx.receive(), StreamItem::Termination(Termination::Completed));
        producer.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_reads_as_failure() {
        let (tx, mut rx) = stream_channel();
        tx.send(7).unwrap();
        drop(tx);

        assert_eq!(rx.receive(), StreamItem::Content(7));
        assert!(matches!(
            rx.receive(),
            StreamItem::Termination(Termination::Failed(_))
        ));
    }

    #[test]
    fn test_send_fails_once_receiver_dropped() {
        let (tx, rx) = stream_channel();
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.send(1), Err(ChannelClosed));
        assert_eq!(tx.terminate(Termination::Completed), Err(ChannelClosed));
    }
}
