//! Per-job progress channel.
//!
//! One [`ProgressEmitter`] (the orchestrator) writes, one [`ProgressStream`]
//! (a transport adapter) reads. Built on a bounded `tokio::sync::broadcast`
//! channel: sending never waits on the reader, and a reader that falls
//! behind loses the oldest buffered events. Only `processing` events can be
//! lost this way, since a terminal event is always the last one sent. After
//! the terminal event the emitter rejects everything and the stream ends.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use vsum_models::ProgressEvent;

use crate::error::PROCESSING_FAILED_MESSAGE;
use crate::metrics;

/// Create a progress channel buffering at most `capacity` events (minimum 2).
pub fn channel(capacity: usize) -> (ProgressEmitter, ProgressStream) {
    let (tx, rx) = broadcast::channel(capacity.max(2));
    let dropped = Arc::new(AtomicU64::new(0));

    (
        ProgressEmitter {
            tx,
            finished: AtomicBool::new(false),
            dropped: Arc::clone(&dropped),
        },
        ProgressStream {
            rx,
            finished: false,
            dropped,
        },
    )
}

/// Writing half of a progress channel.
///
/// Dropping an emitter that never sent a terminal event (the job task
/// panicked or was aborted) sends a generic `error` event first, so readers
/// always see exactly one terminal event.
#[derive(Debug)]
pub struct ProgressEmitter {
    tx: broadcast::Sender<ProgressEvent>,
    finished: AtomicBool,
    dropped: Arc<AtomicU64>,
}

impl ProgressEmitter {
    /// Send `event` to the reader without blocking.
    ///
    /// Returns `false` if the event was discarded: a terminal event was
    /// already emitted, or the reader has gone away.
    pub fn emit(&self, event: ProgressEvent) -> bool {
        let already_finished = if event.is_terminal() {
            self.finished.swap(true, Ordering::SeqCst)
        } else {
            self.finished.load(Ordering::SeqCst)
        };

        if already_finished {
            warn!(status = %event.status().as_str(), "Progress event after terminal event ignored");
            return false;
        }

        self.tx.send(event).is_ok()
    }

    /// Whether a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Whether the reading half has been dropped.
    pub fn is_stream_closed(&self) -> bool {
        self.tx.receiver_count() == 0
    }

    /// Number of events the reader has lost to a full buffer so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for ProgressEmitter {
    fn drop(&mut self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("Progress emitter dropped before a terminal event");
        let _ = self.tx.send(ProgressEvent::error(PROCESSING_FAILED_MESSAGE));
    }
}

/// Reading half of a progress channel.
#[derive(Debug)]
pub struct ProgressStream {
    rx: broadcast::Receiver<ProgressEvent>,
    finished: bool,
    dropped: Arc<AtomicU64>,
}

impl ProgressStream {
    /// Next event in emission order.
    ///
    /// Returns `None` once the terminal event has been delivered, or once
    /// the emitter is gone and the buffer is empty.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    self.finished = event.is_terminal();
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    self.dropped.fetch_add(skipped, Ordering::Relaxed);
                    metrics::record_progress_dropped(skipped);
                    debug!(skipped, "Progress buffer full, oldest events dropped");
                }
                Err(RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }

    /// Number of events lost to a full buffer so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Adapt into a `Stream` of events.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        stream::unfold(self, |mut rx| async move {
            let event = rx.recv().await?;
            Some((event, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_events_arrive_in_order_and_stream_ends() {
        let (tx, mut rx) = channel(8);

        assert!(tx.emit(ProgressEvent::processing("Acquiring media", 10)));
        assert!(tx.emit(ProgressEvent::processing("Generating transcript", 40)));
        assert!(tx.emit(ProgressEvent::done("text")));

        assert_eq!(rx.recv().await.and_then(|e| e.percent()), Some(10));
        assert_eq!(rx.recv().await.and_then(|e| e.percent()), Some(40));
        assert_eq!(rx.recv().await, Some(ProgressEvent::done("text")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_nothing_accepted_after_terminal() {
        let (tx, rx) = channel(8);

        assert!(tx.emit(ProgressEvent::error("boom")));
        assert!(tx.is_finished());
        assert!(!tx.emit(ProgressEvent::processing("late", 70)));
        assert!(!tx.emit(ProgressEvent::done("late")));
        drop(tx);

        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(events, vec![ProgressEvent::error("boom")]);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_oldest_processing_event() {
        let (tx, rx) = channel(2);

        tx.emit(ProgressEvent::processing("a", 10));
        tx.emit(ProgressEvent::processing("b", 40));
        tx.emit(ProgressEvent::processing("c", 70));
        tx.emit(ProgressEvent::done("d"));

        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(
            events,
            vec![ProgressEvent::processing("c", 70), ProgressEvent::done("d")]
        );
        assert_eq!(tx.dropped_count(), 2);
    }

    #[tokio::test]
    async fn test_unfinished_emitter_drop_sends_error() {
        let (tx, mut rx) = channel(4);
        tx.emit(ProgressEvent::processing("a", 10));
        drop(tx);

        assert_eq!(rx.recv().await, Some(ProgressEvent::processing("a", 10)));
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::error(PROCESSING_FAILED_MESSAGE))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_finished_emitter_drop_adds_nothing() {
        let (tx, rx) = channel(4);
        tx.emit(ProgressEvent::done("text"));
        drop(tx);

        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(events, vec![ProgressEvent::done("text")]);
    }

    #[tokio::test]
    async fn test_reader_waits_for_emitter() {
        let (tx, mut rx) = channel(4);

        let reader = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        tx.emit(ProgressEvent::done("late"));

        assert_eq!(reader.await.unwrap(), Some(ProgressEvent::done("late")));
    }

    #[tokio::test]
    async fn test_emit_after_reader_dropped_is_discarded() {
        let (tx, rx) = channel(4);
        drop(rx);

        assert!(tx.is_stream_closed());
        assert!(!tx.emit(ProgressEvent::processing("a", 10)));
    }
}
