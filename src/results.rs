//! Streaming bridge between scan tasks and the result consumer.
//!
//! Many producers push completed [`ScanReport`]s onto a [`ResultSink`];
//! a single consumer drains them from the paired [`ResultStream`] in
//! completion order. Closing the sink enqueues a sentinel so the consumer's
//! iteration terminates after any already-queued reports.

use crate::probe::ScanReport;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

enum Item {
    Report(ScanReport),
    Done,
}

/// Create a connected sink/stream pair for one scan run.
pub fn channel() -> (ResultSink, ResultStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ResultSink {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        },
        ResultStream {
            rx,
            finished: false,
        },
    )
}

/// Producer half: cheap to clone into every scan task.
#[derive(Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<Item>,
    closed: Arc<AtomicBool>,
}

impl ResultSink {
    /// Push a completed report. Never blocks; a departed consumer is not an
    /// error, the report is simply discarded.
    pub fn push(&self, report: ScanReport) {
        let _ = self.tx.send(Item::Report(report));
    }

    /// Signal end-of-stream. Idempotent across all clones of the sink.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Item::Done);
        }
    }

    /// Whether `close` has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Consumer half: a lazy, finite sequence of reports ordered by completion.
pub struct ResultStream {
    rx: mpsc::UnboundedReceiver<Item>,
    finished: bool,
}

impl ResultStream {
    /// Receive the next report, or `None` once the run has completed.
    ///
    /// After the sentinel is observed this keeps returning `None`, even if
    /// stray reports were pushed after the sink closed (e.g. scans that were
    /// mid-flight during cancellation).
    pub async fn recv(&mut self) -> Option<ScanReport> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Item::Report(report)) => Some(report),
            Some(Item::Done) | None => {
                self.finished = true;
                None
            }
        }
    }
}

impl Stream for ResultStream {
    type Item = ScanReport;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Item::Report(report))) => Poll::Ready(Some(report)),
            Poll::Ready(Some(Item::Done)) | Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ScanOutcome;
    use crate::types::Port;
    use futures::StreamExt;

    fn report(port: u16) -> ScanReport {
        ScanReport::new(
            "127.0.0.1",
            Port::new_unchecked(port),
            ScanOutcome::Open,
            None,
        )
    }

    #[tokio::test]
    async fn test_reports_drain_before_sentinel() {
        let (sink, mut stream) = channel();
        sink.push(report(22));
        sink.push(report(80));
        sink.close();

        assert_eq!(stream.recv().await.unwrap().port.as_u16(), 22);
        assert_eq!(stream.recv().await.unwrap().port.as_u16(), 80);
        assert!(stream.recv().await.is_none());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_across_clones() {
        let (sink, mut stream) = channel();
        let other = sink.clone();
        sink.push(report(443));
        sink.close();
        other.close();
        sink.close();

        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pushes_after_close_are_not_observed() {
        let (sink, mut stream) = channel();
        sink.close();
        sink.push(report(8080));
        assert!(stream.recv().await.is_none());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_impl() {
        let (sink, stream) = channel();
        sink.push(report(1));
        sink.push(report(2));
        sink.push(report(3));
        sink.close();

        let collected: Vec<_> = stream.collect().await;
        assert_eq!(collected.len(), 3);
    }
}
