//! Ordered fragment delivery for streaming completions.
//!
//! A channel-backed `Stream` of text deltas. The mpsc channel preserves
//! send order, so fragments reach the consumer exactly as they arrived
//! on the wire, never reordered or batched across frames.

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pin_project! {
    /// Stream of text fragments from one streaming completion.
    pub struct FragmentStream {
        #[pin]
        receiver: mpsc::Receiver<String>,
        // Accumulated content (for getting the full response afterwards)
        accumulated: String,
        // Whether the stream has ended
        complete: bool,
        // Set by the sender when the stream closed abnormally
        interrupted: Arc<AtomicBool>,
    }
}

impl std::fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStream")
            .field("accumulated", &self.accumulated)
            .field("complete", &self.complete)
            .field("interrupted", &self.interrupted)
            .finish_non_exhaustive()
    }
}

impl FragmentStream {
    /// Create a stream over an existing receiver.
    pub fn new(receiver: mpsc::Receiver<String>) -> Self {
        Self {
            receiver,
            accumulated: String::new(),
            complete: false,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a sender/receiver pair for streaming.
    pub fn channel(buffer: usize) -> (FragmentSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        let stream = Self::new(rx);
        let sender = FragmentSender {
            sender: tx,
            interrupted: Arc::clone(&stream.interrupted),
        };
        (sender, stream)
    }

    /// Create a stream that yields one already-complete response.
    pub fn from_complete(content: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let content = content.into();
        tokio::spawn(async move {
            let _ = tx.send(content).await;
        });
        Self::new(rx)
    }

    /// Content accumulated so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Whether the stream has ended.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the sender closed the stream abnormally (a mid-stream
    /// transport failure rather than the terminator or cancellation).
    /// Meaningful once the stream has been drained.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Drain the stream and return the full concatenated text.
    pub async fn collect_text(mut self) -> String {
        use futures::StreamExt;

        while self.next().await.is_some() {}
        self.accumulated
    }
}

impl Stream for FragmentStream {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(fragment)) => {
                this.accumulated.push_str(&fragment);
                Poll::Ready(Some(fragment))
            }
            Poll::Ready(None) => {
                *this.complete = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Sender half of a fragment stream.
pub struct FragmentSender {
    sender: mpsc::Sender<String>,
    interrupted: Arc<AtomicBool>,
}

impl FragmentSender {
    /// Send one fragment. Returns Err if the receiver was dropped.
    pub async fn send(&self, fragment: impl Into<String>) -> Result<(), ()> {
        self.sender.send(fragment.into()).await.map_err(|_| ())
    }

    /// Close the stream without further fragments.
    pub fn close(self) {
        drop(self.sender);
    }

    /// Close the stream marking abnormal termination. Delivered fragments
    /// stay valid; the receiver observes the mark after draining.
    pub fn abort(self) {
        self.interrupted.store(true, Ordering::SeqCst);
        drop(self.sender);
    }
}
