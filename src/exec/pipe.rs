//! Pipe Channel
//!
//! Single-producer/single-consumer text channel connecting pipeline
//! stages. Writes never block; unread chunks buffer in FIFO order;
//! closing the write side drains pending readers with `None`. A reader
//! can carry a cancellation token so a stalled stage unwinds when its
//! pipeline is killed.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Create a connected writer/reader pair.
pub fn pipe_channel() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PipeWriter {
            tx: Mutex::new(Some(tx)),
            broken_pipe: None,
        },
        PipeReader { rx, cancel: None },
    )
}

/// Write side. Cloneless by design: one producer per channel.
pub struct PipeWriter {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Tripped when a write finds the reader gone, the cooperative
    /// equivalent of SIGPIPE for the producing stage.
    broken_pipe: Option<CancellationToken>,
}

impl PipeWriter {
    /// Trip `token` when the reader disappears mid-stream.
    pub fn with_broken_pipe(mut self, token: CancellationToken) -> Self {
        self.broken_pipe = Some(token);
        self
    }

    /// Buffer a chunk. A write after close (or after the reader went
    /// away) is dropped.
    pub fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut tx = self.tx.lock().unwrap();
        let failed = match tx.as_ref() {
            Some(sender) => sender.send(text.to_string()).is_err(),
            None => false,
        };
        if failed {
            tx.take();
            if let Some(token) = &self.broken_pipe {
                token.cancel();
            }
        }
    }

    /// Signal EOF to the reader.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read side.
pub struct PipeReader {
    rx: mpsc::UnboundedReceiver<String>,
    cancel: Option<CancellationToken>,
}

impl PipeReader {
    /// Attach a cancellation token: a pending `read` resolves to `None`
    /// when the token trips.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Next buffered chunk, or `None` at EOF / on cancellation.
    pub async fn read(&mut self) -> Option<String> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    chunk = self.rx.recv() => chunk,
                    _ = token.cancelled() => None,
                }
            }
            None => self.rx.recv().await,
        }
    }

    /// Accumulate until EOF.
    pub async fn read_all(&mut self) -> String {
        let mut out = String::new();
        while let Some(chunk) = self.read().await {
            out.push_str(&chunk);
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = pipe_channel();
        tx.write("a");
        tx.write("b");
        tx.close();
        assert_eq!(rx.read().await.as_deref(), Some("a"));
        assert_eq!(rx.read().await.as_deref(), Some("b"));
        assert_eq!(rx.read().await, None);
    }

    #[tokio::test]
    async fn test_read_all() {
        let (tx, mut rx) = pipe_channel();
        tx.write("hello ");
        tx.write("world");
        drop(tx);
        assert_eq!(rx.read_all().await, "hello world");
    }

    #[tokio::test]
    async fn test_write_after_close_is_dropped() {
        let (tx, mut rx) = pipe_channel();
        tx.write("kept");
        tx.close();
        tx.write("dropped");
        assert_eq!(rx.read_all().await, "kept");
    }

    #[tokio::test]
    async fn test_close_wakes_pending_reader() {
        let (tx, mut rx) = pipe_channel();
        let reader = tokio::spawn(async move { rx.read().await });
        tokio::task::yield_now().await;
        tx.close();
        assert_eq!(reader.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_resolves_pending_read() {
        let token = CancellationToken::new();
        let (_tx, rx) = pipe_channel();
        let mut rx = rx.with_cancel(token.clone());
        let reader = tokio::spawn(async move { rx.read().await });
        tokio::task::yield_now().await;
        token.cancel();
        assert_eq!(reader.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_broken_pipe_trips_token() {
        let token = CancellationToken::new();
        let (tx, rx) = pipe_channel();
        let tx = tx.with_broken_pipe(token.clone());
        drop(rx);
        tx.write("nobody listening");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_empty_write_is_noop() {
        let (tx, mut rx) = pipe_channel();
        tx.write("");
        tx.write("x");
        tx.close();
        assert_eq!(rx.read().await.as_deref(), Some("x"));
        assert_eq!(rx.read().await, None);
    }
}
