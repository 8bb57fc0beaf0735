//! Terminal Stdin
//!
//! Async byte channel from the raw key stream to whichever command is
//! currently reading. Feeding after close is a no-op; closing resolves a
//! pending read with `None`; only one read may be outstanding at a time
//! (the receiver sits behind an async mutex).

use std::sync::Mutex;

use tokio::sync::mpsc;

pub struct TerminalStdin {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl TerminalStdin {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Push raw key data toward the reader. No-op once closed.
    pub fn feed(&self, data: &str) {
        if data.is_empty() {
            return;
        }
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(data.to_string());
        }
    }

    /// EOF: pending and future reads resolve with `None` once the buffer
    /// drains.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }

    /// Next buffered chunk, suspending until data arrives or the channel
    /// closes.
    pub async fn read(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// Accumulate until close.
    pub async fn read_all(&self) -> String {
        let mut out = String::new();
        let mut rx = self.rx.lock().await;
        while let Some(chunk) = rx.recv().await {
            out.push_str(&chunk);
        }
        out
    }
}

impl Default for TerminalStdin {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
