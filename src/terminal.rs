//! Terminal Interface
//!
//! The display surface the shell writes to. The host supplies the real
//! implementation (a terminal-emulator widget, a PTY, stdio); the crate
//! ships a capturing test terminal and a null terminal for headless
//! script sourcing.

use std::sync::{Arc, Mutex};

pub trait Terminal: Send + Sync {
    fn write(&self, text: &str);

    fn cols(&self) -> u16 {
        80
    }

    fn rows(&self) -> u16 {
        24
    }

    fn focus(&self) {}

    fn clear(&self) {}
}

/// Captures everything written, for tests.
#[derive(Default)]
pub struct TestTerminal {
    output: Mutex<String>,
}

impl TestTerminal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn output(&self) -> String {
        self.output.lock().unwrap().clone()
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut *self.output.lock().unwrap())
    }
}

impl Terminal for TestTerminal {
    fn write(&self, text: &str) {
        self.output.lock().unwrap().push_str(text);
    }

    fn clear(&self) {
        self.output.lock().unwrap().clear();
    }
}

/// Swallows all output. Used while sourcing startup files.
pub struct NullTerminal;

impl Terminal for NullTerminal {
    fn write(&self, _text: &str) {}
}

/// Writes straight to the process stdout. Used by the CLI binary.
pub struct StdioTerminal;

impl Terminal for StdioTerminal {
    fn write(&self, text: &str) {
        use std::io::Write;
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

// ============================================================================
// Tests
// ============================================================================
