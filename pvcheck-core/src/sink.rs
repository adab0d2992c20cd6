//! Status output.
//!
//! Human-facing report lines are separate from tracing output. Components
//! receive a sink at construction and never print directly.

use std::sync::Mutex;

/// Destination for report lines.
pub trait StatusSink: Send + Sync {
    /// Emit one report line.
    fn line(&self, text: &str);

    /// Replace the text shown for `key`. Sinks without keyed regions append.
    fn update(&self, key: &str, text: &str) {
        let _ = key;
        self.line(text);
    }
}

/// Writes every line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn line(&self, text: &str) {
        println!("{}", text);
    }
}

/// Records lines in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl StatusSink for BufferSink {
    fn line(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}
