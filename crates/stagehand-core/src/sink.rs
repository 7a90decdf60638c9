#![forbid(unsafe_code)]

//! Output sinks: where status and error text goes.
//!
//! The runtime never writes to a process-wide console. A sink is injected
//! through the program configuration and shared by reference.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Destination for status and error text.
pub trait OutputSink: Send + Sync {
    /// Report an error or warning to the user.
    fn show_error_message(&self, text: &str);

    /// Print ordinary output. Sinks that only surface errors may ignore it.
    fn print(&self, text: &str) {
        let _ = text;
    }

    /// Print a line of ordinary output.
    fn println(&self, text: &str) {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.print(&line);
    }
}

/// Sink writing to the process's standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn show_error_message(&self, text: &str) {
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = writeln!(lock, "{text}");
    }

    fn print(&self, text: &str) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = lock.write_all(text.as_bytes());
        let _ = lock.flush();
    }
}

/// Sink forwarding everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn show_error_message(&self, text: &str) {
        tracing::warn!(target: "stagehand::output", "{text}");
    }

    fn print(&self, text: &str) {
        tracing::info!(target: "stagehand::output", "{}", text.trim_end_matches('\n'));
    }
}

/// One captured sink line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkLine {
    Error(String),
    Output(String),
}

/// In-memory sink for tests and embedding hosts that render text themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<SinkLine>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn lines(&self) -> Vec<SinkLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the error messages.
    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                SinkLine::Error(text) => Some(text),
                SinkLine::Output(_) => None,
            })
            .collect()
    }

    /// Concatenated ordinary output.
    pub fn output(&self) -> String {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                SinkLine::Output(text) => Some(text),
                SinkLine::Error(_) => None,
            })
            .collect()
    }

    fn push(&self, line: SinkLine) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

impl OutputSink for MemorySink {
    fn show_error_message(&self, text: &str) {
        self.push(SinkLine::Error(text.to_owned()));
    }

    fn print(&self, text: &str) {
        self.push(SinkLine::Output(text.to_owned()));
    }
}
