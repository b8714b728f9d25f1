//! Transfer progress reporting.

use std::io::{self, Write};
use std::sync::Mutex;

// For these ANSI escape sequences, see https://en.wikipedia.org/wiki/ANSI_escape_code
const MOVE_CURSOR_UP_1_LINE: &str = "\x1b[1A";
const ERASE_ENTIRE_LINE: &str = "\x1b[2K";
const MOVE_CURSOR_TO_COLUMN_1: &str = "\x1b[1G";

/// Receives size updates while a resource is downloaded.
///
/// For each network attempt the fetcher calls [`start`](Self::start) once,
/// [`total_size`](Self::total_size) at most once (only when the server
/// announces a length), [`received`](Self::received) after every chunk with
/// the cumulative byte count, and [`finish`](Self::finish) when the body ends
/// or the transfer fails.
pub trait ProgressReporter: Send + Sync {
    /// A transfer of `url` is starting.
    fn start(&self, _url: &str) {}

    /// The server announced `bytes` of content.
    fn total_size(&self, bytes: u64);

    /// `bytes` have been received so far.
    fn received(&self, bytes: u64);

    /// The transfer ended.
    fn finish(&self) {}
}

/// Discards all progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn total_size(&self, _bytes: u64) {}

    fn received(&self, _bytes: u64) {}
}

/// Prints the URL, then keeps rewriting one `"<received> of <total>"` line
/// on standard error.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    total: Mutex<Option<u64>>,
}

impl TerminalProgress {
    /// Create a reporter with no transfer in flight.
    pub fn new() -> Self {
        Self::default()
    }

    fn render(&self, received: u64) -> String {
        let total = self
            .total
            .lock()
            .map(|t| *t)
            .unwrap_or_default()
            .map_or_else(|| "?".to_string(), |t| t.to_string());

        format!(
            "{}{}{}  {} of {}",
            MOVE_CURSOR_UP_1_LINE, ERASE_ENTIRE_LINE, MOVE_CURSOR_TO_COLUMN_1, received, total
        )
    }
}

impl ProgressReporter for TerminalProgress {
    fn start(&self, url: &str) {
        if let Ok(mut total) = self.total.lock() {
            *total = None;
        }
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}", url);
        let _ = writeln!(stderr);
    }

    fn total_size(&self, bytes: u64) {
        if let Ok(mut total) = self.total.lock() {
            *total = Some(bytes);
        }
    }

    fn received(&self, bytes: u64) {
        let line = self.render(bytes);
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
        let _ = stderr.flush();
    }
}
