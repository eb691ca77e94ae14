use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct StatusLine {
    pub at: DateTime<Local>,
    pub message: String,
}

impl StatusLine {
    pub fn now(message: impl Into<String>) -> Self { Self { at: Local::now(), message: message.into() } }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Receives progress lines. Posting never blocks on a reader.
pub trait StatusSink: Send + Sync {
    fn post(&self, line: StatusLine);

    fn report(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.post(StatusLine::now(message));
    }
}

impl<S: StatusSink + ?Sized> StatusSink for Arc<S> {
    fn post(&self, line: StatusLine) { (**self).post(line) }
}

// -------------- Shared log --------------
const DEFAULT_CAPACITY: usize = 200;

/// Bounded, cloneable status buffer; the oldest lines drop off first.
#[derive(Clone)]
pub struct StatusLog {
    lines: Arc<Mutex<VecDeque<StatusLine>>>,
    capacity: usize,
}

impl Default for StatusLog {
    fn default() -> Self { Self::with_capacity(DEFAULT_CAPACITY) }
}

impl StatusLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))), capacity: capacity.max(1) }
    }

    pub fn latest(&self) -> Option<StatusLine> { self.lines.lock().back().cloned() }

    pub fn messages(&self) -> Vec<String> { self.lines.lock().iter().map(|l| l.message.clone()).collect() }
}

impl StatusSink for StatusLog {
    fn post(&self, line: StatusLine) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

/// Forwards status lines to the log output.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn post(&self, line: StatusLine) { tracing::info!(target: "status", "{}", line.message) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let log = StatusLog::with_capacity(3);
        for i in 0..5 {
            log.report(format!("line {i}"));
        }
        assert_eq!(log.messages(), ["line 2", "line 3", "line 4"]);
        assert_eq!(log.latest().unwrap().message, "line 4");
    }

    #[test]
    fn test_line_format() {
        let line = StatusLine::now("ready");
        let text = line.to_string();
        assert!(text.ends_with(" - ready"));
        assert_eq!(text.len(), "HH:MM:SS - ready".len());
    }

    #[test]
    fn test_clones_share_buffer() {
        let log = StatusLog::default();
        let shared: Arc<dyn StatusSink> = Arc::new(log.clone());
        shared.post(StatusLine::now("from worker"));
        assert_eq!(log.messages(), ["from worker"]);
    }
}
