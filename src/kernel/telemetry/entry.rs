use std::time::Duration;

/// One buffered message, stamped with the engine's monotonic clock.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    message: String,
    timestamp: Duration,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, timestamp: Duration) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Which buffer of a flow an entry lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Step,
    Log,
    Warning,
    Error,
}
