use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Per-request diagnostic log shown to the user alongside the page.
///
/// Every entry is mirrored to `tracing` so the process log carries the same
/// information.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    entries: Vec<LogEntry>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "ollama_page_gen", "{}", message);
        self.entries.push(LogEntry {
            level: LogLevel::Info,
            message,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "ollama_page_gen", "{}", message);
        self.entries.push(LogEntry {
            level: LogLevel::Warn,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.level == LogLevel::Warn)
            .count()
    }
}

impl fmt::Display for DebugLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry.level {
                LogLevel::Info => writeln!(f, "{}", entry.message)?,
                LogLevel::Warn => writeln!(f, "Warning: {}", entry.message)?,
            }
        }
        Ok(())
    }
}
