//! Platform abstraction for guest console output.
//!
//! Guest `console.*` calls never touch stdout directly: they go through the
//! [`ConsoleProvider`] the context was built with, so embedders decide where
//! guest diagnostics end up.

use parking_lot::Mutex;

mod std_impl;

pub use std_impl::StdConsoleProvider;

/// Log level for console output.
///
/// Maps to the different console methods: console.log(), console.warn(), etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    /// console.log() - general output
    Log,
    /// console.info() - informational messages
    Info,
    /// console.debug() - debug messages
    Debug,
    /// console.warn() - warnings
    Warn,
    /// console.error() - errors
    Error,
}

impl ConsoleLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Debug => "debug",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        }
    }
}

/// Trait for handling console output.
pub trait ConsoleProvider {
    /// Write a message at the specified log level.
    fn write(&self, level: ConsoleLevel, message: &str);

    /// Handle `console.clear()`. Ignored unless overridden.
    fn clear(&self) {}
}

/// A console provider that discards all output.
pub struct NoOpConsoleProvider;

impl ConsoleProvider for NoOpConsoleProvider {
    fn write(&self, _level: ConsoleLevel, _message: &str) {}
}

/// Collects console output in memory.
///
/// Cloning shares the buffer, so a host can keep one clone and hand the
/// other to [`ContextBuilder::console`](crate::ContextBuilder::console).
#[derive(Clone, Default)]
pub struct BufferedConsoleProvider {
    lines: std::sync::Arc<Mutex<Vec<(ConsoleLevel, String)>>>,
}

impl BufferedConsoleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, oldest first.
    pub fn lines(&self) -> Vec<(ConsoleLevel, String)> {
        self.lines.lock().clone()
    }

    /// Messages only, without levels.
    pub fn messages(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn take(&self) -> Vec<(ConsoleLevel, String)> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl ConsoleProvider for BufferedConsoleProvider {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }

    fn clear(&self) {
        self.lines.lock().clear();
    }
}
