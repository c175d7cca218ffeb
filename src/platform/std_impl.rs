//! Standard output implementation of the console provider.

use super::{ConsoleLevel, ConsoleProvider};

/// Console provider using std print macros.
///
/// `log`, `info` and `debug` go to stdout; `warn` and `error` to stderr.
pub struct StdConsoleProvider;

impl StdConsoleProvider {
    /// Create a new StdConsoleProvider.
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdConsoleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProvider for StdConsoleProvider {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info | ConsoleLevel::Debug => {
                println!("{}", message);
            }
            ConsoleLevel::Warn | ConsoleLevel::Error => {
                eprintln!("{}", message);
            }
        }
    }

    fn clear(&self) {
        println!("\n--- Console cleared ---\n");
    }
}
