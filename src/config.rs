//! Context configuration

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Resource limits of a context. A limit of `0` disables it.
///
/// Limits apply per host entry: every `eval` or host-initiated call starts
/// with a fresh operation budget and deadline. Nested re-entries share the
/// budget of the outermost one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Wall-clock limit in milliseconds (default 3000)
    pub timeout_ms: u64,
    /// Statements and calls executed per entry (default 1_000_000)
    pub max_operations: u64,
    /// Nested guest calls (default 64)
    pub max_call_depth: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            max_operations: 1_000_000,
            max_call_depth: 64,
        }
    }
}

impl ContextConfig {
    /// No limits at all.
    pub fn unlimited() -> Self {
        Self {
            timeout_ms: 0,
            max_operations: 0,
            max_call_depth: 0,
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    /// Deadline of an entry starting now.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        if self.timeout_ms == 0 {
            return None;
        }
        Instant::now().checked_add(Duration::from_millis(self.timeout_ms))
    }
}
