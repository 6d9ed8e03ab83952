//! Configuration options for the luamock store.

use std::time::Duration;

/// Configuration options for creating a store.
#[derive(Debug, Clone)]
pub struct Options {
    /// Wall-clock limit for a single script invocation.
    /// Default: None (no limit)
    pub script_timeout: Option<Duration>,

    /// How many Lua VM instructions run between timeout checks.
    /// Only used when `script_timeout` is set.
    /// Default: 1000
    pub hook_instruction_interval: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            script_timeout: None,
            hook_instruction_interval: 1000,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-invocation script timeout.
    pub fn script_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// Sets the instruction interval between timeout checks.
    pub fn hook_instruction_interval(mut self, interval: u32) -> Self {
        self.hook_instruction_interval = interval;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.hook_instruction_interval == 0 {
            return Err(crate::Error::invalid_argument(
                "hook_instruction_interval must be > 0",
            ));
        }
        if self.script_timeout == Some(Duration::ZERO) {
            return Err(crate::Error::invalid_argument("script_timeout must be > 0"));
        }
        Ok(())
    }
}
