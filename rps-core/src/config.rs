use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ticks a counterparty has to answer before the waiting party may claim.
pub const DEFAULT_WINDOW: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Deadline window applied uniformly at every awaiting step.
    pub window: u64,
    /// Wall-clock period of the background ticker, if one is run.
    pub tick_interval_ms: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            tick_interval_ms: None,
        }
    }
}

impl ProtocolConfig {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn with_ticker(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = Some(interval_ms);
        self
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        self.tick_interval_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(CoreError::config("Deadline window must be greater than 0"));
        }

        if self.tick_interval_ms == Some(0) {
            return Err(CoreError::config("Tick interval must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProtocolConfig::default();
        assert_eq!(config.window, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(ProtocolConfig::new(0).validate().is_err());
        assert!(ProtocolConfig::default().with_ticker(0).validate().is_err());
    }
}
