use rps_core::{ProtocolConfig, DEFAULT_WINDOW};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DB_FILE: &str = "rps.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub verbose: bool,
    pub window: u64,
    /// Ledger tick period; deadlines only lapse while the clock runs.
    pub tick_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rps"),
            verbose: false,
            window: DEFAULT_WINDOW,
            tick_ms: 50,
        }
    }
}

impl CliConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig::new(self.window).with_ticker(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_config_from_cli() {
        let config = CliConfig {
            data_dir: PathBuf::from("/tmp/rps"),
            window: 4,
            tick_ms: 25,
            ..CliConfig::default()
        };
        assert_eq!(config.db_path(), PathBuf::from("/tmp/rps/rps.db"));

        let protocol = config.protocol();
        assert_eq!(protocol.window, 4);
        assert_eq!(protocol.tick_interval_ms, Some(25));
        assert!(protocol.validate().is_ok());
    }
}
