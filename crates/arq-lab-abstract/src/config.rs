use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::packet::{DATA_HEADER_LEN, MAX_PACKET_LEN};

/// Settings shared by both ends of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArqConfig {
    /// How long the sender waits for an ack before retransmitting.
    pub timeout_ms: u64,
    /// Packet size budget in bytes, header included.
    pub packet_size: usize,
    /// Percentage of outgoing packets hit by a fault (drop or corruption).
    pub drop_percent: u8,
    /// Seed for the fault injector; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            packet_size: MAX_PACKET_LEN,
            drop_percent: 0,
            seed: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("packet size {0} must be between 13 and 512 bytes")]
    PacketSize(usize),
    #[error("drop percentage {0} must be between 0 and 100")]
    DropPercent(u8),
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

impl ArqConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(DATA_HEADER_LEN + 1..=MAX_PACKET_LEN).contains(&self.packet_size) {
            return Err(ConfigError::PacketSize(self.packet_size));
        }
        if self.drop_percent > 100 {
            return Err(ConfigError::DropPercent(self.drop_percent));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Bytes of file data carried by one data packet.
    pub fn payload_capacity(&self) -> usize {
        self.packet_size.saturating_sub(DATA_HEADER_LEN)
    }
}

/// Partial settings read from a TOML file and layered over the defaults.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArqConfigOverride {
    pub timeout_ms: Option<u64>,
    pub packet_size: Option<usize>,
    pub drop_percent: Option<u8>,
    pub seed: Option<u64>,
}

impl ArqConfigOverride {
    pub fn apply_to(&self, config: &mut ArqConfig) {
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.packet_size {
            config.packet_size = v;
        }
        if let Some(v) = self.drop_percent {
            config.drop_percent = v;
        }
        if let Some(v) = self.seed {
            config.seed = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_full_size_packet() {
        let config = ArqConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.payload_capacity(), 500);
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = ArqConfig {
            packet_size: 12,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::PacketSize(12)));
        config.packet_size = 513;
        assert_eq!(config.validate(), Err(ConfigError::PacketSize(513)));
        config.packet_size = 100;
        config.drop_percent = 101;
        assert_eq!(config.validate(), Err(ConfigError::DropPercent(101)));
        config.drop_percent = 100;
        config.timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn toml_override_only_touches_present_keys() {
        let overrides: ArqConfigOverride = toml::from_str(
            r#"
            timeout_ms = 250
            drop_percent = 30
            "#,
        )
        .unwrap();
        let mut config = ArqConfig::default();
        overrides.apply_to(&mut config);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.drop_percent, 30);
        assert_eq!(config.packet_size, 512);
        assert_eq!(config.seed, None);
    }
}
