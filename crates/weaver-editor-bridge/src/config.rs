//! Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drift::DEFAULT_DRIFT_INTERVAL;
use crate::error::ConfigError;
use crate::pending::DEFAULT_PENDING_CAPACITY;

/// Env var overriding the drift check interval, in milliseconds.
pub const DRIFT_INTERVAL_ENV: &str = "WEAVER_BRIDGE_DRIFT_INTERVAL_MS";

/// Env var overriding the pending-edit buffer capacity.
pub const PENDING_CAPACITY_ENV: &str = "WEAVER_BRIDGE_PENDING_CAPACITY";

/// Tunables shared by every bridge a host creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How often editor text is compared against the engine.
    pub drift_interval_ms: u64,
    /// Queued edits before the pending buffer collapses to a snapshot.
    pub pending_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            drift_interval_ms: DEFAULT_DRIFT_INTERVAL.as_millis() as u64,
            pending_capacity: DEFAULT_PENDING_CAPACITY,
        }
    }
}

impl BridgeConfig {
    pub fn drift_interval(&self) -> Duration {
        Duration::from_millis(self.drift_interval_ms)
    }

    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `WEAVER_BRIDGE_DRIFT_INTERVAL_MS`: drift check interval (default: 5000)
    /// - `WEAVER_BRIDGE_PENDING_CAPACITY`: pending buffer capacity (default: 512)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`BridgeConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(DRIFT_INTERVAL_ENV) {
            config.drift_interval_ms = parse_env(DRIFT_INTERVAL_ENV, raw)?;
        }
        if let Some(raw) = lookup(PENDING_CAPACITY_ENV) {
            config.pending_capacity = parse_env(PENDING_CAPACITY_ENV, raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drift_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

fn parse_env<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = raw.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::InvalidEnv {
        var,
        message: e.to_string(),
        value: raw,
    })
}
