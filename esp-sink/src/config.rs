//! Runtime configuration for the sink.
//!
//! Values come from an optional TOML file and are then overridden by CLI
//! flags or environment variables in the server binary.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SinkError, SinkResult};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 120;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
/// Upper bound for both the freshness window and the sweep interval.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    /// Interface to bind: an IP literal or a resolvable hostname. All
    /// interfaces by default.
    pub host: String,
    pub port: u16,
    /// Freshness window for the active set.
    pub time_limit_secs: u64,
    /// Period of the background sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl SinkConfig {
    pub fn from_toml_str(raw: &str) -> SinkResult<Self> {
        let config: SinkConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SinkResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> SinkResult<()> {
        check_window("time_limit_secs", self.time_limit_secs)?;
        check_window("sweep_interval_secs", self.sweep_interval_secs)?;
        if self.host.trim().is_empty() {
            return Err(SinkError::Config("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve `host:port` to the first address the resolver returns.
    pub async fn resolve_bind_addr(&self) -> SinkResult<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| SinkError::Config(format!("invalid bind address {}: {}", self.host, e)))?;
        addrs.next().ok_or_else(|| {
            SinkError::Config(format!("bind address {} resolved to nothing", self.host))
        })
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn check_window(name: &str, secs: u64) -> SinkResult<()> {
    if secs == 0 {
        return Err(SinkError::Config(format!(
            "{} must be greater than zero",
            name
        )));
    }
    if secs > MAX_WINDOW_SECS {
        return Err(SinkError::Config(format!(
            "{} must be at most {}",
            name, MAX_WINDOW_SECS
        )));
    }
    Ok(())
}
