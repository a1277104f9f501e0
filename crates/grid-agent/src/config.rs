//! Agent configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use grid_common::{GridError, GridResult};
use grid_network::WeaveConfig;

/// Agent configuration options.
///
/// Loaded from TOML; every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Weave router settings.
    pub weave: WeaveConfig,
    /// Event dispatch settings.
    pub dispatch: DispatchConfig,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

/// Event dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of mailbox consumers.
    pub shards: usize,
    /// Buffered events per consumer.
    pub capacity: usize,
    /// Bound on each collaborator call (seconds).
    pub call_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            shards: 1,
            capacity: 1024,
            call_timeout_secs: 30,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            weave: WeaveConfig::default(),
            dispatch: DispatchConfig::default(),
            log_filter: "grid_agent=info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> GridResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| GridError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> GridResult<()> {
        let invalid = |message: &str| {
            Err(GridError::Config {
                message: message.to_string(),
            })
        };

        if self.dispatch.shards == 0 {
            return invalid("dispatch.shards must be at least 1");
        }
        if self.dispatch.capacity == 0 {
            return invalid("dispatch.capacity must be at least 1");
        }
        if self.dispatch.call_timeout_secs == 0 {
            return invalid("dispatch.call_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Bound on each collaborator call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch.call_timeout_secs)
    }

    /// Set the number of mailbox consumers.
    #[must_use]
    pub const fn with_shards(mut self, shards: usize) -> Self {
        self.dispatch.shards = shards;
        self
    }

    /// Set the collaborator call timeout (seconds).
    #[must_use]
    pub const fn with_call_timeout(mut self, secs: u64) -> Self {
        self.dispatch.call_timeout_secs = secs;
        self
    }

    /// Filter directive to log with when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_directive(&self, debug: bool) -> &str {
        if debug { "debug" } else { &self.log_filter }
    }

    /// Set the default log filter.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}
