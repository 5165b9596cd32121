//! Configuration management for the agent.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`BGP_AGENT__` prefix)
//! - Component-wise validation
mod agent;
mod monitoring;
mod reconcile;
mod routing;
mod store;
mod tls;
pub use agent::*;
pub use monitoring::*;
pub use reconcile::*;
pub use routing::*;
pub use store::*;
pub use tls::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

pub(crate) const ENV_PREFIX: &str = "BGP_AGENT";

/// Main configuration container
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AgentConfig {
    /// Host identity and key layout
    #[serde(default)]
    pub agent: AgentSettings,
    /// Allocation store connection
    #[serde(default)]
    pub store: StoreConfig,
    /// Routing daemon connection
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Loop timing
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Metrics exporter
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl AgentConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/agent.toml");
    /// std::env::set_var("BGP_AGENT__AGENT__HOSTNAME", "node7");
    /// let cfg = AgentConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` describing the first violated rule.
    pub fn validate(self) -> Result<Self> {
        self.agent.validate()?;
        self.store.validate()?;
        self.routing.validate()?;
        self.reconcile.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }

    /// Key prefix below which this host's allocations live
    pub fn host_prefix(&self) -> String {
        self.agent.host_prefix()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("store.endpoints")
}
