//! Pluggable configuration providers and the server settings loaded from
//! them.
//!
//! ```rust,no_run
//! use azure_search_mcp::config::{EnvConfigProvider, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load(&EnvConfigProvider::new()).await?;
//! println!("listening on {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```

pub mod composite;
pub mod env;
pub mod memory;
pub mod provider;

pub use composite::CompositeConfigProvider;
pub use env::EnvConfigProvider;
pub use memory::MemoryConfigProvider;
pub use provider::{ConfigProvider, ConfigProviderExt};

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::backend::{AzureSearchConfig, DEFAULT_API_VERSION};
use crate::dispatch::DEFAULT_CALL_TIMEOUT;
use crate::session::{DEFAULT_IDLE_TIMEOUT, DEFAULT_REAPER_INTERVAL, PipelineLimits};
use crate::session::pipeline::DEFAULT_MAX_IN_FLIGHT;
use crate::transport::{DEFAULT_FLUSH_DEADLINE, DEFAULT_KEEP_ALIVE};

/// Errors that can occur in configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("{0}")]
    ValidationErrors(ValidationErrors),
}

#[derive(Debug)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed: ")?;
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub mod keys {
    pub const SEARCH_ENDPOINT: &str = "azure.search.endpoint";
    pub const SEARCH_API_KEY: &str = "azure.search.api_key";
    pub const SEARCH_INDEX: &str = "azure.search.index";
    pub const SEARCH_API_VERSION: &str = "azure.search.api_version";
    pub const HOST: &str = "mcp.host";
    pub const PORT: &str = "mcp.port";
    pub const IDLE_TIMEOUT_SECS: &str = "mcp.idle_timeout_secs";
    pub const CALL_TIMEOUT_SECS: &str = "mcp.call_timeout_secs";
    pub const FLUSH_DEADLINE_SECS: &str = "mcp.flush_deadline_secs";
    pub const KEEP_ALIVE_SECS: &str = "mcp.keep_alive_secs";
    pub const REAPER_INTERVAL_SECS: &str = "mcp.reaper_interval_secs";
    pub const MAX_IN_FLIGHT: &str = "mcp.max_in_flight";
}

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9000;

/// Connection settings of the Azure AI Search service.
#[derive(Clone, Debug)]
pub struct SearchServiceConfig {
    pub endpoint: Option<Url>,
    pub api_key: Option<SecretString>,
    pub default_index: Option<String>,
    pub api_version: String,
}

impl SearchServiceConfig {
    /// Backend settings; fails when the endpoint or key is missing.
    pub fn azure(&self, timeout: Duration) -> ConfigResult<AzureSearchConfig> {
        let endpoint = self.endpoint.clone().ok_or_else(|| ConfigError::NotFound {
            key: keys::SEARCH_ENDPOINT.into(),
        })?;
        let api_key = self.api_key.clone().ok_or_else(|| ConfigError::NotFound {
            key: keys::SEARCH_API_KEY.into(),
        })?;

        let mut config = AzureSearchConfig {
            endpoint,
            api_key,
            default_index: None,
            api_version: self.api_version.clone(),
            timeout,
        };
        if let Some(index) = &self.default_index {
            config = config.default_index(index.clone());
        }
        Ok(config)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub search: SearchServiceConfig,
    pub host: String,
    pub port: u16,
    pub idle_timeout: Duration,
    pub call_timeout: Duration,
    pub flush_deadline: Duration,
    pub keep_alive: Duration,
    pub reaper_interval: Duration,
    pub max_in_flight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            search: SearchServiceConfig {
                endpoint: None,
                api_key: None,
                default_index: None,
                api_version: DEFAULT_API_VERSION.to_string(),
            },
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            flush_deadline: DEFAULT_FLUSH_DEADLINE,
            keep_alive: DEFAULT_KEEP_ALIVE,
            reaper_interval: DEFAULT_REAPER_INTERVAL,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl ServerConfig {
    /// Reads every setting from `provider`, falling back to defaults.
    ///
    /// All invalid values are reported together.
    pub async fn load(provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        let defaults = Self::default();
        let mut errors = Vec::new();

        let endpoint = collect(&mut errors, read::<Url>(provider, keys::SEARCH_ENDPOINT).await);
        let api_key = collect(&mut errors, provider.get_string(keys::SEARCH_API_KEY).await);
        let default_index = collect(&mut errors, provider.get_string(keys::SEARCH_INDEX).await);
        let api_version = collect(&mut errors, provider.get_string(keys::SEARCH_API_VERSION).await);
        let host = collect(&mut errors, provider.get_string(keys::HOST).await);
        let port = collect(&mut errors, read::<u16>(provider, keys::PORT).await);
        let max_in_flight = collect(&mut errors, read::<usize>(provider, keys::MAX_IN_FLIGHT).await);

        let mut seconds = |key: &str, default: Duration, value: ConfigResult<Option<u64>>| {
            match collect(&mut errors, value) {
                Some(0) => {
                    errors.push(ConfigError::InvalidValue {
                        key: key.to_string(),
                        message: "must be greater than zero".into(),
                    });
                    default
                }
                Some(secs) => Duration::from_secs(secs),
                None => default,
            }
        };
        let idle_timeout = seconds(
            keys::IDLE_TIMEOUT_SECS,
            defaults.idle_timeout,
            read(provider, keys::IDLE_TIMEOUT_SECS).await,
        );
        let call_timeout = seconds(
            keys::CALL_TIMEOUT_SECS,
            defaults.call_timeout,
            read(provider, keys::CALL_TIMEOUT_SECS).await,
        );
        let flush_deadline = seconds(
            keys::FLUSH_DEADLINE_SECS,
            defaults.flush_deadline,
            read(provider, keys::FLUSH_DEADLINE_SECS).await,
        );
        let keep_alive = seconds(
            keys::KEEP_ALIVE_SECS,
            defaults.keep_alive,
            read(provider, keys::KEEP_ALIVE_SECS).await,
        );
        let reaper_interval = seconds(
            keys::REAPER_INTERVAL_SECS,
            defaults.reaper_interval,
            read(provider, keys::REAPER_INTERVAL_SECS).await,
        );

        if max_in_flight == Some(0) {
            errors.push(ConfigError::InvalidValue {
                key: keys::MAX_IN_FLIGHT.into(),
                message: "must be greater than zero".into(),
            });
        }

        if !errors.is_empty() {
            return Err(ConfigError::ValidationErrors(ValidationErrors(errors)));
        }

        Ok(Self {
            search: SearchServiceConfig {
                endpoint,
                api_key: api_key.map(SecretString::from),
                default_index,
                api_version: api_version.unwrap_or(defaults.search.api_version),
            },
            host: host.unwrap_or(defaults.host),
            port: port.unwrap_or(defaults.port),
            idle_timeout,
            call_timeout,
            flush_deadline,
            keep_alive,
            reaper_interval,
            max_in_flight: max_in_flight.unwrap_or(defaults.max_in_flight),
        })
    }

    /// Resolves `host:port` to the first socket address.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::InvalidValue {
                key: keys::HOST.into(),
                message: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ConfigError::InvalidValue {
                key: keys::HOST.into(),
                message: format!("'{}' did not resolve to an address", self.host),
            })
    }

    pub fn pipeline_limits(&self) -> PipelineLimits {
        PipelineLimits::default().max_in_flight(self.max_in_flight)
    }
}

async fn read<T>(provider: &dyn ConfigProvider, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr + Send,
    T::Err: std::fmt::Display,
{
    provider.get_parsed::<T>(key).await
}

fn collect<T>(errors: &mut Vec<ConfigError>, value: ConfigResult<Option<T>>) -> Option<T> {
    value.unwrap_or_else(|e| {
        errors.push(e);
        None
    })
}
