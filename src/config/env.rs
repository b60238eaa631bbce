//! Environment variable configuration provider.
//!
//! Dotted keys map to upper-case variable names: `azure.search.endpoint`
//! reads `AZURE_SEARCH_ENDPOINT`, `mcp.idle_timeout_secs` reads
//! `MCP_IDLE_TIMEOUT_SECS`.

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

/// View of the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    /// Only reads variables starting with `prefix` (e.g. `"STAGING_"`).
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        let name = key.to_uppercase().replace(['.', '-'], "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name,
        }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        match std::env::var(self.env_key(key)) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_conversion() {
        let provider = EnvConfigProvider::new();
        assert_eq!(provider.env_key("azure.search.endpoint"), "AZURE_SEARCH_ENDPOINT");
        assert_eq!(provider.env_key("mcp.idle_timeout_secs"), "MCP_IDLE_TIMEOUT_SECS");

        let provider = EnvConfigProvider::prefixed("STAGING_");
        assert_eq!(provider.env_key("mcp.port"), "STAGING_MCP_PORT");
    }

    #[tokio::test]
    async fn test_env_provider_get() {
        let provider = EnvConfigProvider::prefixed("AZSM_TEST_GET_");

        // SAFETY: test-only variable with a unique prefix
        unsafe { std::env::set_var("AZSM_TEST_GET_MCP_HOST", "127.0.0.1") };
        let value = provider.get_raw("mcp.host").await.unwrap();
        assert_eq!(value, Some("127.0.0.1".to_string()));
        unsafe { std::env::remove_var("AZSM_TEST_GET_MCP_HOST") };
    }

    #[tokio::test]
    async fn test_env_provider_not_found() {
        let provider = EnvConfigProvider::prefixed("AZSM_TEST_MISSING_");
        assert_eq!(provider.get_raw("mcp.port").await.unwrap(), None);
    }
}
