//! In-memory configuration provider.
//!
//! Holds command-line overrides in the binary and fixed values in tests.

use std::collections::HashMap;

use super::ConfigResult;
use super::provider::ConfigProvider;

#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    data: HashMap<String, String>,
    name: String,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            data: HashMap::new(),
            name: name.into(),
        }
    }

    /// Adds a value during construction.
    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Adds a value during construction when `value` is present.
    pub fn value_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.value(key, v.to_string()),
            None => self,
        }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for MemoryConfigProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self.data.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::provider::ConfigProviderExt;

    #[tokio::test]
    async fn test_memory_provider_basic() {
        let provider = MemoryConfigProvider::new().value("mcp.host", "localhost");
        assert_eq!(
            provider.get_raw("mcp.host").await.unwrap(),
            Some("localhost".to_string())
        );
        assert_eq!(provider.get_raw("mcp.port").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_provider_value_opt() {
        let provider = MemoryConfigProvider::named("cli")
            .value_opt("mcp.port", Some(9100u16))
            .value_opt::<u16>("mcp.max_in_flight", None);
        assert_eq!(provider.get_raw("mcp.port").await.unwrap(), Some("9100".into()));
        assert_eq!(provider.get_raw("mcp.max_in_flight").await.unwrap(), None);
        assert_eq!(provider.name(), "cli");
    }

    #[tokio::test]
    async fn test_memory_provider_typed() {
        let provider = MemoryConfigProvider::new()
            .value("mcp.port", " 9000 ")
            .value("mcp.host", "")
            .value("mcp.max_in_flight", "lots");

        let port: Option<u16> = provider.get_parsed("mcp.port").await.unwrap();
        assert_eq!(port, Some(9000));
        assert_eq!(provider.get_string("mcp.host").await.unwrap(), None);
        assert!(provider.get_parsed::<usize>("mcp.max_in_flight").await.is_err());
    }
}
