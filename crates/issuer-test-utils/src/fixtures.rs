//! Fixture configuration for issuer tests.

use connection_issuer::config::{Config, ConfigError};
use std::collections::HashMap;

/// API key used by fixture configurations.
pub const TEST_API_KEY: &str = "APItestkey";

/// API secret used by fixture configurations.
pub const TEST_API_SECRET: &str = "test-api-secret-with-enough-entropy-0123456789";

/// Default media server URL used by fixture configurations.
pub const TEST_LIVEKIT_URL: &str = "wss://default.media.test";

/// Builder for issuer configuration in tests.
///
/// # Example
/// ```rust,ignore
/// let config = TestConfig::new()
///     .with_backend_url(&mock_server.uri())
///     .with_region("eu", "wss://eu.media.test")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TestConfig {
    vars: HashMap<String, String>,
    regions: Vec<(String, String)>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfig {
    /// Direct signing enabled with the fixture key pair and no regions.
    pub fn new() -> Self {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("LIVEKIT_URL".to_string(), TEST_LIVEKIT_URL.to_string()),
            ("LIVEKIT_API_KEY".to_string(), TEST_API_KEY.to_string()),
            ("LIVEKIT_API_SECRET".to_string(), TEST_API_SECRET.to_string()),
        ]);

        Self {
            vars,
            regions: Vec::new(),
        }
    }

    /// Point delegated mode at `url`.
    pub fn with_backend_url(mut self, url: &str) -> Self {
        self.vars
            .insert("BACKEND_API_URL".to_string(), url.to_string());
        self
    }

    /// Map a region hint to a media server URL.
    pub fn with_region(mut self, region: &str, url: &str) -> Self {
        self.regions.push((region.to_string(), url.to_string()));
        self
    }

    /// Remove the signing key pair and disable direct signing.
    pub fn without_signing(mut self) -> Self {
        self.vars.remove("LIVEKIT_API_KEY");
        self.vars.remove("LIVEKIT_API_SECRET");
        self.vars
            .insert("DIRECT_SIGNING_ENABLED".to_string(), "false".to_string());
        self
    }

    /// Set an arbitrary environment variable.
    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    /// The environment this builder would present to `Config::from_vars`.
    pub fn vars(&self) -> HashMap<String, String> {
        let mut vars = self.vars.clone();
        if !self.regions.is_empty() {
            let joined = self
                .regions
                .iter()
                .map(|(region, url)| format!("{region}={url}"))
                .collect::<Vec<_>>()
                .join(",");
            vars.insert("LIVEKIT_REGION_URLS".to_string(), joined);
        }
        vars
    }

    pub fn build(&self) -> Result<Config, ConfigError> {
        Config::from_vars(&self.vars())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixture_builds() {
        let config = TestConfig::new().build().unwrap();
        assert_eq!(config.livekit_url, TEST_LIVEKIT_URL);
        assert_eq!(config.signing.unwrap().api_key, TEST_API_KEY);
    }

    #[test]
    fn test_regions_joined() {
        let config = TestConfig::new()
            .with_region("eu", "wss://eu.media.test")
            .with_region("us", "wss://us.media.test")
            .build()
            .unwrap();
        assert_eq!(config.region_urls.len(), 2);
    }

    #[test]
    fn test_without_signing() {
        let config = TestConfig::new().without_signing().build().unwrap();
        assert!(config.signing.is_none());
    }
}
