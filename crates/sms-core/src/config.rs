//! Configuration types for the SMS dispatch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::provider::{validate_call_ratio, validate_endpoint_url};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Delivery providers, in registration order
    pub providers: Vec<ProviderConfig>,

    /// Message and phone store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Dispatch engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Create a configuration with the given providers and default settings
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.providers.is_empty() {
            return Err(crate::Error::config("No providers configured"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !seen.insert(provider.url.as_str()) {
                return Err(crate::Error::config(format!(
                    "Provider URL configured twice: {}",
                    provider.url
                )));
            }
        }

        self.store.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Delivery provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint URL messages are posted to
    pub url: String,

    /// Desired percentage share of traffic (0-100)
    #[serde(default = "default_call_ratio")]
    pub call_ratio: u32,
}

impl ProviderConfig {
    /// Create a provider configuration
    pub fn new(url: impl Into<String>, call_ratio: u32) -> Self {
        Self {
            url: url.into(),
            call_ratio,
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_endpoint_url(&self.url)?;
        validate_call_ratio(self.call_ratio)?;
        Ok(())
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// URL providers report delivery outcomes to
    #[serde(default = "default_callback_url")]
    pub callback_url: String,

    /// Upper bound for a single provider call (in seconds)
    ///
    /// A call that exceeds it counts as that provider failing.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the dispatch event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let parsed = url::Url::parse(&self.callback_url).map_err(|e| {
            crate::Error::config(format!("Invalid callback URL '{}': {}", self.callback_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(crate::Error::config(format!(
                "Callback URL must use http or https: {}",
                self.callback_url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            callback_url: default_callback_url(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_call_ratio() -> u32 {
    100
}

fn default_callback_url() -> String {
    "http://localhost:3000/delivery_status".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_providers() -> ServiceConfig {
        ServiceConfig::new(vec![
            ProviderConfig::new("https://example.com/provider1", 30),
            ProviderConfig::new("https://example.com/provider2", 70),
        ])
    }

    #[test]
    fn test_valid_config() {
        assert!(two_providers().validate().is_ok());
    }

    #[test]
    fn test_requires_providers() {
        let config = ServiceConfig::new(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_invalid_providers() {
        let mut config = two_providers();
        config
            .providers
            .push(ProviderConfig::new("https://example.com/provider1", 10));
        assert!(config.validate().is_err());

        let config = ServiceConfig::new(vec![ProviderConfig::new("example.com", 10)]);
        assert!(config.validate().is_err());

        let config = ServiceConfig::new(vec![ProviderConfig::new("https://example.com", 150)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_settings() {
        let mut config = two_providers();
        config.engine.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = two_providers();
        config.engine.callback_url = "ftp://example.com/cb".to_string();
        assert!(config.validate().is_err());

        let mut config = two_providers();
        config.store = StoreConfig::File { path: String::new() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "providers": [{ "url": "https://example.com/provider1" }],
            "store": { "type": "file", "path": "/tmp/sms.json" }
        }"#;

        let config: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.providers[0].call_ratio, 100);
        assert_eq!(
            config.store,
            StoreConfig::File {
                path: "/tmp/sms.json".to_string()
            }
        );
        assert_eq!(config.engine.request_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }
}
