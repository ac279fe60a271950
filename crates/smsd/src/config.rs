//! Environment configuration for the daemon
//!
//! Every setting comes from an `SMSD_*` environment variable. The values are
//! checked here and then turned into a [`ServiceConfig`], which sms-core
//! validates again on its own terms.

use anyhow::Result;
use sms_core::config::{EngineConfig, ProviderConfig, ServiceConfig, StoreConfig};
use std::net::SocketAddr;
use tracing::Level;

/// Default listen address
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub providers: Vec<ProviderConfig>,
    pub callback_url: Option<String>,
    pub bind_addr: String,
    pub store_type: String,
    pub store_path: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let providers = match lookup("SMSD_PROVIDERS") {
            Some(raw) => parse_providers(&raw)?,
            None => Vec::new(),
        };

        let http_timeout_secs = match lookup("SMSD_HTTP_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("SMSD_HTTP_TIMEOUT_SECS must be a number of seconds. Got: {}", raw)
            })?),
            None => None,
        };

        Ok(Self {
            providers,
            callback_url: lookup("SMSD_CALLBACK_URL"),
            bind_addr: lookup("SMSD_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            store_type: lookup("SMSD_STORE_TYPE").unwrap_or_else(|| "memory".to_string()),
            store_path: lookup("SMSD_STORE_PATH"),
            http_timeout_secs,
            log_level: lookup("SMSD_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!(
                "SMSD_PROVIDERS must list at least one provider. \
                Set it via: export SMSD_PROVIDERS=https://provider1.example.com/send=30,https://provider2.example.com/send=70"
            );
        }

        if self.bind_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!(
                "SMSD_BIND_ADDR must be an address like 0.0.0.0:3000. Got: {}",
                self.bind_addr
            );
        }

        match self.store_type.as_str() {
            "memory" => {}
            "file" => {
                if self.store_path.as_ref().is_none_or(|p| p.is_empty()) {
                    anyhow::bail!(
                        "SMSD_STORE_PATH is required when SMSD_STORE_TYPE=file. \
                        Set it via: export SMSD_STORE_PATH=/var/lib/smsd/store.json"
                    );
                }
            }
            _ => anyhow::bail!(
                "SMSD_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if let Some(timeout) = self.http_timeout_secs
            && !(1..=120).contains(&timeout)
        {
            anyhow::bail!(
                "SMSD_HTTP_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                timeout
            );
        }

        if self.log_level().is_none() {
            anyhow::bail!(
                "SMSD_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        self.service_config().validate()?;

        Ok(())
    }

    /// Socket address to listen on
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        Ok(self.bind_addr.parse()?)
    }

    /// Tracing level, if the configured name is valid
    pub fn log_level(&self) -> Option<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// The sms-core configuration these settings describe
    pub fn service_config(&self) -> ServiceConfig {
        let store = match self.store_type.as_str() {
            "file" => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
            _ => StoreConfig::Memory,
        };

        let mut engine = EngineConfig::default();
        if let Some(url) = &self.callback_url {
            engine.callback_url = url.clone();
        }
        if let Some(timeout) = self.http_timeout_secs {
            engine.request_timeout_secs = timeout;
        }

        ServiceConfig {
            providers: self.providers.clone(),
            store,
            engine,
        }
    }
}

/// Parse `url=ratio` entries separated by commas
///
/// The ratio may be omitted, in which case the provider asks for 100.
fn parse_providers(raw: &str) -> Result<Vec<ProviderConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.rsplit_once('=') {
            Some((url, ratio)) if !ratio.contains('/') && !ratio.contains('&') => {
                let ratio = ratio.trim().parse().map_err(|_| {
                    anyhow::anyhow!("Invalid call ratio in SMSD_PROVIDERS entry '{}'", entry)
                })?;
                Ok(ProviderConfig::new(url.trim(), ratio))
            }
            _ => Ok(ProviderConfig::new(entry, 100)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_minimal_config() {
        let config = config(&[(
            "SMSD_PROVIDERS",
            "https://provider1.example.com/send=30, https://provider2.example.com/send=70",
        )])
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].call_ratio, 70);
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
        assert_eq!(config.service_config().store, StoreConfig::Memory);
    }

    #[test]
    fn test_ratio_defaults_to_100() {
        let config = config(&[("SMSD_PROVIDERS", "https://provider1.example.com/send")]).unwrap();
        assert_eq!(config.providers[0].call_ratio, 100);
    }

    #[test]
    fn test_missing_providers() {
        let config = config(&[]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("SMSD_PROVIDERS", "https://p.example.com=abc")]).is_err());
        assert!(config(&[("SMSD_HTTP_TIMEOUT_SECS", "soon")]).is_err());

        let base = "https://provider1.example.com/send=30";
        for (key, value) in [
            ("SMSD_BIND_ADDR", "localhost"),
            ("SMSD_STORE_TYPE", "redis"),
            ("SMSD_STORE_TYPE", "file"),
            ("SMSD_HTTP_TIMEOUT_SECS", "0"),
            ("SMSD_LOG_LEVEL", "loud"),
            ("SMSD_CALLBACK_URL", "not a url"),
        ] {
            let config = config(&[("SMSD_PROVIDERS", base), (key, value)]).unwrap();
            assert!(config.validate().is_err(), "{}={} should be rejected", key, value);
        }

        let config = config(&[("SMSD_PROVIDERS", "https://provider1.example.com/send=150")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_store_and_engine_settings() {
        let config = config(&[
            ("SMSD_PROVIDERS", "https://provider1.example.com/send=100"),
            ("SMSD_STORE_TYPE", "file"),
            ("SMSD_STORE_PATH", "/tmp/smsd/store.json"),
            ("SMSD_CALLBACK_URL", "https://sms.example.com/delivery_status"),
            ("SMSD_HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();

        assert!(config.validate().is_ok());
        let service = config.service_config();
        assert_eq!(
            service.store,
            StoreConfig::File {
                path: "/tmp/smsd/store.json".to_string()
            }
        );
        assert_eq!(service.engine.request_timeout_secs, 5);
        assert_eq!(
            service.engine.callback_url,
            "https://sms.example.com/delivery_status"
        );
    }
}
