//! Provider identity and read-only views

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Upper bound of a provider's desired call ratio
pub const MAX_CALL_RATIO: u8 = 100;

/// Registry-assigned provider identifier
///
/// Identifiers are handed out in registration order, so the lowest
/// identifier belongs to the first-registered provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u64);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider-{}", self.0)
    }
}

/// Point-in-time view of a registered provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    /// Endpoint URL messages are posted to
    pub url: String,
    /// Desired percentage share of total traffic (0-100)
    pub call_ratio: u8,
    /// Dispatch attempts made against this provider so far
    pub call_count: u64,
}

/// Check that a provider endpoint is an absolute HTTP(S) URL
pub fn validate_endpoint_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::config(format!("Invalid provider URL '{}': {}", raw, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::config(format!(
                "Provider URL '{}' must use http or https, got '{}'",
                raw, other
            )));
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::config(format!("Provider URL '{}' has no host", raw)));
    }

    Ok(())
}

/// Check that a call ratio lies within 0..=100
pub fn validate_call_ratio(ratio: u32) -> Result<u8> {
    if ratio > u32::from(MAX_CALL_RATIO) {
        return Err(Error::config(format!(
            "Call ratio must be between 0 and {}, got {}",
            MAX_CALL_RATIO, ratio
        )));
    }
    Ok(ratio as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_format() {
        assert!(validate_endpoint_url("http://www.example.com").is_ok());
        assert!(validate_endpoint_url("https://www.example.com/provider1").is_ok());
        assert!(validate_endpoint_url("example.com").is_err());
        assert!(validate_endpoint_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(validate_call_ratio(0).unwrap(), 0);
        assert_eq!(validate_call_ratio(100).unwrap(), 100);
        assert!(validate_call_ratio(101).is_err());
    }

    #[test]
    fn test_ids_order_by_registration() {
        assert!(ProviderId(1) < ProviderId(2));
        assert_eq!(ProviderId(7).to_string(), "provider-7");
    }
}
