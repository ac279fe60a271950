//! Provider registry
//!
//! The registry holds every known delivery provider together with its
//! desired call ratio and its running call counter. It is an explicitly
//! owned value: build one, wrap it in an `Arc`, and hand it to the selector
//! and the delivery client. Tests create a fresh registry per case (or call
//! [`ProviderRegistry::reset_call_counts`]) to get deterministic counters.
//!
//! ## Usage
//!
//! ```rust
//! use sms_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! let a = registry.register("https://example.com/provider1", 30).unwrap();
//! let b = registry.register("https://example.com/provider2", 70).unwrap();
//!
//! registry.record_call(a).unwrap();
//! assert_eq!(registry.get(a).unwrap().call_count, 1);
//! assert_eq!(registry.get(b).unwrap().call_count, 0);
//! ```
//!
//! ## Thread Safety
//!
//! The provider list sits behind an `RwLock` and is only written on
//! registration. Call counters are per-provider atomics, so concurrent
//! dispatches never lose an increment and never contend on the list lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::model::provider::{validate_call_ratio, validate_endpoint_url};
use crate::model::{ProviderId, ProviderSnapshot};

#[derive(Debug)]
struct ProviderEntry {
    id: ProviderId,
    url: String,
    call_ratio: u8,
    call_count: AtomicU64,
}

impl ProviderEntry {
    fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            id: self.id,
            url: self.url.clone(),
            call_ratio: self.call_ratio,
            call_count: self.call_count.load(Ordering::Acquire),
        }
    }
}

/// Registry of delivery providers and their call counters
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: RwLock<Vec<Arc<ProviderEntry>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from provider configuration, in configuration order
    pub fn from_config(providers: &[ProviderConfig]) -> Result<Self> {
        let registry = Self::new();
        for provider in providers {
            registry.register(&provider.url, provider.call_ratio)?;
        }
        Ok(registry)
    }

    /// Register a provider with a zero call count
    ///
    /// # Parameters
    ///
    /// - `url`: HTTP(S) endpoint, unique within the registry
    /// - `call_ratio`: desired percentage share of traffic (0-100)
    ///
    /// # Returns
    ///
    /// The identifier assigned to the provider. Identifiers increase in
    /// registration order.
    pub fn register(&self, url: impl Into<String>, call_ratio: u32) -> Result<ProviderId> {
        let url = url.into();
        validate_endpoint_url(&url)?;
        let call_ratio = validate_call_ratio(call_ratio)?;

        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);

        if providers.iter().any(|p| p.url == url) {
            return Err(Error::config(format!("Provider URL already registered: {}", url)));
        }

        let id = ProviderId(providers.last().map_or(1, |p| p.id.0 + 1));
        providers.push(Arc::new(ProviderEntry {
            id,
            url,
            call_ratio,
            call_count: AtomicU64::new(0),
        }));

        tracing::debug!("Registered {} with call ratio {}", id, call_ratio);
        Ok(id)
    }

    /// Increment a provider's call counter by one
    ///
    /// # Returns
    ///
    /// The counter value after the increment.
    pub fn record_call(&self, id: ProviderId) -> Result<u64> {
        let entry = self
            .entry(id)
            .ok_or_else(|| Error::config(format!("Unknown provider: {}", id)))?;
        Ok(entry.call_count.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Snapshot of one provider
    pub fn get(&self, id: ProviderId) -> Option<ProviderSnapshot> {
        self.entry(id).map(|entry| entry.snapshot())
    }

    /// Snapshot of every provider, ordered by identifier
    pub fn snapshot(&self) -> Vec<ProviderSnapshot> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.iter().map(|entry| entry.snapshot()).collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no provider is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset every call counter to zero
    pub fn reset_call_counts(&self) {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        for entry in providers.iter() {
            entry.call_count.store(0, Ordering::Release);
        }
    }

    fn entry(&self, id: ProviderId) -> Option<Arc<ProviderEntry>> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.iter().find(|p| p.id == id).cloned()
    }
}
