// # Phone Directory Trait
//
// Looks up phones by number, creates them on first contact and records the
// blacklist flag set by the lifecycle's terminal "invalid" transition.

use async_trait::async_trait;

use crate::model::{Phone, PhoneNumber};

/// Trait for phone directory implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait PhoneDirectory: Send + Sync {
    /// Get a phone by number
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Phone))`: The phone
    /// - `Ok(None)`: Number never seen
    /// - `Err(Error)`: Storage error
    async fn find_phone(&self, number: &PhoneNumber) -> Result<Option<Phone>, crate::Error>;

    /// Get a phone by number, creating it (not blacklisted) if unseen
    async fn find_or_create_phone(&self, number: &PhoneNumber) -> Result<Phone, crate::Error>;

    /// Set the blacklist flag of an existing phone
    ///
    /// # Returns
    ///
    /// - `Ok(Phone)`: The updated phone
    /// - `Err(Error)`: Unknown phone or storage error
    async fn set_blacklisted(
        &self,
        number: &PhoneNumber,
        blacklisted: bool,
    ) -> Result<Phone, crate::Error>;
}
