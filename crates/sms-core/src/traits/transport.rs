// # SMS Transport Trait
//
// Defines the interface for posting a message to a provider endpoint.
//
// ## Implementations
//
// - HTTP/JSON: `sms-transport-http` crate
//
// ## Usage
//
// ```rust,ignore
// use sms_core::traits::{OutboundSms, SmsTransport};
//
// let request = OutboundSms {
//     to_number: "1234567890".to_string(),
//     message: "hello".to_string(),
//     callback_url: "https://example.com/delivery_status".to_string(),
// };
// let message_id = transport.post_message("https://example.com/provider1", &request).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body posted to a provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundSms {
    /// Destination phone number
    pub to_number: String,
    /// Message text
    pub message: String,
    /// URL the provider reports the delivery outcome to
    pub callback_url: String,
}

/// Trait for outbound transport implementations
///
/// A transport makes exactly one call per invocation. It does not retry,
/// does not touch call counters and does not pick providers: the delivery
/// client charges the counter and the dispatch engine owns failover.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    /// Post a message to a provider endpoint
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The identifier the provider assigned to the message
    /// - `Err(Error)`: Connection failure, timeout, non-success status or a
    ///   response without an identifier
    async fn post_message(
        &self,
        endpoint: &str,
        request: &OutboundSms,
    ) -> Result<String, crate::Error>;

    /// Get the transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
