//! Delivery client
//!
//! Performs one outbound call to one provider on behalf of the dispatch
//! engine. The provider's call counter is charged before the network call,
//! so every attempt counts, including ones that fail or time out.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{MessageId, PhoneNumber, ProviderSnapshot};
use crate::registry::ProviderRegistry;
use crate::traits::{OutboundSms, SmsTransport};

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The provider accepted the message and assigned it an identifier
    Accepted(MessageId),
    /// The provider could not be reached or refused the message
    Failed(String),
}

/// Client that sends one message to one provider
pub struct DeliveryClient {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn SmsTransport>,
    callback_url: String,
    timeout: Duration,
}

impl DeliveryClient {
    /// Create a delivery client
    ///
    /// # Parameters
    ///
    /// - `registry`: Registry whose counters are charged per attempt
    /// - `transport`: Outbound transport implementation
    /// - `callback_url`: URL providers report delivery outcomes to
    /// - `timeout`: Upper bound for a single call
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn SmsTransport>,
        callback_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            callback_url: callback_url.into(),
            timeout,
        }
    }

    /// Send a message through a provider
    ///
    /// Transport failures come back as [`DeliveryOutcome::Failed`]. The only
    /// error is an unknown provider, which means the registry and the
    /// caller disagree.
    pub async fn send(
        &self,
        provider: &ProviderSnapshot,
        phone_number: &PhoneNumber,
        text: &str,
    ) -> Result<DeliveryOutcome> {
        let calls = self.registry.record_call(provider.id)?;
        debug!("Calling {} ({}), call #{}", provider.id, provider.url, calls);

        let request = OutboundSms {
            to_number: phone_number.as_str().to_string(),
            message: text.to_string(),
            callback_url: self.callback_url.clone(),
        };

        let call = self.transport.post_message(&provider.url, &request);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::transport(
                &provider.url,
                format!("no response within {:?}", self.timeout),
            )),
        };

        let outcome = match result.and_then(MessageId::new) {
            Ok(id) => DeliveryOutcome::Accepted(id),
            Err(e) => {
                warn!(
                    "{} via {} failed: {}",
                    provider.id,
                    self.transport.transport_name(),
                    e
                );
                DeliveryOutcome::Failed(e.to_string())
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedTransport {
        reply: std::result::Result<&'static str, &'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl SmsTransport for FixedTransport {
        async fn post_message(
            &self,
            endpoint: &str,
            request: &OutboundSms,
        ) -> std::result::Result<String, Error> {
            assert_eq!(request.callback_url, "https://example.com/delivery_status");
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(str::to_string)
                .map_err(|msg| Error::transport(endpoint, msg))
        }

        fn transport_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn client(
        reply: std::result::Result<&'static str, &'static str>,
        delay: Duration,
    ) -> (DeliveryClient, ProviderSnapshot, Arc<ProviderRegistry>) {
        let registry = Arc::new(ProviderRegistry::new());
        let id = registry.register("https://example.com/provider1", 100).unwrap();
        let provider = registry.get(id).unwrap();
        let client = DeliveryClient::new(
            Arc::clone(&registry),
            Arc::new(FixedTransport { reply, delay }),
            "https://example.com/delivery_status",
            Duration::from_millis(50),
        );
        (client, provider, registry)
    }

    fn number() -> PhoneNumber {
        PhoneNumber::parse("1234567890").unwrap()
    }

    #[tokio::test]
    async fn test_accepted_message_charges_counter() {
        let (client, provider, registry) = client(Ok("abc-123"), Duration::ZERO);

        let outcome = client.send(&provider, &number(), "hello").await.unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::Accepted(MessageId::new("abc-123").unwrap())
        );
        assert_eq!(registry.get(provider.id).unwrap().call_count, 1);
    }

    #[tokio::test]
    async fn test_failed_call_still_counts() {
        let (client, provider, registry) = client(Err("status 500"), Duration::ZERO);

        let outcome = client.send(&provider, &number(), "hello").await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(registry.get(provider.id).unwrap().call_count, 1);
    }

    #[tokio::test]
    async fn test_empty_identifier_is_a_failure() {
        let (client, provider, _) = client(Ok(""), Duration::ZERO);

        let outcome = client.send(&provider, &number(), "hello").await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let (client, provider, registry) = client(Ok("late"), Duration::from_secs(5));

        let outcome = client.send(&provider, &number(), "hello").await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(registry.get(provider.id).unwrap().call_count, 1);
    }
}
