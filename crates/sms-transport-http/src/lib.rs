// # HTTP SMS Transport
//
// This crate provides the HTTP/JSON transport used to hand messages to SMS
// delivery providers.
//
// ## Wire Format
//
// Each call is a single POST to the provider's endpoint:
//
// ```json
// {
//   "to_number": "5551234",
//   "message": "hello",
//   "callback_url": "https://sms.example.com/delivery_status"
// }
// ```
//
// A provider accepts the message by answering 2xx with a JSON body carrying
// a non-empty `message_id`. Numeric identifiers are taken in their decimal
// form. Anything else is a failure.
//
// ## Constraints
//
// - One HTTP request per call, no retries (failover is owned by the engine)
// - No access to call counters or stores
// - Client-level timeout so a stalled provider cannot hold a dispatch

use async_trait::async_trait;
use serde_json::Value;
use sms_core::traits::{OutboundSms, SmsTransport};
use sms_core::{Error, Result};
use std::time::Duration;

/// Default HTTP timeout for provider calls (10 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP/JSON transport for provider endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a transport with [`DEFAULT_HTTP_TIMEOUT`]
    pub fn with_default_timeout() -> Result<Self> {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

#[async_trait]
impl SmsTransport for HttpTransport {
    async fn post_message(&self, endpoint: &str, request: &OutboundSms) -> Result<String> {
        tracing::debug!("POST {} for {}", endpoint, request.to_number);

        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::transport(endpoint, "request timed out")
                } else {
                    Error::transport(endpoint, format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                500..=599 => Error::transport(
                    endpoint,
                    format!("provider server error: {} - {}", status, error_text),
                ),
                _ => Error::transport(
                    endpoint,
                    format!("provider rejected message: {} - {}", status, error_text),
                ),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::transport(endpoint, format!("Failed to parse response: {}", e)))?;

        message_id(&json["message_id"]).ok_or_else(|| {
            Error::transport(
                endpoint,
                "Invalid response format: message_id is missing or empty",
            )
        })
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

/// Identifier from the `message_id` field, as a string or a number
fn message_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
