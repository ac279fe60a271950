//! Message entity
//!
//! A message's status is private: only the lifecycle module mutates it,
//! through [`Message::mark_sending`] and [`Message::apply`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::lifecycle::MessageStatus;
use crate::model::{PhoneNumber, ProviderId};

/// Provider-assigned message identifier
///
/// Unique across all providers once stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an identifier, rejecting empty ones
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::invalid_input("Message id is required"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The provider that accepted a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBinding {
    pub id: ProviderId,
    pub url: String,
}

/// A message tracked through the delivery lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub(crate) id: Option<MessageId>,
    pub(crate) phone_number: PhoneNumber,
    pub(crate) provider: Option<ProviderBinding>,
    pub(crate) status: MessageStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a pending message for a phone
    ///
    /// Pending messages have no identifier and no provider yet.
    pub fn pending(phone_number: PhoneNumber) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            phone_number,
            provider: None,
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// The provider-assigned identifier, once accepted
    pub fn id(&self) -> Option<&MessageId> {
        self.id.as_ref()
    }

    pub fn phone_number(&self) -> &PhoneNumber {
        &self.phone_number
    }

    /// The provider that accepted the message, once accepted
    pub fn provider(&self) -> Option<&ProviderBinding> {
        self.provider.as_ref()
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Identifier of a message that has been accepted
    pub(crate) fn require_id(&self) -> Result<&MessageId> {
        self.id
            .as_ref()
            .ok_or_else(|| Error::store("message has no provider-assigned identifier"))
    }
}
