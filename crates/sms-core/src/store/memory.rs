// # Memory Store
//
// In-memory implementation of PhoneDirectory and MessageStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where message history isn't
// worth keeping.
//
// ## Crash Behavior
//
// - All phones, blacklist flags and messages are lost on restart
// - Callbacks for messages accepted before a restart are answered with 404

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::lifecycle::Transition;
use crate::model::{Message, MessageId, Phone, PhoneNumber};
use crate::store::Records;
use crate::traits::{MessageStore, PhoneDirectory};

/// In-memory store implementation
///
/// Phones and messages live behind a single `RwLock`, so a status check and
/// the update that follows it happen under the same write guard.
///
/// # Example
///
/// ```rust,no_run
/// use sms_core::model::PhoneNumber;
/// use sms_core::store::MemoryStore;
/// use sms_core::traits::PhoneDirectory;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///     let number = PhoneNumber::parse("5551234")?;
///
///     let phone = store.find_or_create_phone(&number).await?;
///     assert!(!phone.is_blacklisted());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Records>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored messages
    pub async fn len(&self) -> usize {
        self.inner.read().await.message_count()
    }

    /// Check if no message is stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get the number of known phones
    pub async fn phone_count(&self) -> usize {
        self.inner.read().await.phone_count()
    }
}

#[async_trait]
impl PhoneDirectory for MemoryStore {
    async fn find_phone(&self, number: &PhoneNumber) -> Result<Option<Phone>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.find_phone(number).cloned())
    }

    async fn find_or_create_phone(&self, number: &PhoneNumber) -> Result<Phone, Error> {
        let mut guard = self.inner.write().await;
        let (phone, _) = guard.find_or_create_phone(number);
        Ok(phone)
    }

    async fn set_blacklisted(&self, number: &PhoneNumber, blacklisted: bool) -> Result<Phone, Error> {
        let mut guard = self.inner.write().await;
        guard.set_blacklisted(number, blacklisted)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: Message) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert_message(message)
    }

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get_message(id).cloned())
    }

    async fn apply_transition(&self, id: &MessageId, transition: &Transition) -> Result<Message, Error> {
        let mut guard = self.inner.write().await;
        guard.apply_transition(id, transition)
    }

    async fn list_messages(&self, phone_number: Option<&PhoneNumber>) -> Result<Vec<Message>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.list_messages(phone_number))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::MessageStatus;
    use crate::model::{ProviderBinding, ProviderId};

    fn accepted(id: &str, number: &str) -> Message {
        let mut message = Message::pending(PhoneNumber::parse(number).unwrap());
        message
            .mark_sending(
                MessageId::new(id).unwrap(),
                ProviderBinding {
                    id: ProviderId(1),
                    url: "https://example.com/provider1".to_string(),
                },
            )
            .unwrap();
        message
    }

    #[tokio::test]
    async fn test_memory_store_phones() {
        let store = MemoryStore::new();
        let number = PhoneNumber::parse("5551234").unwrap();

        assert!(store.find_phone(&number).await.unwrap().is_none());

        let phone = store.find_or_create_phone(&number).await.unwrap();
        assert!(!phone.is_blacklisted());
        assert_eq!(store.phone_count().await, 1);

        let phone = store.set_blacklisted(&number, true).await.unwrap();
        assert!(phone.is_blacklisted());

        // Creating again returns the existing phone
        let phone = store.find_or_create_phone(&number).await.unwrap();
        assert!(phone.is_blacklisted());
        assert_eq!(store.phone_count().await, 1);
    }

    #[tokio::test]
    async fn test_set_blacklisted_requires_known_phone() {
        let store = MemoryStore::new();
        let number = PhoneNumber::parse("5551234").unwrap();
        assert!(store.set_blacklisted(&number, true).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_messages() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        store.insert_message(accepted("a", "5551234")).await.unwrap();
        store.insert_message(accepted("b", "5550000")).await.unwrap();
        store.insert_message(accepted("c", "5551234")).await.unwrap();

        let err = store
            .insert_message(accepted("a", "5559999"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateMessageId(_)));
        assert_eq!(store.len().await, 3);

        let all = store.list_messages(None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id().unwrap().as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let number = PhoneNumber::parse("5551234").unwrap();
        let filtered = store.list_messages(Some(&number)).await.unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[tokio::test]
    async fn test_apply_transition_once() {
        let store = MemoryStore::new();
        let message = accepted("a", "5551234");
        let id = message.id().unwrap().clone();
        let transition = Transition::for_callback(&message, "delivered").unwrap();
        store.insert_message(message).await.unwrap();

        let updated = store.apply_transition(&id, &transition).await.unwrap();
        assert_eq!(updated.status(), MessageStatus::Delivered);

        let err = store.apply_transition(&id, &transition).await.unwrap_err();
        assert!(matches!(err, Error::NotSending(_)));

        let stored = store.get_message(&id).await.unwrap().unwrap();
        assert_eq!(stored.status(), MessageStatus::Delivered);
    }
}
