// # Message Store Trait
//
// Defines durable storage for accepted messages.
//
// Messages are only stored once a provider has accepted them, so every
// stored message carries its provider-assigned identifier. Identifiers are
// unique across providers.

use async_trait::async_trait;

use crate::lifecycle::Transition;
use crate::model::{Message, MessageId, PhoneNumber};

/// Trait for message store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. [`MessageStore::apply_transition`]
/// must check and update the status under a single lock (or equivalent)
/// so that racing callbacks produce exactly one winner.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a newly accepted message
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Stored
    /// - `Err(Error::DuplicateMessageId)`: Identifier already stored
    /// - `Err(Error)`: Missing identifier or storage error
    async fn insert_message(&self, message: Message) -> Result<(), crate::Error>;

    /// Get a message by identifier
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, crate::Error>;

    /// Atomically apply a lifecycle transition
    ///
    /// # Returns
    ///
    /// - `Ok(Message)`: The message after the transition
    /// - `Err(Error::NotFound)`: Unknown identifier
    /// - `Err(Error::NotSending)`: Status changed since the transition was planned
    async fn apply_transition(
        &self,
        id: &MessageId,
        transition: &Transition,
    ) -> Result<Message, crate::Error>;

    /// List messages, oldest first, optionally for one phone number
    async fn list_messages(
        &self,
        phone_number: Option<&PhoneNumber>,
    ) -> Result<Vec<Message>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
