// # Store Implementations
//
// This module provides implementations of the PhoneDirectory and
// MessageStore traits for different persistence strategies. Both stores keep
// their working set in [`Records`]; the file store additionally writes it to
// disk after every change.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::lifecycle::Transition;
use crate::model::{Message, MessageId, Phone, PhoneNumber};

/// Phones and accepted messages, as held by a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Records {
    phones: Vec<Phone>,
    /// Oldest first
    messages: Vec<Message>,
    #[serde(skip)]
    phone_index: HashMap<PhoneNumber, usize>,
    #[serde(skip)]
    message_index: HashMap<MessageId, usize>,
}

impl Records {
    /// Rebuild the lookup indexes after deserialization
    pub(crate) fn reindex(&mut self) -> Result<()> {
        self.phone_index.clear();
        for (pos, phone) in self.phones.iter().enumerate() {
            if self.phone_index.insert(phone.number.clone(), pos).is_some() {
                return Err(Error::store(format!("phone {} stored twice", phone.number)));
            }
        }

        self.message_index.clear();
        for (pos, message) in self.messages.iter().enumerate() {
            let id = message.require_id()?.clone();
            if self.message_index.insert(id.clone(), pos).is_some() {
                return Err(Error::DuplicateMessageId(id.to_string()));
            }
        }

        Ok(())
    }

    pub(crate) fn phone_count(&self) -> usize {
        self.phones.len()
    }

    pub(crate) fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn find_phone(&self, number: &PhoneNumber) -> Option<&Phone> {
        self.phone_index.get(number).map(|&pos| &self.phones[pos])
    }

    /// Returns the phone and whether it was created
    pub(crate) fn find_or_create_phone(&mut self, number: &PhoneNumber) -> (Phone, bool) {
        if let Some(phone) = self.find_phone(number) {
            return (phone.clone(), false);
        }

        let phone = Phone::new(number.clone());
        self.phone_index.insert(number.clone(), self.phones.len());
        self.phones.push(phone.clone());
        (phone, true)
    }

    pub(crate) fn set_blacklisted(&mut self, number: &PhoneNumber, blacklisted: bool) -> Result<Phone> {
        let pos = *self
            .phone_index
            .get(number)
            .ok_or_else(|| Error::store(format!("unknown phone {}", number)))?;

        let phone = &mut self.phones[pos];
        phone.blacklisted = blacklisted;
        phone.updated_at = Utc::now();
        Ok(phone.clone())
    }

    pub(crate) fn insert_message(&mut self, message: Message) -> Result<()> {
        let id = message.require_id()?.clone();
        if self.message_index.contains_key(&id) {
            return Err(Error::DuplicateMessageId(id.to_string()));
        }

        self.message_index.insert(id, self.messages.len());
        self.messages.push(message);
        Ok(())
    }

    pub(crate) fn get_message(&self, id: &MessageId) -> Option<&Message> {
        self.message_index.get(id).map(|&pos| &self.messages[pos])
    }

    /// Check and update the status in one step
    pub(crate) fn apply_transition(&mut self, id: &MessageId, transition: &Transition) -> Result<Message> {
        let pos = *self
            .message_index
            .get(id)
            .ok_or_else(|| Error::not_found(id.as_str()))?;

        let message = &mut self.messages[pos];
        message.apply(transition)?;
        Ok(message.clone())
    }

    pub(crate) fn list_messages(&self, phone_number: Option<&PhoneNumber>) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| phone_number.is_none_or(|number| m.phone_number() == number))
            .cloned()
            .collect()
    }
}
