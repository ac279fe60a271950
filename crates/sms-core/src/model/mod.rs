//! Domain entities: phones, providers and messages

pub mod message;
pub mod phone;
pub mod provider;

pub use message::{Message, MessageId, ProviderBinding};
pub use phone::{Phone, PhoneNumber, PHONE_NUMBER_MAX_LEN};
pub use provider::{ProviderId, ProviderSnapshot, MAX_CALL_RATIO};
