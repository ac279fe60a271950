//! Core traits for the SMS dispatch system
//!
//! This module defines the interfaces of the collaborators the core drives.
//!
//! - [`SmsTransport`]: Post one message to one provider endpoint
//! - [`PhoneDirectory`]: Find or create phones, flip the blacklist flag
//! - [`MessageStore`]: Durable message storage with atomic status updates

pub mod message_store;
pub mod phone_directory;
pub mod transport;

pub use message_store::MessageStore;
pub use phone_directory::PhoneDirectory;
pub use transport::{OutboundSms, SmsTransport};
