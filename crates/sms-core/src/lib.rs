// # sms-core
//
// Core library for the SMS dispatch service.
//
// ## Architecture Overview
//
// This library provides the dispatch engine and its collaborators:
// - **ProviderRegistry**: Providers, desired call ratios and call counters
// - **selector**: Weighted choice of the most underserved provider
// - **DeliveryClient**: One outbound call, charged to the provider's counter
// - **DispatchEngine**: Blacklist gate, failover loop and callback handling
// - **lifecycle**: Message status state machine
// - **SmsTransport / PhoneDirectory / MessageStore**: Collaborator traits
//
// ## Design Principles
//
// 1. **Library-First**: The daemon is a thin shell around this crate
// 2. **Explicit state**: The registry is an owned value, never a global
// 3. **Typed outcomes**: Failures are `Error` variants with a caller status code

pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod registry;
pub mod selector;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, ServiceConfig, StoreConfig};
pub use delivery::{DeliveryClient, DeliveryOutcome};
pub use engine::{DispatchEngine, DispatchEvent};
pub use error::{Error, Result};
pub use lifecycle::{CallbackStatus, MessageStatus, Transition};
pub use model::{Message, MessageId, Phone, PhoneNumber, ProviderId};
pub use registry::ProviderRegistry;
pub use store::{FileStore, MemoryStore};
pub use traits::{MessageStore, OutboundSms, PhoneDirectory, SmsTransport};
