//! Dispatch engine
//!
//! The DispatchEngine is responsible for:
//! - Validating inbound send and callback requests
//! - Refusing sends to blacklisted phones before any provider is contacted
//! - Failing over across providers until one accepts the message
//! - Driving accepted messages through the lifecycle on callbacks
//!
//! ## Architecture
//!
//! ```text
//!  create_message                               update_status
//!        │                                            │
//!        ▼                                            ▼
//! ┌──────────────┐                           ┌─────────────────┐
//! │ PhoneDirectory│ blacklist gate           │  MessageStore   │ lookup
//! └──────────────┘                           └─────────────────┘
//!        │                                            │
//!        ▼                                            ▼
//! ┌──────────────┐   select   ┌──────────┐   ┌─────────────────┐
//! │ dispatch loop │──────────▶│ Selector │   │   Transition    │ plan + apply
//! └──────────────┘            └──────────┘   └─────────────────┘
//!        │ send                                       │ invalid
//!        ▼                                            ▼
//! ┌──────────────┐                           ┌─────────────────┐
//! │DeliveryClient│                           │ PhoneDirectory  │ blacklist
//! └──────────────┘                           └─────────────────┘
//! ```
//!
//! ## Dispatch Flow
//!
//! 1. Ask the selector for a provider, excluding the ones that failed
//! 2. Send through the delivery client (which charges the counter)
//! 3. On acceptance, bind provider and identifier and store the message
//! 4. On failure, exclude the provider and go back to 1
//!
//! At most one attempt per registered provider is made. When all of them
//! fail, nothing is stored and the caller gets "all providers unavailable".

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::delivery::{DeliveryClient, DeliveryOutcome};
use crate::error::{Error, Result};
use crate::lifecycle::{MessageStatus, Transition};
use crate::model::{Message, MessageId, Phone, PhoneNumber, ProviderBinding, ProviderId};
use crate::registry::ProviderRegistry;
use crate::selector;
use crate::traits::{MessageStore, PhoneDirectory, SmsTransport};

/// Events emitted by the DispatchEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A dispatch began
    DispatchStarted {
        phone_number: PhoneNumber,
        providers: usize,
    },

    /// One provider failed within a dispatch
    AttemptFailed {
        phone_number: PhoneNumber,
        provider: ProviderId,
        reason: String,
    },

    /// A provider accepted the message and it was stored
    MessageAccepted {
        message_id: MessageId,
        provider: ProviderId,
    },

    /// Every provider failed for one dispatch
    ProvidersExhausted {
        phone_number: PhoneNumber,
        attempts: usize,
    },

    /// A send to a blacklisted phone was refused
    BlacklistRejected { phone_number: PhoneNumber },

    /// A callback moved a message to a terminal status
    StatusUpdated {
        message_id: MessageId,
        from: MessageStatus,
        to: MessageStatus,
    },

    /// A phone was blacklisted by an "invalid" callback
    PhoneBlacklisted { phone_number: PhoneNumber },
}

/// Core dispatch engine
///
/// The engine holds no per-request state; every call is an independent unit
/// of work. The only shared mutable state is the registry's call counters,
/// which are atomic per provider.
///
/// ## Load Resistance
///
/// - **Bounded event channel**: Prevents unbounded memory growth
/// - **Event dropping**: When the channel is full, new events are dropped (logged)
/// - **Bounded failover**: At most one attempt per registered provider
pub struct DispatchEngine {
    /// Providers and call counters
    registry: Arc<ProviderRegistry>,

    /// Outbound calls
    delivery: DeliveryClient,

    /// Phone lookup and blacklist flags
    phones: Arc<dyn PhoneDirectory>,

    /// Accepted messages
    messages: Arc<dyn MessageStore>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<DispatchEvent>,
}

impl DispatchEngine {
    /// Create a new dispatch engine
    ///
    /// # Parameters
    ///
    /// - `registry`: Providers to dispatch through
    /// - `transport`: Outbound transport implementation
    /// - `phones`: Phone directory implementation
    /// - `messages`: Message store implementation
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields dispatch events
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn SmsTransport>,
        phones: Arc<dyn PhoneDirectory>,
        messages: Arc<dyn MessageStore>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<DispatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let delivery = DeliveryClient::new(
            Arc::clone(&registry),
            transport,
            config.callback_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );

        let engine = Self {
            registry,
            delivery,
            phones,
            messages,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The provider registry this engine dispatches through
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Accept a send request
    ///
    /// Validates the input, finds or creates the phone, applies the
    /// blacklist gate, dispatches, and stores the accepted message.
    ///
    /// # Returns
    ///
    /// - `Ok(Message)`: Accepted by a provider, status `sending`
    /// - `Err(Error::InvalidInput)`: Missing or malformed phone number or text
    /// - `Err(Error::Blacklisted)`: No provider was contacted
    /// - `Err(Error::ProvidersUnavailable)`: Every provider failed, nothing stored
    pub async fn create_message(&self, phone_number: &str, text: &str) -> Result<Message> {
        let number = PhoneNumber::parse(phone_number)?;
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Message is required"));
        }

        let phone = self.phones.find_or_create_phone(&number).await?;
        if phone.is_blacklisted() {
            info!("Refusing to send to blacklisted phone {}", number);
            self.emit_event(DispatchEvent::BlacklistRejected {
                phone_number: number,
            });
            return Err(Error::Blacklisted);
        }

        let message = self.dispatch(&phone, text).await?;
        self.messages.insert_message(message.clone()).await?;

        if let (Some(id), Some(provider)) = (message.id(), message.provider()) {
            info!("Message {} to {} accepted by {}", id, number, provider.id);
            self.emit_event(DispatchEvent::MessageAccepted {
                message_id: id.clone(),
                provider: provider.id,
            });
        }

        Ok(message)
    }

    /// Try providers until one accepts the message
    ///
    /// The attempt budget is the number of providers registered when the
    /// dispatch starts, and a provider that failed is never tried again
    /// within the same dispatch.
    ///
    /// # Returns
    ///
    /// - `Ok(Message)`: Status `sending`, bound to the accepting provider
    /// - `Err(Error::ProvidersUnavailable)`: No provider accepted it
    pub async fn dispatch(&self, phone: &Phone, text: &str) -> Result<Message> {
        let max_attempts = self.registry.len();
        let mut excluded = HashSet::with_capacity(max_attempts);
        let mut message = Message::pending(phone.number.clone());

        self.emit_event(DispatchEvent::DispatchStarted {
            phone_number: phone.number.clone(),
            providers: max_attempts,
        });

        let mut attempts = 0;
        while attempts < max_attempts {
            let Some(provider) = selector::select(&self.registry, &excluded) else {
                debug!("No provider left to try for {}", phone.number);
                break;
            };
            attempts += 1;

            match self.delivery.send(&provider, &phone.number, text).await? {
                DeliveryOutcome::Accepted(id) => {
                    message.mark_sending(
                        id,
                        ProviderBinding {
                            id: provider.id,
                            url: provider.url,
                        },
                    )?;
                    return Ok(message);
                }
                DeliveryOutcome::Failed(reason) => {
                    warn!(
                        "Attempt {}/{} for {} failed at {}: {}",
                        attempts, max_attempts, phone.number, provider.id, reason
                    );
                    self.emit_event(DispatchEvent::AttemptFailed {
                        phone_number: phone.number.clone(),
                        provider: provider.id,
                        reason,
                    });
                    excluded.insert(provider.id);
                }
            }
        }

        warn!(
            "All providers failed for {} after {} attempts",
            phone.number, attempts
        );
        self.emit_event(DispatchEvent::ProvidersExhausted {
            phone_number: phone.number.clone(),
            attempts,
        });
        Err(Error::ProvidersUnavailable { attempts })
    }

    /// Apply a delivery callback
    ///
    /// Checks run in order: unknown identifier, then not sending, then
    /// unrecognized status. An "invalid" outcome also blacklists the phone.
    ///
    /// The phone is flagged before the message turns terminal, so a failed
    /// write leaves the callback retryable. If the transition itself fails
    /// afterwards, a flag set by this call is cleared again.
    ///
    /// # Returns
    ///
    /// - `Ok(Message)`: The message in its terminal status
    /// - `Err(Error::NotFound)`: Unknown identifier
    /// - `Err(Error::NotSending)`: Already terminal, or lost a race to another callback
    /// - `Err(Error::UnsupportedStatus)`: Token outside the accepted vocabulary
    pub async fn update_status(&self, message_id: &str, status: &str) -> Result<Message> {
        let id = MessageId::new(message_id)?;
        if status.is_empty() {
            return Err(Error::invalid_input("Status is required"));
        }

        let message = self
            .messages
            .get_message(&id)
            .await?
            .ok_or_else(|| Error::not_found(id.as_str()))?;

        let transition = Transition::for_callback(&message, status)?;
        let number = message.phone_number();

        let flagged_here = if transition.blacklists_phone() {
            let phone = self.phones.find_or_create_phone(number).await?;
            if !phone.is_blacklisted() {
                self.phones.set_blacklisted(number, true).await?;
            }
            !phone.is_blacklisted()
        } else {
            false
        };

        let updated = match self.messages.apply_transition(&id, &transition).await {
            Ok(updated) => updated,
            Err(e) => {
                if flagged_here {
                    self.unflag_phone(&id, number).await;
                }
                return Err(e);
            }
        };

        info!("Message {} is now {}", id, updated.status());
        self.emit_event(DispatchEvent::StatusUpdated {
            message_id: id,
            from: transition.from(),
            to: transition.to(),
        });

        if transition.blacklists_phone() {
            info!("Phone {} blacklisted", number);
            self.emit_event(DispatchEvent::PhoneBlacklisted {
                phone_number: number.clone(),
            });
        }

        Ok(updated)
    }

    /// Clear a blacklist flag set for a callback whose transition failed
    ///
    /// Left alone when the message still ended up blacklisted, which is the
    /// case when a concurrent "invalid" callback won the race.
    async fn unflag_phone(&self, id: &MessageId, number: &PhoneNumber) {
        match self.messages.get_message(id).await {
            Ok(Some(message)) if message.status() == MessageStatus::Blacklisted => return,
            Ok(_) => {}
            Err(e) => {
                warn!("Leaving {} blacklisted, message lookup failed: {}", number, e);
                return;
            }
        }

        if let Err(e) = self.phones.set_blacklisted(number, false).await {
            warn!("Failed to clear blacklist flag on {}: {}", number, e);
        }
    }

    /// Stored messages, oldest first, optionally for one phone number
    pub async fn list_messages(&self, phone_number: Option<&str>) -> Result<Vec<Message>> {
        let filter = phone_number.map(PhoneNumber::parse).transpose()?;
        self.messages.list_messages(filter.as_ref()).await
    }

    /// Emit a dispatch event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: DispatchEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped");
            }
        }
    }
}
