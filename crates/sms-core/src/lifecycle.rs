//! Message lifecycle state machine
//!
//! ```text
//!            accepted               delivered
//! pending ─────────────▶ sending ─────────────▶ delivered
//!                           │      failed
//!                           ├──────────────────▶ failed
//!                           │      invalid
//!                           └──────────────────▶ blacklisted
//! ```
//!
//! Legal transitions are listed in [`TRANSITIONS`] and checked before every
//! status mutation. Terminal states have no outbound transitions. Illegal
//! transitions are returned as typed errors, never panics.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::{Message, MessageId, ProviderBinding};

/// Status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created, no provider has accepted it yet
    Pending,
    /// A provider accepted it and assigned an identifier
    Sending,
    /// Provider reported delivery
    Delivered,
    /// Provider reported a delivery failure
    Failed,
    /// Provider reported the destination as invalid
    Blacklisted,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sending => "sending",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
            MessageStatus::Blacklisted => "blacklisted",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Failed | MessageStatus::Blacklisted
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery outcome reported by a provider callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Delivered,
    Failed,
    /// The destination number is invalid; also accepted as `blacklisted`
    Invalid,
}

impl FromStr for CallbackStatus {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        match token {
            "" => Err(Error::invalid_input("Status is required")),
            "delivered" => Ok(CallbackStatus::Delivered),
            "failed" => Ok(CallbackStatus::Failed),
            "invalid" | "blacklisted" => Ok(CallbackStatus::Invalid),
            other => Err(Error::unsupported_status(other)),
        }
    }
}

/// Trigger of a lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A provider accepted the send and assigned an identifier
    Accepted,
    /// A callback reported an outcome
    Callback(CallbackStatus),
}

impl From<CallbackStatus> for LifecycleEvent {
    fn from(status: CallbackStatus) -> Self {
        LifecycleEvent::Callback(status)
    }
}

/// The complete transition table
pub const TRANSITIONS: &[(MessageStatus, LifecycleEvent, MessageStatus)] = &[
    (
        MessageStatus::Pending,
        LifecycleEvent::Accepted,
        MessageStatus::Sending,
    ),
    (
        MessageStatus::Sending,
        LifecycleEvent::Callback(CallbackStatus::Delivered),
        MessageStatus::Delivered,
    ),
    (
        MessageStatus::Sending,
        LifecycleEvent::Callback(CallbackStatus::Failed),
        MessageStatus::Failed,
    ),
    (
        MessageStatus::Sending,
        LifecycleEvent::Callback(CallbackStatus::Invalid),
        MessageStatus::Blacklisted,
    ),
];

/// Look up the target of a transition, if it is legal
pub fn next_status(from: MessageStatus, event: LifecycleEvent) -> Option<MessageStatus> {
    TRANSITIONS
        .iter()
        .find(|(source, trigger, _)| *source == from && *trigger == event)
        .map(|(_, _, target)| *target)
}

/// A checked callback transition
///
/// Only [`Transition::for_callback`] builds one, so holding a `Transition`
/// means the table allowed it. Stores apply it with [`Message::apply`]
/// under their own lock, which makes the status change a compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    from: MessageStatus,
    to: MessageStatus,
}

impl Transition {
    /// Plan the transition a callback asks for
    ///
    /// Checks run in a fixed order: the message must be `sending`, then the
    /// token must be recognized.
    pub fn for_callback(message: &Message, token: &str) -> Result<Self> {
        let id = message.require_id()?;

        if message.status() != MessageStatus::Sending {
            return Err(Error::not_sending(id.as_str()));
        }

        let callback: CallbackStatus = token.parse()?;
        let to = next_status(MessageStatus::Sending, callback.into())
            .ok_or_else(|| Error::not_sending(id.as_str()))?;

        Ok(Self {
            from: MessageStatus::Sending,
            to,
        })
    }

    pub fn from(&self) -> MessageStatus {
        self.from
    }

    pub fn to(&self) -> MessageStatus {
        self.to
    }

    /// Whether applying this transition must blacklist the owning phone
    pub fn blacklists_phone(&self) -> bool {
        self.to == MessageStatus::Blacklisted
    }
}

impl Message {
    /// Record a provider's acceptance: assign the identifier, bind the
    /// provider and move `pending` to `sending`
    pub fn mark_sending(&mut self, id: MessageId, provider: ProviderBinding) -> Result<()> {
        let to = next_status(self.status, LifecycleEvent::Accepted).ok_or_else(|| {
            Error::Other(format!(
                "message cannot be accepted while {}",
                self.status
            ))
        })?;

        if self.id.is_some() {
            return Err(Error::Other(
                "message identifier is already assigned".to_string(),
            ));
        }

        self.id = Some(id);
        self.provider = Some(provider);
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a planned callback transition
    ///
    /// Fails with "not in a sending state" when the status moved since the
    /// transition was planned, so only one of several racing callbacks wins.
    pub fn apply(&mut self, transition: &Transition) -> Result<()> {
        if self.status != transition.from {
            let id = self.require_id()?;
            return Err(Error::not_sending(id.as_str()));
        }

        self.status = transition.to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PhoneNumber, ProviderId};

    fn sending_message(id: &str) -> Message {
        let mut message = Message::pending(PhoneNumber::parse("1234567890").unwrap());
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

    #[test]
    fn test_pending_to_sending_binds_provider() {
        let message = sending_message("abc");
        assert_eq!(message.status(), MessageStatus::Sending);
        assert_eq!(message.id().unwrap().as_str(), "abc");
        assert_eq!(message.provider().unwrap().id, ProviderId(1));
    }

    #[test]
    fn test_identifier_assigned_once() {
        let mut message = sending_message("abc");
        let again = message.mark_sending(
            MessageId::new("def").unwrap(),
            ProviderBinding {
                id: ProviderId(2),
                url: "https://example.com/provider2".to_string(),
            },
        );
        assert!(again.is_err());
        assert_eq!(message.id().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_callback_tokens() {
        for (token, expected) in [
            ("delivered", MessageStatus::Delivered),
            ("failed", MessageStatus::Failed),
            ("invalid", MessageStatus::Blacklisted),
            ("blacklisted", MessageStatus::Blacklisted),
        ] {
            let mut message = sending_message("abc");
            let transition = Transition::for_callback(&message, token).unwrap();
            message.apply(&transition).unwrap();
            assert_eq!(message.status(), expected, "token {}", token);
        }
    }

    #[test]
    fn test_unknown_token_leaves_message_unchanged() {
        let message = sending_message("abc");
        let before = message.clone();
        let err = Transition::for_callback(&message, "unknown").unwrap_err();
        assert!(matches!(err, Error::UnsupportedStatus(_)));
        assert_eq!(message, before);
    }

    #[test]
    fn test_terminal_states_reject_callbacks() {
        let mut message = sending_message("abc");
        let transition = Transition::for_callback(&message, "failed").unwrap();
        message.apply(&transition).unwrap();

        let err = Transition::for_callback(&message, "delivered").unwrap_err();
        assert!(matches!(err, Error::NotSending(_)));

        // Not-sending is reported before the token is looked at
        let err = Transition::for_callback(&message, "unknown").unwrap_err();
        assert!(matches!(err, Error::NotSending(_)));
    }

    #[test]
    fn test_stale_transition_loses() {
        let mut message = sending_message("abc");
        let first = Transition::for_callback(&message, "delivered").unwrap();
        let second = Transition::for_callback(&message, "failed").unwrap();

        message.apply(&first).unwrap();
        assert!(matches!(message.apply(&second), Err(Error::NotSending(_))));
        assert_eq!(message.status(), MessageStatus::Delivered);
    }

    #[test]
    fn test_table_has_no_exits_from_terminal_states() {
        for (from, _, _) in TRANSITIONS {
            assert!(!from.is_terminal());
        }
        assert_eq!(
            next_status(MessageStatus::Pending, CallbackStatus::Delivered.into()),
            None
        );
    }

    #[test]
    fn test_blacklist_side_effect_flag() {
        let message = sending_message("abc");
        assert!(Transition::for_callback(&message, "invalid")
            .unwrap()
            .blacklists_phone());
        assert!(!Transition::for_callback(&message, "delivered")
            .unwrap()
            .blacklists_phone());
    }
}
