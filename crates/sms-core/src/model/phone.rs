//! Phone entity and number validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Maximum number of digits stored for a phone number
pub const PHONE_NUMBER_MAX_LEN: usize = 10;

/// A validated, digits-only phone number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Validate a raw phone number
    ///
    /// Empty input, non-digit characters and numbers longer than
    /// [`PHONE_NUMBER_MAX_LEN`] are rejected as invalid input.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::invalid_input("Phone number is required"));
        }

        if !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::invalid_input("Number for phone only allows numbers"));
        }

        if raw.len() > PHONE_NUMBER_MAX_LEN {
            return Err(Error::invalid_input(format!(
                "Number for phone is too long (maximum is {} characters)",
                PHONE_NUMBER_MAX_LEN
            )));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.0
    }
}

/// A phone known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    /// The phone number (unique)
    pub number: PhoneNumber,
    /// Whether dispatches to this phone are refused
    #[serde(default)]
    pub blacklisted: bool,
    /// When the phone was first seen
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Phone {
    /// Create a phone that has never been blacklisted
    pub fn new(number: PhoneNumber) -> Self {
        let now = Utc::now();
        Self {
            number,
            blacklisted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_digits() {
        let number = PhoneNumber::parse("1234567890").unwrap();
        assert_eq!(number.as_str(), "1234567890");
    }

    #[test]
    fn test_rejects_formatted_numbers() {
        let err = PhoneNumber::parse("123-456-7890").unwrap_err();
        assert_eq!(err.to_string(), "Number for phone only allows numbers");

        let err = PhoneNumber::parse("abcdefghji").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_rejects_empty_and_long_numbers() {
        assert_eq!(
            PhoneNumber::parse("").unwrap_err().to_string(),
            "Phone number is required"
        );
        assert!(PhoneNumber::parse("12345678901").is_err());
    }

    #[test]
    fn test_deserialization_validates() {
        let ok: PhoneNumber = serde_json::from_str("\"5551234\"").unwrap();
        assert_eq!(ok.to_string(), "5551234");
        assert!(serde_json::from_str::<PhoneNumber>("\"555-1234\"").is_err());
    }

    #[test]
    fn test_new_phone_is_not_blacklisted() {
        let phone = Phone::new(PhoneNumber::parse("1234567890").unwrap());
        assert!(!phone.is_blacklisted());
    }
}
