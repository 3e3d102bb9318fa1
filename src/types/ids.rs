//! Newtype wrappers for platform identifiers.
//!
//! A webhook delivery carries several kinds of opaque string identifiers
//! (account ids, phone number ids, customer ids, message ids). Wrapping them
//! keeps a customer id from being passed where a message id is expected and
//! makes handler signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A business account (or business portfolio) id, carried by every entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Self {
        AccountId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// The id of one of the business's registered phone numbers.
///
/// Outbound replies are addressed from this id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumberId(pub String);

impl PhoneNumberId {
    pub fn new(s: impl Into<String>) -> Self {
        PhoneNumberId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A customer's platform id.
///
/// This usually looks like a phone number but is not guaranteed to match the
/// number the business used to reach the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaId(pub String);

impl WaId {
    pub fn new(s: impl Into<String>) -> Self {
        WaId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WaId {
    fn from(s: &str) -> Self {
        WaId(s.to_string())
    }
}

/// A message id (`wamid.…`), used both for inbound messages and for the
/// outbound messages that status updates refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        MessageId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened form for log lines.
    pub fn short(&self) -> &str {
        // get() rather than slicing: ids are ASCII in practice but come from
        // untrusted input.
        self.0.get(..24).unwrap_or(&self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod message_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "wamid\\.[A-Za-z0-9=]{1,60}") {
                let id = MessageId::new(&s);
                let json = serde_json::to_string(&id).unwrap();
                let parsed: MessageId = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(id, parsed);
            }

            #[test]
            fn short_is_prefix(s in "[A-Za-z0-9.=]{0,80}") {
                let id = MessageId::new(&s);
                prop_assert!(s.starts_with(id.short()));
                prop_assert!(id.short().len() <= 24);
            }
        }

        #[test]
        fn serializes_as_bare_string() {
            let id = MessageId::new("wamid.ABC");
            assert_eq!(serde_json::to_string(&id).unwrap(), "\"wamid.ABC\"");
        }
    }

    mod wa_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn display_matches_inner(s in "[0-9]{6,15}") {
                let id = WaId::new(&s);
                prop_assert_eq!(id.to_string(), s);
            }
        }
    }

    #[test]
    fn account_id_from_str() {
        let id = AccountId::from("102290129340398");
        assert_eq!(id.as_str(), "102290129340398");
    }

    #[test]
    fn phone_number_id_display() {
        let id = PhoneNumberId::new("106540352242922");
        assert_eq!(format!("{}", id), "106540352242922");
    }
}
