//! Typed representation of a webhook delivery.
//!
//! A delivery is a tree: one [`Notification`] holds [`Entry`] values (one per
//! business account), each entry holds [`Change`] values, and each change is
//! a tagged variant selected by its `field` discriminator. The `messages`
//! variant further holds [`Message`] values (see [`super::messages`]) plus
//! delivery [`Status`] updates and platform-reported errors.
//!
//! # Field Kinds
//!
//! | `field` | Variant |
//! |---------|---------|
//! | `messages` | [`Change::Messages`] |
//! | `account_alerts` | [`Change::AccountAlerts`] |
//! | `message_template_status_update` | [`Change::TemplateStatusUpdate`] |
//! | `message_template_category_update` | [`Change::TemplateCategoryUpdate`] |
//! | `message_template_quality_update` | [`Change::TemplateQualityUpdate`] |
//! | `phone_number_name_update` | [`Change::PhoneNumberNameUpdate`] |
//! | `phone_number_quality_update` | [`Change::PhoneNumberQualityUpdate`] |
//! | `account_update` | [`Change::AccountUpdate`] |
//! | `account_review_update` | [`Change::AccountReviewUpdate`] |
//! | `business_capability_update` | [`Change::BusinessCapabilityUpdate`] |
//! | `user_preferences` | [`Change::UserPreferences`] |
//! | `flows` | [`Change::Flows`] |
//! | anything else | [`Change::Unrecognized`] |
//!
//! Decoding is two-step (discriminator first, then the matching payload) and
//! lives in [`super::parser`].

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::types::{AccountId, MessageId, PhoneNumberId, WaId};

use super::business::{
    AccountAlert, AccountReviewUpdate, AccountUpdate, BusinessCapabilityUpdate, FlowEvent,
    PhoneNumberNameUpdate, PhoneNumberQualityUpdate, TemplateCategoryUpdate,
    TemplateQualityUpdate, TemplateStatusUpdate, UserPreferencesValue,
};
use super::messages::Message;

/// The `object` value used for business-account deliveries.
pub const WHATSAPP_BUSINESS_ACCOUNT: &str = "whatsapp_business_account";

/// One inbound webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Which platform product the notification concerns.
    pub object: String,

    /// Entries in delivery order.
    #[serde(rename = "entry", default)]
    pub entries: Vec<Entry>,
}

impl Notification {
    /// Returns true if this delivery concerns a business account.
    pub fn is_whatsapp_business_account(&self) -> bool {
        self.object == WHATSAPP_BUSINESS_ACCOUNT
    }

    /// Total number of changes across all entries.
    pub fn change_count(&self) -> usize {
        self.entries.iter().map(|e| e.changes.len()).sum()
    }
}

/// One business account's batch of changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The business account (or portfolio) id.
    pub id: AccountId,

    /// Unix time at which the notification was sent.
    ///
    /// Present on business-event deliveries; usually absent on `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,

    /// Changes in delivery order.
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// A single typed event, selected by the wire-level `field` discriminator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "super::parser::RawChange")]
pub enum Change {
    /// Inbound messages, delivery statuses and platform errors.
    Messages(MessagesValue),
    AccountAlerts(AccountAlert),
    TemplateStatusUpdate(TemplateStatusUpdate),
    TemplateCategoryUpdate(TemplateCategoryUpdate),
    TemplateQualityUpdate(TemplateQualityUpdate),
    PhoneNumberNameUpdate(PhoneNumberNameUpdate),
    PhoneNumberQualityUpdate(PhoneNumberQualityUpdate),
    AccountUpdate(AccountUpdate),
    AccountReviewUpdate(AccountReviewUpdate),
    BusinessCapabilityUpdate(BusinessCapabilityUpdate),
    UserPreferences(UserPreferencesValue),
    Flows(FlowEvent),

    /// A field this crate does not model.
    ///
    /// The raw value is kept so that it survives re-encoding.
    Unrecognized {
        field: String,
        value: serde_json::Value,
    },
}

impl Change {
    /// Returns the wire-level `field` discriminator of this change.
    pub fn field(&self) -> &str {
        match self {
            Change::Messages(_) => "messages",
            Change::AccountAlerts(_) => "account_alerts",
            Change::TemplateStatusUpdate(_) => "message_template_status_update",
            Change::TemplateCategoryUpdate(_) => "message_template_category_update",
            Change::TemplateQualityUpdate(_) => "message_template_quality_update",
            Change::PhoneNumberNameUpdate(_) => "phone_number_name_update",
            Change::PhoneNumberQualityUpdate(_) => "phone_number_quality_update",
            Change::AccountUpdate(_) => "account_update",
            Change::AccountReviewUpdate(_) => "account_review_update",
            Change::BusinessCapabilityUpdate(_) => "business_capability_update",
            Change::UserPreferences(_) => "user_preferences",
            Change::Flows(_) => "flows",
            Change::Unrecognized { field, .. } => field,
        }
    }
}

impl Serialize for Change {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Change", 2)?;
        state.serialize_field("field", self.field())?;
        match self {
            Change::Messages(v) => state.serialize_field("value", v)?,
            Change::AccountAlerts(v) => state.serialize_field("value", v)?,
            Change::TemplateStatusUpdate(v) => state.serialize_field("value", v)?,
            Change::TemplateCategoryUpdate(v) => state.serialize_field("value", v)?,
            Change::TemplateQualityUpdate(v) => state.serialize_field("value", v)?,
            Change::PhoneNumberNameUpdate(v) => state.serialize_field("value", v)?,
            Change::PhoneNumberQualityUpdate(v) => state.serialize_field("value", v)?,
            Change::AccountUpdate(v) => state.serialize_field("value", v)?,
            Change::AccountReviewUpdate(v) => state.serialize_field("value", v)?,
            Change::BusinessCapabilityUpdate(v) => state.serialize_field("value", v)?,
            Change::UserPreferences(v) => state.serialize_field("value", v)?,
            Change::Flows(v) => state.serialize_field("value", v)?,
            Change::Unrecognized { value, .. } => state.serialize_field("value", value)?,
        }
        state.end()
    }
}

// ============================================================================
// `messages` value
// ============================================================================

/// The value of a `messages` change.
///
/// A single value may carry any mix of platform errors, status updates and
/// inbound messages. They are dispatched in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesValue {
    #[serde(default)]
    pub messaging_product: String,

    #[serde(default)]
    pub metadata: Metadata,

    /// Profiles of the customers who sent the messages in this value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<Status>,

    /// Notification-level errors reported by the platform.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PlatformError>,
}

/// The business phone number a change was delivered for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,

    #[serde(default)]
    pub phone_number_id: PhoneNumberId,
}

/// A customer profile attached to a `messages` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub wa_id: WaId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

// ============================================================================
// Statuses
// ============================================================================

/// Delivery state of an outbound message.
///
/// Unknown states are preserved verbatim in [`StatusKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusKind {
    Sent,
    Delivered,
    Read,
    Failed,
    Deleted,
    Warning,
    Other(String),
}

impl StatusKind {
    pub fn as_str(&self) -> &str {
        match self {
            StatusKind::Sent => "sent",
            StatusKind::Delivered => "delivered",
            StatusKind::Read => "read",
            StatusKind::Failed => "failed",
            StatusKind::Deleted => "deleted",
            StatusKind::Warning => "warning",
            StatusKind::Other(s) => s,
        }
    }
}

impl From<String> for StatusKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "sent" => StatusKind::Sent,
            "delivered" => StatusKind::Delivered,
            "read" => StatusKind::Read,
            "failed" => StatusKind::Failed,
            "deleted" => StatusKind::Deleted,
            "warning" => StatusKind::Warning,
            _ => StatusKind::Other(s),
        }
    }
}

impl From<StatusKind> for String {
    fn from(kind: StatusKind) -> Self {
        match kind {
            StatusKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery-state transition for a previously sent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// The id of the outbound message this status refers to.
    pub id: MessageId,

    pub status: StatusKind,

    #[serde(default)]
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<WaId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_type: Option<String>,

    /// Opaque data the business attached when sending the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biz_opaque_callback_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PlatformError>,
}

impl Status {
    /// Parses the unix-seconds timestamp.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_timestamp(&self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ConversationOrigin>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationOrigin {
    #[serde(rename = "type")]
    pub origin_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable: Option<bool>,

    #[serde(default)]
    pub pricing_model: String,

    #[serde(default)]
    pub category: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pricing_type: Option<String>,
}

// ============================================================================
// Platform errors
// ============================================================================

/// A structured failure descriptor reported by the platform.
///
/// These are payload data, not processing failures: they are handed to the
/// error-related handler slots like any other event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformError {
    pub code: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<ErrorData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_subcode: Option<i64>,

    /// Trace id for support requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbtrace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub details: String,
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.code)?;
        if let Some(title) = self.title.as_deref().or(self.message.as_deref()) {
            write!(f, " {}", title)?;
        }
        if let Some(data) = &self.error_data {
            write!(f, ": {}", data.details)?;
        }
        Ok(())
    }
}

/// Parses a unix-seconds timestamp string as sent by the platform.
pub(crate) fn parse_unix_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = s.trim().parse().ok()?;
    DateTime::from_timestamp(secs, 0)
}
