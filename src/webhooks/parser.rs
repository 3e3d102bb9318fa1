//! Webhook payload decoder.
//!
//! This module turns raw request bytes into a typed [`Notification`]. The
//! decoder is tolerant of additions on the platform side and strict about
//! shapes it does model.
//!
//! # Decoding Strategy
//!
//! 1. The outer tree (`object`, `entry[]`, `changes[]`) is decoded directly.
//! 2. Each change is read as `{ field, value }` with `value` left as raw
//!    JSON, then `value` is decoded into the payload type matching `field`.
//!    Unknown fields become [`Change::Unrecognized`] (kept, not an error).
//! 3. Each message is read in its flat wire shape and folded into a
//!    [`MessageContent`] according to `type`. Unknown or missing types become
//!    [`MessageContent::Unclassified`].
//! 4. Unknown JSON keys are ignored at every level.
//!
//! A message that does not fit its `type` (e.g. `"type": "text"` with no
//! `text` object) becomes [`MessageContent::Malformed`] rather than failing
//! the whole delivery. The dispatcher reports it through the error policy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{MessageId, WaId};

use super::events::{Change, Notification, PlatformError};
use super::messages::{
    Button, ContactCard, Identity, Interactive, Location, Media, MediaKind, Message,
    MessageContent, NfmReply, Order, Reaction, Referral, ReplyContext, ReplyOption, System, Text,
};

/// Error type for payload decoding failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not JSON, or does not have the notification shape.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A change's `value` does not match the shape its `field` requires.
    #[error("invalid value for field {field}: {source}")]
    InvalidValue {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// A message (or interactive reply) names a type whose payload is absent.
    #[error("{kind} payload missing")]
    MissingPayload { kind: String },
}

/// Decodes a webhook request body into a [`Notification`].
///
/// Decoding is pure: the same bytes always produce the same tree.
///
/// # Examples
///
/// ```
/// use whatsapp_webhooks::webhooks::{Change, parse_notification};
///
/// let body = br#"{
///     "object": "whatsapp_business_account",
///     "entry": [{
///         "id": "102290129340398",
///         "changes": [{
///             "field": "account_review_update",
///             "value": { "decision": "APPROVED" }
///         }]
///     }]
/// }"#;
///
/// let notification = parse_notification(body).unwrap();
/// let change = &notification.entries[0].changes[0];
/// assert!(matches!(change, Change::AccountReviewUpdate(u) if u.decision == "APPROVED"));
/// ```
pub fn parse_notification(payload: &[u8]) -> Result<Notification, ParseError> {
    Ok(serde_json::from_slice(payload)?)
}

fn required<T>(payload: Option<T>, kind: &str) -> Result<T, ParseError> {
    payload.ok_or_else(|| ParseError::MissingPayload {
        kind: kind.to_string(),
    })
}

// ============================================================================
// Changes
// ============================================================================

/// A change as it appears on the wire, before `value` is interpreted.
#[derive(Debug, Deserialize)]
pub(crate) struct RawChange {
    field: String,
    #[serde(default)]
    value: Value,
}

fn decode_value<T: DeserializeOwned>(field: &str, value: Value) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|source| ParseError::InvalidValue {
        field: field.to_string(),
        source,
    })
}

impl TryFrom<RawChange> for Change {
    type Error = ParseError;

    fn try_from(raw: RawChange) -> Result<Self, Self::Error> {
        let RawChange { field, value } = raw;
        let change = match field.as_str() {
            "messages" => Change::Messages(decode_value(&field, value)?),
            "account_alerts" => Change::AccountAlerts(decode_value(&field, value)?),
            "message_template_status_update" => {
                Change::TemplateStatusUpdate(decode_value(&field, value)?)
            }
            "message_template_category_update" => {
                Change::TemplateCategoryUpdate(decode_value(&field, value)?)
            }
            "message_template_quality_update" => {
                Change::TemplateQualityUpdate(decode_value(&field, value)?)
            }
            "phone_number_name_update" => {
                Change::PhoneNumberNameUpdate(decode_value(&field, value)?)
            }
            "phone_number_quality_update" => {
                Change::PhoneNumberQualityUpdate(decode_value(&field, value)?)
            }
            "account_update" => Change::AccountUpdate(decode_value(&field, value)?),
            "account_review_update" => Change::AccountReviewUpdate(decode_value(&field, value)?),
            "business_capability_update" => {
                Change::BusinessCapabilityUpdate(decode_value(&field, value)?)
            }
            "user_preferences" => Change::UserPreferences(decode_value(&field, value)?),
            "flows" => Change::Flows(decode_value(&field, value)?),
            // New platform fields must not break decoding
            _ => Change::Unrecognized { field, value },
        };
        Ok(change)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A message in its flat wire shape: a `type` plus one payload per type.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RawMessage {
    #[serde(default)]
    from: WaId,
    id: MessageId,
    #[serde(default)]
    timestamp: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    message_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<ReplyContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referral: Option<Referral>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<Identity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<PlatformError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<Text>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    video: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sticker: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contacts: Option<Vec<ContactCard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reaction: Option<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    button: Option<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system: Option<System>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interactive: Option<Interactive>,

    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl RawMessage {
    fn media_slot(&mut self, kind: MediaKind) -> &mut Option<Media> {
        match kind {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
            MediaKind::Image => &mut self.image,
            MediaKind::Document => &mut self.document,
            MediaKind::Sticker => &mut self.sticker,
        }
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = ParseError;

    fn try_from(mut raw: RawMessage) -> Result<Self, Self::Error> {
        let message_type = raw.message_type.take();

        let content = match message_type.as_deref() {
            Some("text") => MessageContent::Text(required(raw.text.take(), "text")?),
            Some("location") => {
                MessageContent::Location(required(raw.location.take(), "location")?)
            }
            Some("contacts") => {
                MessageContent::Contacts(required(raw.contacts.take(), "contacts")?)
            }
            Some("reaction") => {
                MessageContent::Reaction(required(raw.reaction.take(), "reaction")?)
            }
            Some("button") => MessageContent::Button(required(raw.button.take(), "button")?),
            Some("order") => MessageContent::Order(required(raw.order.take(), "order")?),
            Some("system") => MessageContent::System(required(raw.system.take(), "system")?),
            Some("interactive") => {
                MessageContent::Interactive(required(raw.interactive.take(), "interactive")?)
            }
            Some("request_welcome") => MessageContent::RequestWelcome,
            Some("unknown") => MessageContent::Unknown,
            Some("unsupported") => MessageContent::Unsupported,
            Some(other) => match MediaKind::from_type(other) {
                Some(kind) => MessageContent::Media {
                    kind,
                    media: required(raw.media_slot(kind).take(), other)?,
                },
                None => MessageContent::Unclassified {
                    message_type: Some(other.to_string()),
                    contacts: raw.contacts.take(),
                    location: raw.location.take(),
                    payload: raw.rest.remove(other),
                },
            },
            None => MessageContent::Unclassified {
                message_type: None,
                contacts: raw.contacts.take(),
                location: raw.location.take(),
                payload: None,
            },
        };

        Ok(Message {
            from: raw.from,
            id: raw.id,
            timestamp: raw.timestamp,
            context: raw.context,
            referral: raw.referral,
            identity: raw.identity,
            errors: raw.errors,
            content,
        })
    }
}

impl From<Message> for RawMessage {
    fn from(message: Message) -> Self {
        let message_type = message.content.message_type().map(str::to_string);
        let mut raw = RawMessage {
            from: message.from,
            id: message.id,
            timestamp: message.timestamp,
            message_type,
            context: message.context,
            referral: message.referral,
            identity: message.identity,
            errors: message.errors,
            text: None,
            audio: None,
            video: None,
            image: None,
            document: None,
            sticker: None,
            location: None,
            contacts: None,
            reaction: None,
            button: None,
            order: None,
            system: None,
            interactive: None,
            rest: Map::new(),
        };

        match message.content {
            MessageContent::Text(text) => raw.text = Some(text),
            MessageContent::Media { kind, media } => *raw.media_slot(kind) = Some(media),
            MessageContent::Location(location) => raw.location = Some(location),
            MessageContent::Contacts(contacts) => raw.contacts = Some(contacts),
            MessageContent::Reaction(reaction) => raw.reaction = Some(reaction),
            MessageContent::Button(button) => raw.button = Some(button),
            MessageContent::Order(order) => raw.order = Some(order),
            MessageContent::System(system) => raw.system = Some(system),
            MessageContent::Interactive(interactive) => raw.interactive = Some(interactive),
            MessageContent::RequestWelcome
            | MessageContent::Unknown
            | MessageContent::Unsupported => {}
            MessageContent::Unclassified {
                message_type,
                contacts,
                location,
                payload,
            } => {
                raw.contacts = contacts;
                raw.location = location;
                if let (Some(key), Some(payload)) = (message_type, payload) {
                    raw.rest.insert(key, payload);
                }
            }
            // Serialized verbatim by `Message::serialize`
            MessageContent::Malformed { .. } => {}
        }

        raw
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        match decode_message(value.clone()) {
            Ok(message) => message,
            Err(error) => malformed(value, &error),
        }
    }
}

fn decode_message(value: Value) -> Result<Message, ParseError> {
    let raw: RawMessage = serde_json::from_value(value)?;
    Message::try_from(raw)
}

/// Keeps what can be read of an undecodable message so it can still be
/// identified and reported.
fn malformed(raw: Value, error: &ParseError) -> Message {
    let string = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
    let from = WaId::new(string("from").unwrap_or_default());
    let id = MessageId::new(string("id").unwrap_or_default());
    let timestamp = string("timestamp").unwrap_or_default();
    let message_type = string("type");

    Message {
        from,
        id,
        timestamp,
        context: None,
        referral: None,
        identity: None,
        errors: Vec::new(),
        content: MessageContent::Malformed {
            message_type,
            reason: error.to_string(),
            raw,
        },
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.content {
            MessageContent::Malformed { raw, .. } => raw.serialize(serializer),
            _ => RawMessage::from(self.clone()).serialize(serializer),
        }
    }
}

// ============================================================================
// Interactive replies
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RawInteractive {
    #[serde(rename = "type")]
    interactive_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    button_reply: Option<ReplyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    list_reply: Option<ReplyOption>,

    // Address forms are delivered through the same native-flow envelope
    #[serde(
        default,
        alias = "address_message",
        skip_serializing_if = "Option::is_none"
    )]
    nfm_reply: Option<NfmReply>,

    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl TryFrom<RawInteractive> for Interactive {
    type Error = ParseError;

    fn try_from(raw: RawInteractive) -> Result<Self, Self::Error> {
        let interactive = match raw.interactive_type.as_str() {
            "button_reply" => {
                Interactive::ButtonReply(required(raw.button_reply, "interactive button_reply")?)
            }
            "list_reply" => {
                Interactive::ListReply(required(raw.list_reply, "interactive list_reply")?)
            }
            "nfm_reply" => {
                Interactive::FlowCompletion(required(raw.nfm_reply, "interactive nfm_reply")?)
            }
            "address_message" => Interactive::AddressSubmission(required(
                raw.nfm_reply,
                "interactive address_message",
            )?),
            _ => Interactive::Other {
                interactive_type: raw.interactive_type,
                fields: raw.rest,
            },
        };
        Ok(interactive)
    }
}

impl From<Interactive> for RawInteractive {
    fn from(interactive: Interactive) -> Self {
        let mut raw = RawInteractive {
            interactive_type: interactive.interactive_type().to_string(),
            button_reply: None,
            list_reply: None,
            nfm_reply: None,
            rest: Map::new(),
        };
        match interactive {
            Interactive::ButtonReply(reply) => raw.button_reply = Some(reply),
            Interactive::ListReply(reply) => raw.list_reply = Some(reply),
            Interactive::FlowCompletion(reply) | Interactive::AddressSubmission(reply) => {
                raw.nfm_reply = Some(reply)
            }
            Interactive::Other { fields, .. } => raw.rest = fields,
        }
        raw
    }
}
