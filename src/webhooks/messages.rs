//! Inbound end-user messages.
//!
//! On the wire a message is a flat object: a `type` string plus one payload
//! object named after that type (`text`, `image`, `interactive`, ...). Here
//! the payload is folded into [`MessageContent`], so exactly one payload is
//! ever present and it always agrees with the type.
//!
//! Conversion to and from the wire shape lives in [`super::parser`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, WaId};

use super::events::{PlatformError, parse_unix_timestamp};

/// One inbound end-user message.
///
/// Decoding a single message never fails. One that cannot be decoded becomes
/// [`MessageContent::Malformed`] and is reported at dispatch time, so the
/// other messages of the delivery are unaffected.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct Message {
    /// The sender's platform id.
    pub from: WaId,

    pub id: MessageId,

    /// Unix seconds, as sent by the platform.
    pub timestamp: String,

    /// Set when the customer replied to, or forwarded, an earlier message.
    pub context: Option<ReplyContext>,

    /// Set when the customer arrived through an ad or post.
    pub referral: Option<Referral>,

    /// Identity-change acknowledgement, if any.
    pub identity: Option<Identity>,

    /// Message-level errors. This is the only populated field for
    /// `unknown` and `unsupported` messages.
    pub errors: Vec<PlatformError>,

    pub content: MessageContent,
}

impl Message {
    /// Parses the unix-seconds timestamp.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_timestamp(&self.timestamp)
    }

    /// The wire-level `type` string, if one was sent.
    pub fn message_type(&self) -> Option<&str> {
        self.content.message_type()
    }

    /// Returns true if the customer replied to an earlier message.
    pub fn is_reply(&self) -> bool {
        self.context.as_ref().is_some_and(|c| c.id.is_some())
    }

    /// Returns true if the message was forwarded.
    pub fn is_forwarded(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|c| c.forwarded || c.frequently_forwarded)
    }
}

/// The payload of a message, tagged by its `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(Text),

    /// `audio`, `video`, `image`, `document` or `sticker`.
    Media {
        kind: MediaKind,
        media: Media,
    },

    Location(Location),
    Contacts(Vec<ContactCard>),
    Reaction(Reaction),

    /// A quick-reply button press on a template message.
    Button(Button),

    Order(Order),
    System(System),
    Interactive(Interactive),

    /// The customer opened a chat for the first time (`request_welcome`).
    RequestWelcome,

    /// The platform could not classify the message. Details are in
    /// [`Message::errors`].
    Unknown,

    /// The message type is not supported for this business. Details are in
    /// [`Message::errors`].
    Unsupported,

    /// `type` was absent or not one this crate models.
    ///
    /// Older payloads sometimes omit `type`; the dispatcher infers the kind
    /// from whichever legacy payload is present.
    Unclassified {
        message_type: Option<String>,
        contacts: Option<Vec<ContactCard>>,
        location: Option<Location>,

        /// The object under the key named by `message_type`, if any.
        payload: Option<serde_json::Value>,
    },

    /// The message did not have the shape its `type` requires, e.g. an
    /// `image` message with no `image` object.
    ///
    /// Only `from`, `id` and `timestamp` are read from such a message. `raw`
    /// is the message exactly as delivered.
    Malformed {
        message_type: Option<String>,
        reason: String,
        raw: serde_json::Value,
    },
}

impl MessageContent {
    /// The wire-level `type` string for this content.
    pub fn message_type(&self) -> Option<&str> {
        let s = match self {
            MessageContent::Text(_) => "text",
            MessageContent::Media { kind, .. } => kind.as_str(),
            MessageContent::Location(_) => "location",
            MessageContent::Contacts(_) => "contacts",
            MessageContent::Reaction(_) => "reaction",
            MessageContent::Button(_) => "button",
            MessageContent::Order(_) => "order",
            MessageContent::System(_) => "system",
            MessageContent::Interactive(_) => "interactive",
            MessageContent::RequestWelcome => "request_welcome",
            MessageContent::Unknown => "unknown",
            MessageContent::Unsupported => "unsupported",
            MessageContent::Unclassified { message_type, .. }
            | MessageContent::Malformed { message_type, .. } => return message_type.as_deref(),
        };
        Some(s)
    }
}

/// Which kind of media a media message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
    Document,
    Sticker,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
        }
    }

    pub fn from_type(message_type: &str) -> Option<Self> {
        match message_type {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            "image" => Some(MediaKind::Image),
            "document" => Some(MediaKind::Document),
            "sticker" => Some(MediaKind::Sticker),
            _ => None,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub body: String,
}

/// A media attachment. The binary itself is fetched separately by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Documents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Stickers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,

    /// Audio only: set for voice notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A shared contact card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCard {
    #[serde(default)]
    pub name: ContactName,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<ContactPhone>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<ContactEmail>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<ContactAddress>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<ContactUrl>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<ContactOrg>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactName {
    #[serde(default)]
    pub formatted_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPhone {
    #[serde(default)]
    pub phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<WaId>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEmail {
    #[serde(default)]
    pub email: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub email_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUrl {
    #[serde(default)]
    pub url: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub url_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactOrg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A reaction to an earlier message. `emoji` is absent when a reaction is
/// removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: MessageId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    #[serde(default)]
    pub payload: String,

    #[serde(default)]
    pub text: String,
}

/// A cart sent from a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub catalog_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub product_items: Vec<ProductItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub product_retailer_id: String,
    pub quantity: u64,
    pub item_price: f64,
    pub currency: String,
}

impl Order {
    /// Sum of `quantity * item_price` over all items.
    ///
    /// Assumes a single currency, which the platform guarantees per order.
    pub fn total(&self) -> f64 {
        self.product_items
            .iter()
            .map(|item| item.quantity as f64 * item.item_price)
            .sum()
    }
}

/// A platform-generated message, e.g. the customer changed their number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    #[serde(default)]
    pub body: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Set for `user_changed_number`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<WaId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_wa_id: Option<WaId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

/// Acknowledgement that a customer's identity key changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub acknowledged: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_timestamp: Option<i64>,

    #[serde(default)]
    pub hash: String,
}

/// The message a customer replied to or forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<WaId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forwarded: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub frequently_forwarded: bool,

    /// Set when the customer asked about a catalog product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_product: Option<ReferredProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferredProduct {
    pub catalog_id: String,
    pub product_retailer_id: String,
}

/// Click-to-chat ad or post that brought the customer in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Referral {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Click id for conversion tracking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctwa_clid: Option<String>,
}

// ============================================================================
// Interactive replies
// ============================================================================

/// A customer's answer to an interactive message, tagged by its own `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "super::parser::RawInteractive",
    into = "super::parser::RawInteractive"
)]
pub enum Interactive {
    /// `button_reply`
    ButtonReply(ReplyOption),

    /// `list_reply`
    ListReply(ReplyOption),

    /// `nfm_reply`: a flow was completed.
    FlowCompletion(NfmReply),

    /// `address_message`: the customer submitted an address form.
    AddressSubmission(NfmReply),

    /// Any other interactive type.
    Other {
        interactive_type: String,

        /// Every key of the reply except `type`.
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl Interactive {
    pub fn interactive_type(&self) -> &str {
        match self {
            Interactive::ButtonReply(_) => "button_reply",
            Interactive::ListReply(_) => "list_reply",
            Interactive::FlowCompletion(_) => "nfm_reply",
            Interactive::AddressSubmission(_) => "address_message",
            Interactive::Other {
                interactive_type, ..
            } => interactive_type,
        }
    }
}

/// The option a customer picked from reply buttons or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// List rows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A native-flow-message reply: a completed flow or address form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfmReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// The submitted form, JSON-encoded as a string.
    #[serde(default)]
    pub response_json: String,
}

impl NfmReply {
    /// Decodes [`NfmReply::response_json`].
    pub fn response(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.response_json)
    }
}
