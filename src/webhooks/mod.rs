//! Webhook handling for business-messaging deliveries.
//!
//! This module provides:
//! - Signature verification for delivery bodies (HMAC-SHA256)
//! - The subscription handshake
//! - Decoding of deliveries into a typed tree
//! - The handler registry and the dispatch tree that feeds it

pub mod business;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod messages;
pub mod parser;
pub mod signature;
pub mod verification;

pub use dispatch::{DispatchError, DispatchSummary};
pub use events::{
    Change, Contact, Entry, Metadata, MessagesValue, Notification, PlatformError, Status,
    StatusKind, WHATSAPP_BUSINESS_ACCOUNT,
};
pub use handlers::{
    ErrorPolicy, EventContext, HandlerResult, Handlers, MessageContext, ValueContext,
};
pub use messages::{Interactive, MediaKind, Message, MessageContent};
pub use parser::{ParseError, parse_notification};
pub use signature::{
    SIGNATURE_HEADER, SignatureError, compute_signature, format_signature_header,
    parse_signature_header, verify_signature,
};
pub use verification::{SUBSCRIBE_MODE, VerificationError, verify_subscription};
