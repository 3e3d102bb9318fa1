//! The handler registry.
//!
//! [`Handlers`] holds one optional callback per leaf of the dispatch tree.
//! Applications register only the slots they care about; an empty slot is
//! skipped without error. Registration happens during setup, after which the
//! registry is shared read-only (see [`crate::server::AppState`]).
//!
//! # Slots
//!
//! | Group | Slots |
//! |-------|-------|
//! | Business events | `account_alerts`, `template_status`, `template_category`, `template_quality`, `phone_number_name`, `phone_number_quality`, `account_update`, `account_review`, `business_capability`, `flows` |
//! | Batches | `notification_errors`, `statuses`, `user_preferences` |
//! | Messages | `text`, `product_enquiry`, `referral`, `image`, `audio`, `video`, `document`, `sticker`, `location`, `contacts`, `reaction`, `button`, `order`, `system`, `customer_identity_change`, `button_reply`, `list_reply`, `flow_completion`, `address_submission`, `interactive`, `message_errors`, `unsupported`, `welcome` |
//!
//! Callbacks return [`HandlerResult`]; a failure is handed to the
//! [`ErrorPolicy`], which decides whether the rest of the delivery is still
//! processed.

use std::fmt;

use tracing::warn;

use crate::types::{AccountId, PhoneNumberId};

use super::business::{
    AccountAlert, AccountReviewUpdate, AccountUpdate, BusinessCapabilityUpdate, FlowEvent,
    PhoneNumberNameUpdate, PhoneNumberQualityUpdate, TemplateCategoryUpdate,
    TemplateQualityUpdate, TemplateStatusUpdate, UserPreference,
};
use super::dispatch::DispatchError;
use super::events::{Contact, Metadata, PlatformError, Status};
use super::messages::{
    Button, ContactCard, Identity, Interactive, Location, Media, Message, NfmReply, Order,
    Reaction, ReferredProduct, Referral, ReplyOption, System, Text,
};

/// What every handler callback returns.
pub type HandlerResult = anyhow::Result<()>;

// ============================================================================
// Contexts
// ============================================================================

/// Where in the delivery an event came from.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// The notification's `object` tag.
    pub object: &'a str,

    /// The entry (business account) id.
    pub account_id: &'a AccountId,

    /// The entry's `time`, if sent.
    pub entry_time: Option<i64>,

    /// The change's `field` discriminator.
    pub field: &'a str,
}

/// Context for batch slots: the envelope of a `messages` or
/// `user_preferences` value.
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'a> {
    pub event: &'a EventContext<'a>,
    pub messaging_product: &'a str,
    pub metadata: &'a Metadata,
    pub contacts: &'a [Contact],
}

impl ValueContext<'_> {
    /// The business phone number the value was delivered for.
    pub fn phone_number_id(&self) -> &PhoneNumberId {
        &self.metadata.phone_number_id
    }
}

/// Context for message slots. The full [`Message`] is available for fields
/// the slot's payload doesn't carry (reply context, timestamp, ...).
#[derive(Debug, Clone, Copy)]
pub struct MessageContext<'a> {
    pub event: &'a EventContext<'a>,
    pub metadata: &'a Metadata,
    pub contacts: &'a [Contact],
    pub message: &'a Message,
}

impl MessageContext<'_> {
    /// The business phone number the message was sent to.
    pub fn phone_number_id(&self) -> &PhoneNumberId {
        &self.metadata.phone_number_id
    }

    /// The sender's profile name, looked up in the value's contacts.
    pub fn sender_name(&self) -> Option<&str> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == self.message.from)
            .map(|c| c.profile.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

// ============================================================================
// Error policy
// ============================================================================

type PolicyFn =
    dyn Fn(&EventContext<'_>, DispatchError) -> Result<(), DispatchError> + Send + Sync;

/// Decides what happens when a handler fails or a message can't be routed.
///
/// Returning `Ok(())` continues with the next item; returning the error
/// aborts the rest of the delivery and makes dispatch fail with it.
pub struct ErrorPolicy(Box<PolicyFn>);

impl ErrorPolicy {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&EventContext<'_>, DispatchError) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        ErrorPolicy(Box::new(f))
    }

    /// Logs the error at warn and continues. This is the default.
    pub fn continue_on_error() -> Self {
        ErrorPolicy::new(|event, error| {
            warn!(
                account_id = %event.account_id,
                field = event.field,
                error = %error,
                "Continuing after dispatch error"
            );
            Ok(())
        })
    }

    /// Stops at the first error.
    pub fn abort_on_error() -> Self {
        ErrorPolicy::new(|_, error| Err(error))
    }

    pub(crate) fn decide(
        &self,
        event: &EventContext<'_>,
        error: DispatchError,
    ) -> Result<(), DispatchError> {
        (self.0)(event, error)
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::continue_on_error()
    }
}

impl fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorPolicy(..)")
    }
}

// ============================================================================
// Registry
// ============================================================================

macro_rules! handler_slots {
    ($(
        $(#[$doc:meta])*
        $slot:ident, $setter:ident: ($($arg:ty),+);
    )*) => {
        /// One optional callback per event category, plus the error policy.
        #[derive(Default)]
        pub struct Handlers {
            $( pub(crate) $slot: Option<Box<dyn Fn($($arg),+) -> HandlerResult + Send + Sync>>, )*
            pub(crate) error_policy: ErrorPolicy,
        }

        impl Handlers {
            $(
                $(#[$doc])*
                pub fn $setter<F>(&mut self, handler: F) -> &mut Self
                where
                    F: Fn($($arg),+) -> HandlerResult + Send + Sync + 'static,
                {
                    self.$slot = Some(Box::new(handler));
                    self
                }
            )*

            /// Names of the slots that currently have a callback.
            pub fn registered_slots(&self) -> Vec<&'static str> {
                let mut slots = Vec::new();
                $(
                    if self.$slot.is_some() {
                        slots.push(stringify!($slot));
                    }
                )*
                slots
            }
        }
    };
}

handler_slots! {
    // Business events

    /// `account_alerts`
    account_alerts, on_account_alerts: (&EventContext<'_>, &AccountAlert);
    /// `message_template_status_update`
    template_status, on_template_status: (&EventContext<'_>, &TemplateStatusUpdate);
    /// `message_template_category_update`
    template_category, on_template_category: (&EventContext<'_>, &TemplateCategoryUpdate);
    /// `message_template_quality_update`
    template_quality, on_template_quality: (&EventContext<'_>, &TemplateQualityUpdate);
    /// `phone_number_name_update`
    phone_number_name, on_phone_number_name: (&EventContext<'_>, &PhoneNumberNameUpdate);
    /// `phone_number_quality_update`
    phone_number_quality, on_phone_number_quality: (&EventContext<'_>, &PhoneNumberQualityUpdate);
    /// `account_update`
    account_update, on_account_update: (&EventContext<'_>, &AccountUpdate);
    /// `account_review_update`
    account_review, on_account_review: (&EventContext<'_>, &AccountReviewUpdate);
    /// `business_capability_update`
    business_capability, on_business_capability: (&EventContext<'_>, &BusinessCapabilityUpdate);
    /// `flows`
    flows, on_flows: (&EventContext<'_>, &FlowEvent);

    // Batches

    /// Platform errors attached to a `messages` value. Called once per value,
    /// before statuses and messages.
    notification_errors, on_notification_errors: (&ValueContext<'_>, &[PlatformError]);
    /// Delivery statuses of outbound messages. Called once per value.
    statuses, on_statuses: (&ValueContext<'_>, &[Status]);
    /// Marketing opt-outs and opt-ins. Called once per change.
    user_preferences, on_user_preferences: (&ValueContext<'_>, &[UserPreference]);

    // Messages

    /// Plain text with no referred product and no referral.
    text, on_text: (&MessageContext<'_>, &Text);
    /// Text asking about a catalog product.
    product_enquiry, on_product_enquiry: (&MessageContext<'_>, &Text, &ReferredProduct);
    /// Text from a customer who arrived through an ad or post.
    referral, on_referral: (&MessageContext<'_>, &Text, &Referral);
    image, on_image: (&MessageContext<'_>, &Media);
    audio, on_audio: (&MessageContext<'_>, &Media);
    video, on_video: (&MessageContext<'_>, &Media);
    document, on_document: (&MessageContext<'_>, &Media);
    sticker, on_sticker: (&MessageContext<'_>, &Media);
    location, on_location: (&MessageContext<'_>, &Location);
    contacts, on_contacts: (&MessageContext<'_>, &[ContactCard]);
    reaction, on_reaction: (&MessageContext<'_>, &Reaction);
    /// Quick-reply button on a template message.
    button, on_button: (&MessageContext<'_>, &Button);
    order, on_order: (&MessageContext<'_>, &Order);
    system, on_system: (&MessageContext<'_>, &System);
    /// Untyped legacy message carrying only an identity acknowledgement.
    customer_identity_change, on_customer_identity_change: (&MessageContext<'_>, &Identity);
    button_reply, on_button_reply: (&MessageContext<'_>, &ReplyOption);
    list_reply, on_list_reply: (&MessageContext<'_>, &ReplyOption);
    /// A completed flow (`nfm_reply`).
    flow_completion, on_flow_completion: (&MessageContext<'_>, &NfmReply);
    address_submission, on_address_submission: (&MessageContext<'_>, &NfmReply);
    /// Interactive replies of any other type.
    interactive, on_interactive: (&MessageContext<'_>, &Interactive);
    /// `unknown` messages, with the platform's explanation.
    message_errors, on_message_errors: (&MessageContext<'_>, &[PlatformError]);
    /// `unsupported` messages, with the platform's explanation.
    unsupported, on_unsupported: (&MessageContext<'_>, &[PlatformError]);
    /// `request_welcome`: the customer opened a chat for the first time.
    welcome, on_welcome: (&MessageContext<'_>, &Message);
}

impl Handlers {
    /// An empty registry with the default error policy.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_error_policy(&mut self, policy: ErrorPolicy) -> &mut Self {
        self.error_policy = policy;
        self
    }

    /// Shorthand for [`Handlers::set_error_policy`] with a closure.
    pub fn on_error<F>(&mut self, policy: F) -> &mut Self
    where
        F: Fn(&EventContext<'_>, DispatchError) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.set_error_policy(ErrorPolicy::new(policy))
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("registered", &self.registered_slots())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::recording_handlers;
    use crate::types::{MessageId, WaId};
    use crate::webhooks::events::Profile;
    use crate::webhooks::messages::MessageContent;

    #[test]
    fn new_registry_is_empty() {
        let handlers = Handlers::new();
        assert!(handlers.registered_slots().is_empty());
    }

    #[test]
    fn registering_fills_exactly_that_slot() {
        let mut handlers = Handlers::new();
        handlers
            .on_text(|_, _| Ok(()))
            .on_statuses(|_, _| Ok(()));

        assert_eq!(handlers.registered_slots(), vec!["statuses", "text"]);
    }

    #[test]
    fn registering_twice_replaces() {
        let mut handlers = Handlers::new();
        handlers.on_flows(|_, _| anyhow::bail!("first"));
        handlers.on_flows(|_, _| Ok(()));

        let account_id = AccountId::new("1");
        let event = EventContext {
            object: "whatsapp_business_account",
            account_id: &account_id,
            entry_time: None,
            field: "flows",
        };
        let callback = handlers.flows.as_deref().unwrap();
        assert!(callback(&event, &FlowEvent::default()).is_ok());
    }

    #[test]
    fn recording_handlers_cover_every_slot() {
        let (handlers, _) = recording_handlers();
        assert_eq!(handlers.registered_slots().len(), 36);
    }

    #[test]
    fn sender_name_looks_up_contact() {
        let account_id = AccountId::new("1");
        let event = EventContext {
            object: "whatsapp_business_account",
            account_id: &account_id,
            entry_time: None,
            field: "messages",
        };
        let metadata = Metadata::default();
        let contacts = vec![Contact {
            wa_id: WaId::new("16505551234"),
            user_id: None,
            profile: Profile {
                name: "Sheena".to_string(),
            },
        }];
        let message = Message {
            from: WaId::new("16505551234"),
            id: MessageId::new("wamid.1"),
            timestamp: String::new(),
            context: None,
            referral: None,
            identity: None,
            errors: Vec::new(),
            content: MessageContent::RequestWelcome,
        };
        let ctx = MessageContext {
            event: &event,
            metadata: &metadata,
            contacts: &contacts,
            message: &message,
        };
        assert_eq!(ctx.sender_name(), Some("Sheena"));

        let stranger = Message {
            from: WaId::new("999"),
            ..message.clone()
        };
        let ctx = MessageContext {
            message: &stranger,
            ..ctx
        };
        assert_eq!(ctx.sender_name(), None);
    }

    #[test]
    fn abort_policy_returns_error() {
        let account_id = AccountId::new("1");
        let event = EventContext {
            object: "whatsapp_business_account",
            account_id: &account_id,
            entry_time: None,
            field: "flows",
        };
        let error = DispatchError::Handler {
            slot: "flows",
            source: anyhow::anyhow!("boom"),
        };

        assert!(ErrorPolicy::abort_on_error().decide(&event, error).is_err());
    }

    #[test]
    fn default_policy_continues() {
        let account_id = AccountId::new("1");
        let event = EventContext {
            object: "whatsapp_business_account",
            account_id: &account_id,
            entry_time: None,
            field: "flows",
        };
        let error = DispatchError::Handler {
            slot: "flows",
            source: anyhow::anyhow!("boom"),
        };

        assert!(ErrorPolicy::default().decide(&event, error).is_ok());
    }
}
