//! The dispatch tree.
//!
//! [`Handlers::dispatch`] walks a decoded [`Notification`] and hands every
//! item to the slot for its category:
//!
//! 1. Each change is routed by its `field`. Business events go to the slot
//!    of the same name; unrecognized fields are skipped.
//! 2. A `messages` value is processed as errors, then statuses, then each
//!    message in order.
//! 3. Each message is routed by its `type`, and interactive replies by their
//!    own `type`.
//!
//! Handler failures go through the registry's
//! [`ErrorPolicy`](super::ErrorPolicy), as do messages that are malformed or
//! cannot be routed. If the policy continues, dispatch moves to the next item
//! at the same level; if it aborts, dispatch stops and returns the error.
//!
//! # Text precedence
//!
//! A text message asking about a catalog product (`context.referred_product`)
//! goes to `product_enquiry`. Otherwise one with a `referral` goes to
//! `referral`. Anything else goes to `text`.
//!
//! # Untyped messages
//!
//! Some older deliveries omit `type`. Such a message is routed by whichever
//! payload it carries: `contacts`, then `location`, then `identity`. With
//! none of them it is a [`DispatchError::UnrecognizedMessage`].

use thiserror::Error;
use tracing::{debug, trace};

use crate::types::MessageId;

use super::business::UserPreferencesValue;
use super::events::{Change, MessagesValue, Notification};
use super::handlers::{EventContext, HandlerResult, Handlers, MessageContext, ValueContext};
use super::messages::{Interactive, Media, MediaKind, Message, MessageContent, Text};

/// Failures during dispatch. These are what the error policy sees.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A registered callback returned an error.
    #[error("{slot} handler failed: {source:#}")]
    Handler {
        slot: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A message had no usable `type` and no legacy payload to route by.
    #[error(
        "unrecognized message type {} for message {message_id}",
        message_type.as_deref().unwrap_or("<none>")
    )]
    UnrecognizedMessage {
        message_id: MessageId,
        message_type: Option<String>,
    },

    /// A message could not be decoded into the shape its `type` requires.
    #[error(
        "malformed {} message {message_id}: {reason}",
        message_type.as_deref().unwrap_or("untyped")
    )]
    MalformedMessage {
        message_id: MessageId,
        message_type: Option<String>,
        reason: String,
    },
}

/// Counts from one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Callbacks invoked.
    pub invoked: usize,

    /// Items whose slot had no callback.
    pub unhandled: usize,

    /// Changes with an unrecognized `field`.
    pub ignored_changes: usize,

    /// Errors the policy chose to continue past.
    pub suppressed_errors: usize,
}

impl Handlers {
    /// Routes every item of `notification` to its slot.
    ///
    /// Returns the first error the error policy refused to continue past.
    pub fn dispatch(&self, notification: &Notification) -> Result<DispatchSummary, DispatchError> {
        let mut run = Dispatch {
            handlers: self,
            summary: DispatchSummary::default(),
        };

        for entry in &notification.entries {
            for change in &entry.changes {
                let event = EventContext {
                    object: &notification.object,
                    account_id: &entry.id,
                    entry_time: entry.time,
                    field: change.field(),
                };
                debug!(account_id = %entry.id, field = event.field, "Dispatching change");
                run.change(&event, change)?;
            }
        }

        Ok(run.summary)
    }
}

struct Dispatch<'h> {
    handlers: &'h Handlers,
    summary: DispatchSummary,
}

impl Dispatch<'_> {
    /// Calls `handler` if the slot is filled, settling any failure through
    /// the error policy.
    fn invoke<F: ?Sized>(
        &mut self,
        event: &EventContext<'_>,
        slot: &'static str,
        handler: Option<&F>,
        call: impl FnOnce(&F) -> HandlerResult,
    ) -> Result<(), DispatchError> {
        let Some(handler) = handler else {
            trace!(slot, "No handler registered");
            self.summary.unhandled += 1;
            return Ok(());
        };

        self.summary.invoked += 1;
        match call(handler) {
            Ok(()) => Ok(()),
            Err(source) => self.settle(event, DispatchError::Handler { slot, source }),
        }
    }

    fn settle(
        &mut self,
        event: &EventContext<'_>,
        error: DispatchError,
    ) -> Result<(), DispatchError> {
        self.handlers.error_policy.decide(event, error)?;
        self.summary.suppressed_errors += 1;
        Ok(())
    }

    fn change(&mut self, event: &EventContext<'_>, change: &Change) -> Result<(), DispatchError> {
        let h = self.handlers;
        match change {
            Change::Messages(value) => self.messages(event, value),
            Change::AccountAlerts(v) => {
                self.invoke(event, "account_alerts", h.account_alerts.as_deref(), |f| f(event, v))
            }
            Change::TemplateStatusUpdate(v) => {
                self.invoke(event, "template_status", h.template_status.as_deref(), |f| f(event, v))
            }
            Change::TemplateCategoryUpdate(v) => self.invoke(
                event,
                "template_category",
                h.template_category.as_deref(),
                |f| f(event, v),
            ),
            Change::TemplateQualityUpdate(v) => self.invoke(
                event,
                "template_quality",
                h.template_quality.as_deref(),
                |f| f(event, v),
            ),
            Change::PhoneNumberNameUpdate(v) => self.invoke(
                event,
                "phone_number_name",
                h.phone_number_name.as_deref(),
                |f| f(event, v),
            ),
            Change::PhoneNumberQualityUpdate(v) => self.invoke(
                event,
                "phone_number_quality",
                h.phone_number_quality.as_deref(),
                |f| f(event, v),
            ),
            Change::AccountUpdate(v) => {
                self.invoke(event, "account_update", h.account_update.as_deref(), |f| f(event, v))
            }
            Change::AccountReviewUpdate(v) => {
                self.invoke(event, "account_review", h.account_review.as_deref(), |f| f(event, v))
            }
            Change::BusinessCapabilityUpdate(v) => self.invoke(
                event,
                "business_capability",
                h.business_capability.as_deref(),
                |f| f(event, v),
            ),
            Change::Flows(v) => self.invoke(event, "flows", h.flows.as_deref(), |f| f(event, v)),
            Change::UserPreferences(value) => self.user_preferences(event, value),
            Change::Unrecognized { field, .. } => {
                debug!(field = %field, "Ignoring unrecognized change field");
                self.summary.ignored_changes += 1;
                Ok(())
            }
        }
    }

    fn user_preferences(
        &mut self,
        event: &EventContext<'_>,
        value: &UserPreferencesValue,
    ) -> Result<(), DispatchError> {
        let h = self.handlers;
        let ctx = ValueContext {
            event,
            messaging_product: &value.messaging_product,
            metadata: &value.metadata,
            contacts: &value.contacts,
        };
        self.invoke(event, "user_preferences", h.user_preferences.as_deref(), |f| {
            f(&ctx, value.user_preferences.as_slice())
        })
    }

    fn messages(
        &mut self,
        event: &EventContext<'_>,
        value: &MessagesValue,
    ) -> Result<(), DispatchError> {
        let h = self.handlers;
        let ctx = ValueContext {
            event,
            messaging_product: &value.messaging_product,
            metadata: &value.metadata,
            contacts: &value.contacts,
        };

        if !value.errors.is_empty() {
            self.invoke(
                event,
                "notification_errors",
                h.notification_errors.as_deref(),
                |f| f(&ctx, value.errors.as_slice()),
            )?;
        }

        if !value.statuses.is_empty() {
            self.invoke(event, "statuses", h.statuses.as_deref(), |f| {
                f(&ctx, value.statuses.as_slice())
            })?;
        }

        for message in &value.messages {
            self.message(&ctx, message)?;
        }

        Ok(())
    }

    fn message(
        &mut self,
        value: &ValueContext<'_>,
        message: &Message,
    ) -> Result<(), DispatchError> {
        let h = self.handlers;
        let event = value.event;
        let ctx = MessageContext {
            event,
            metadata: value.metadata,
            contacts: value.contacts,
            message,
        };

        debug!(
            message_id = message.id.short(),
            message_type = message.message_type().unwrap_or("<none>"),
            "Dispatching message"
        );

        match &message.content {
            MessageContent::Text(text) => self.text(&ctx, text),
            MessageContent::Media { kind, media } => self.media(&ctx, *kind, media),
            MessageContent::Location(location) => {
                self.invoke(event, "location", h.location.as_deref(), |f| f(&ctx, location))
            }
            MessageContent::Contacts(cards) => {
                self.invoke(event, "contacts", h.contacts.as_deref(), |f| f(&ctx, cards.as_slice()))
            }
            MessageContent::Reaction(reaction) => {
                self.invoke(event, "reaction", h.reaction.as_deref(), |f| f(&ctx, reaction))
            }
            MessageContent::Button(button) => {
                self.invoke(event, "button", h.button.as_deref(), |f| f(&ctx, button))
            }
            MessageContent::Order(order) => {
                self.invoke(event, "order", h.order.as_deref(), |f| f(&ctx, order))
            }
            MessageContent::System(system) => {
                self.invoke(event, "system", h.system.as_deref(), |f| f(&ctx, system))
            }
            MessageContent::Interactive(interactive) => self.interactive(&ctx, interactive),
            MessageContent::Unknown => {
                self.invoke(event, "message_errors", h.message_errors.as_deref(), |f| {
                    f(&ctx, message.errors.as_slice())
                })
            }
            MessageContent::Unsupported => {
                self.invoke(event, "unsupported", h.unsupported.as_deref(), |f| {
                    f(&ctx, message.errors.as_slice())
                })
            }
            MessageContent::RequestWelcome => {
                self.invoke(event, "welcome", h.welcome.as_deref(), |f| f(&ctx, message))
            }
            MessageContent::Malformed {
                message_type,
                reason,
                ..
            } => {
                let error = DispatchError::MalformedMessage {
                    message_id: message.id.clone(),
                    message_type: message_type.clone(),
                    reason: reason.clone(),
                };
                self.settle(event, error)
            }
            MessageContent::Unclassified {
                message_type,
                contacts,
                location,
                ..
            } => {
                // Presence-based inference for deliveries that predate `type`
                if let Some(cards) = contacts.as_deref().filter(|c| !c.is_empty()) {
                    self.invoke(event, "contacts", h.contacts.as_deref(), |f| f(&ctx, cards))
                } else if let Some(location) = location {
                    self.invoke(event, "location", h.location.as_deref(), |f| f(&ctx, location))
                } else if let Some(identity) = &message.identity {
                    self.invoke(
                        event,
                        "customer_identity_change",
                        h.customer_identity_change.as_deref(),
                        |f| f(&ctx, identity),
                    )
                } else {
                    let error = DispatchError::UnrecognizedMessage {
                        message_id: message.id.clone(),
                        message_type: message_type.clone(),
                    };
                    self.settle(event, error)
                }
            }
        }
    }

    fn text(&mut self, ctx: &MessageContext<'_>, text: &Text) -> Result<(), DispatchError> {
        let h = self.handlers;
        let event = ctx.event;
        let message = ctx.message;

        let referred_product = message
            .context
            .as_ref()
            .and_then(|c| c.referred_product.as_ref());

        if let Some(product) = referred_product {
            self.invoke(event, "product_enquiry", h.product_enquiry.as_deref(), |f| {
                f(ctx, text, product)
            })
        } else if let Some(referral) = &message.referral {
            self.invoke(event, "referral", h.referral.as_deref(), |f| {
                f(ctx, text, referral)
            })
        } else {
            self.invoke(event, "text", h.text.as_deref(), |f| f(ctx, text))
        }
    }

    fn media(
        &mut self,
        ctx: &MessageContext<'_>,
        kind: MediaKind,
        media: &Media,
    ) -> Result<(), DispatchError> {
        let h = self.handlers;
        let (slot, handler) = match kind {
            MediaKind::Image => ("image", h.image.as_deref()),
            MediaKind::Audio => ("audio", h.audio.as_deref()),
            MediaKind::Video => ("video", h.video.as_deref()),
            MediaKind::Document => ("document", h.document.as_deref()),
            MediaKind::Sticker => ("sticker", h.sticker.as_deref()),
        };
        self.invoke(ctx.event, slot, handler, |f| f(ctx, media))
    }

    fn interactive(
        &mut self,
        ctx: &MessageContext<'_>,
        interactive: &Interactive,
    ) -> Result<(), DispatchError> {
        let h = self.handlers;
        let event = ctx.event;
        match interactive {
            Interactive::ButtonReply(reply) => {
                self.invoke(event, "button_reply", h.button_reply.as_deref(), |f| f(ctx, reply))
            }
            Interactive::ListReply(reply) => {
                self.invoke(event, "list_reply", h.list_reply.as_deref(), |f| f(ctx, reply))
            }
            Interactive::FlowCompletion(reply) => self.invoke(
                event,
                "flow_completion",
                h.flow_completion.as_deref(),
                |f| f(ctx, reply),
            ),
            Interactive::AddressSubmission(reply) => self.invoke(
                event,
                "address_submission",
                h.address_submission.as_deref(),
                |f| f(ctx, reply),
            ),
            Interactive::Other { .. } => self.invoke(
                event,
                "interactive",
                h.interactive.as_deref(),
                |f| f(ctx, interactive),
            ),
        }
    }
}
