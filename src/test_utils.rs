//! Shared test fixtures: JSON payload builders and a recording handler set.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::webhooks::Handlers;

pub const ACCOUNT_ID: &str = "102290129340398";
pub const PHONE_NUMBER_ID: &str = "106540352242922";
pub const DISPLAY_PHONE_NUMBER: &str = "15550783881";
pub const CUSTOMER_WA_ID: &str = "16505551234";

pub fn to_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

/// A business-account notification with a single entry holding `changes`.
pub fn notification(changes: Vec<Value>) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": ACCOUNT_ID,
            "changes": changes
        }]
    })
}

/// A `messages` change carrying `messages` from a single customer.
pub fn messages_change(messages: Vec<Value>) -> Value {
    json!({
        "field": "messages",
        "value": {
            "messaging_product": "whatsapp",
            "metadata": {
                "display_phone_number": DISPLAY_PHONE_NUMBER,
                "phone_number_id": PHONE_NUMBER_ID
            },
            "contacts": [{
                "wa_id": CUSTOMER_WA_ID,
                "profile": {"name": "Sheena Nelson"}
            }],
            "messages": messages
        }
    })
}

/// A change with an arbitrary `field` and `value`.
pub fn business_change(field: &str, value: Value) -> Value {
    json!({"field": field, "value": value})
}

/// A message of `message_type` whose payload sits under the key of the same
/// name. A null `payload` omits the key.
pub fn message(id: &str, message_type: &str, payload: Value) -> Value {
    let mut msg = json!({
        "from": CUSTOMER_WA_ID,
        "id": id,
        "timestamp": "1750263773",
        "type": message_type
    });
    if !payload.is_null() {
        msg[message_type] = payload;
    }
    msg
}

pub fn text_message(id: &str, body: &str) -> Value {
    message(id, "text", json!({"body": body}))
}

/// Records the name of every slot invoked, in order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl Recorder {
    pub fn record(&self, slot: &'static str) {
        self.calls.lock().unwrap().push(slot);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

/// A handler set with every slot registered to a [`Recorder`].
pub fn recording_handlers() -> (Handlers, Recorder) {
    let recorder = Recorder::default();
    let mut handlers = Handlers::new();

    macro_rules! record {
        ($($setter:ident => $slot:literal),* $(,)?) => {
            $(
                let r = recorder.clone();
                handlers.$setter(move |_, _| {
                    r.record($slot);
                    Ok(())
                });
            )*
        };
    }
    macro_rules! record3 {
        ($($setter:ident => $slot:literal),* $(,)?) => {
            $(
                let r = recorder.clone();
                handlers.$setter(move |_, _, _| {
                    r.record($slot);
                    Ok(())
                });
            )*
        };
    }

    record! {
        on_account_alerts => "account_alerts",
        on_template_status => "template_status",
        on_template_category => "template_category",
        on_template_quality => "template_quality",
        on_phone_number_name => "phone_number_name",
        on_phone_number_quality => "phone_number_quality",
        on_account_update => "account_update",
        on_account_review => "account_review",
        on_business_capability => "business_capability",
        on_flows => "flows",
        on_notification_errors => "notification_errors",
        on_statuses => "statuses",
        on_user_preferences => "user_preferences",
        on_text => "text",
        on_image => "image",
        on_audio => "audio",
        on_video => "video",
        on_document => "document",
        on_sticker => "sticker",
        on_location => "location",
        on_contacts => "contacts",
        on_reaction => "reaction",
        on_button => "button",
        on_order => "order",
        on_system => "system",
        on_customer_identity_change => "customer_identity_change",
        on_button_reply => "button_reply",
        on_list_reply => "list_reply",
        on_flow_completion => "flow_completion",
        on_address_submission => "address_submission",
        on_interactive => "interactive",
        on_message_errors => "message_errors",
        on_unsupported => "unsupported",
        on_welcome => "welcome",
    }
    record3! {
        on_product_enquiry => "product_enquiry",
        on_referral => "referral",
    }

    (handlers, recorder)
}
