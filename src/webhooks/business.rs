//! Business-account event payloads.
//!
//! Every non-`messages` field carries one of these detail structs. They are
//! plain data: missing string fields default to empty so that additions and
//! omissions on the platform side don't break decoding.

use serde::{Deserialize, Serialize};

use crate::types::WaId;

use super::events::{Contact, Metadata};

/// `account_alerts`: an alert raised against the business account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountAlert {
    pub entity_type: String,
    pub entity_id: String,
    pub alert_info: AlertInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertInfo {
    pub alert_severity: String,
    pub alert_status: String,
    pub alert_type: String,
    pub alert_description: String,
}

/// `message_template_status_update`: a template was approved, rejected,
/// paused, disabled, ...
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateStatusUpdate {
    pub event: String,
    pub message_template_id: u64,
    pub message_template_name: String,
    pub message_template_language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_info: Option<TemplateOtherInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_info: Option<TemplateDisableInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOtherInfo {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateDisableInfo {
    pub disable_date: String,
}

/// `message_template_category_update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateCategoryUpdate {
    pub message_template_id: u64,
    pub message_template_name: String,
    pub message_template_language: String,
    pub previous_category: String,
    pub new_category: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_category: Option<String>,
}

/// `message_template_quality_update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateQualityUpdate {
    pub previous_quality_score: String,
    pub new_quality_score: String,
    pub message_template_id: u64,
    pub message_template_name: String,
    pub message_template_language: String,
}

/// `phone_number_name_update`: outcome of a display-name review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneNumberNameUpdate {
    pub display_phone_number: String,
    pub decision: String,
    pub requested_verified_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// `phone_number_quality_update`: messaging-limit tier changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneNumberQualityUpdate {
    pub display_phone_number: String,
    pub event: String,
    pub current_limit: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_limit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_daily_conversation_per_phone: Option<u64>,
}

/// `account_update`: verification, bans, restrictions and policy
/// violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountUpdate {
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_info: Option<BanInfo>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub restriction_info: Vec<RestrictionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_info: Option<ViolationInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanInfo {
    pub waba_ban_state: String,
    pub waba_ban_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictionInfo {
    pub restriction_type: String,
    pub expiration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationInfo {
    pub violation_type: String,
}

/// `account_review_update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountReviewUpdate {
    pub decision: String,
}

/// `business_capability_update`: new messaging or phone-number limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessCapabilityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_daily_conversation_per_phone: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_phone_numbers_per_business: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_phone_numbers_per_waba: Option<u64>,
}

/// `flows`: status changes and health alerts for a published flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowEvent {
    pub event: String,
    pub flow_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// The value of a `user_preferences` change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferencesValue {
    pub messaging_product: String,
    pub metadata: Metadata,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,

    pub user_preferences: Vec<UserPreference>,
}

/// A customer opting in or out of a message category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub wa_id: WaId,

    #[serde(default)]
    pub detail: String,

    /// E.g. `marketing_messages`.
    #[serde(default)]
    pub category: String,

    /// E.g. `stop` or `resume`.
    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub timestamp: i64,
}
