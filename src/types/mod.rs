//! Core identifier types shared across the crate.

pub mod ids;

pub use ids::{AccountId, MessageId, PhoneNumberId, WaId};
