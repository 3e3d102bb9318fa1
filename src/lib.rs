//! WhatsApp Business webhooks - verify, decode and dispatch Cloud API deliveries.
//!
//! This library provides the delivery model, the dispatch tree that routes
//! each event to an application handler, and an axum server that hosts it.

pub mod config;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
