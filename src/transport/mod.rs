//! Outbound mail transports.
//!
//! A [`Transport`] performs one delivery of a composed [`OutgoingMessage`].
//! It is never driven concurrently by the email service; the delivery queue
//! serializes every call.

mod factory;
mod log;
mod smtp;

pub use factory::create_transport;
pub use self::log::LogTransport;
pub use smtp::{build_message, SmtpTransport};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::email::OutgoingMessage;

/// Transport-specific error type
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Invalid transport configuration: {0}")]
    Config(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// What the transport reported back for a delivered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Transport that accepted the message
    pub transport: &'static str,
    /// Server response or backend note
    pub response: String,
}

/// Delivers a single message
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError>;
}
