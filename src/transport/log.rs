//! Development transport that only logs what it would send

use async_trait::async_trait;

use crate::email::OutgoingMessage;

use super::{DeliveryReceipt, Transport, TransportError};

/// Accepts every message and writes a summary to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError> {
        tracing::info!(
            from = %message.from,
            to = %message.to.join(", "),
            subject = ?message.subject,
            text_bytes = message.text.as_ref().map(|t| t.len()).unwrap_or(0),
            html_bytes = message.html.as_ref().map(|h| h.len()).unwrap_or(0),
            alternatives = message.alternatives.len(),
            "Email accepted by log transport"
        );

        Ok(DeliveryReceipt {
            transport: self.name(),
            response: "logged".to_string(),
        })
    }
}
