//! Transport factory

use std::sync::Arc;

use crate::config::TransportConfig;

use super::log::LogTransport;
use super::smtp::SmtpTransport;
use super::{Transport, TransportError};

/// Create a transport based on configuration.
///
/// Returns the implementation selected by the `backend` setting:
/// - `"smtp"` (default): an `SmtpTransport` for the configured relay
/// - `"log"`: a `LogTransport` that only logs messages
///
/// Any other value is a configuration error.
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    match config.backend.as_str() {
        "smtp" => {
            tracing::info!(backend = "smtp", "Creating SMTP transport");
            Ok(Arc::new(SmtpTransport::new(config)?))
        }
        "log" => {
            tracing::warn!(
                backend = "log",
                "Creating log transport; messages will be logged and never delivered"
            );
            Ok(Arc::new(LogTransport))
        }
        other => Err(TransportError::Config(format!(
            "unknown transport backend: {}",
            other
        ))),
    }
}
