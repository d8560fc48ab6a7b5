use thiserror::Error;

use crate::template::TemplateError;
use crate::transport::TransportError;

/// Errors of the email pipeline
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email configuration not found")]
    ConfigMissing,

    #[error("Invalid email configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Delivery queue is closed")]
    QueueClosed,
}

impl MailError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            MailError::ConfigMissing | MailError::InvalidConfig(_) => "config",
            MailError::Template(_) => "template",
            MailError::Transport(_) => "transport",
            MailError::QueueClosed => "queue",
        }
    }
}

/// Result type for email operations
pub type MailResult<T> = Result<T, MailError>;
