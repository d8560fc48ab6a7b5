//! Email composition and delivery.
//!
//! [`EmailService`] is the entry point: it owns the [`MessageComposer`], the
//! transport and a width-one delivery queue, and turns each [`SendRequest`]
//! into a retried, serialized delivery.

mod composer;
mod error;
mod heading;
mod service;
mod types;

pub use composer::MessageComposer;
pub use error::{MailError, MailResult};
pub use heading::{parse_heading, Heading};
pub use service::{DeliveryOutcome, DeliveryReport, EmailService, EmailServiceBuilder};
pub use types::{Alternative, OutgoingMessage, SendRequest, MARKDOWN_CONTENT_TYPE};
