//! SMTP transport backed by lettre

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpSecurity, TransportConfig};
use crate::email::OutgoingMessage;

use super::{DeliveryReceipt, Transport, TransportError};

/// Sends mail through an SMTP relay
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpTransport {
    /// Build the relay client. No connection is opened until the first send.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let relay_error = |e: lettre::transport::smtp::Error| TransportError::Config(e.to_string());

        let mut builder = match config.security {
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(relay_error)?
            }
            SmtpSecurity::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(relay_error)?
            }
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            }
        };

        builder = builder.timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(
            host = %config.host,
            port = ?config.port,
            security = ?config.security,
            authenticated = config.username.is_some(),
            "SMTP transport configured"
        );

        Ok(Self {
            mailer: builder.build(),
            host: config.host.clone(),
        })
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError> {
        let email = build_message(message)?;

        let response = self
            .mailer
            .send(email)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        let detail = response.message().collect::<Vec<_>>().join(" ");
        tracing::debug!(host = %self.host, code = %response.code(), "SMTP relay accepted message");

        Ok(DeliveryReceipt {
            transport: self.name(),
            response: format!("{} {}", response.code(), detail).trim().to_string(),
        })
    }
}

/// Convert a composed message into a MIME message.
///
/// Bodies become a `multipart/alternative` ordered from least to most
/// preferred: plain text, each extra alternative, then HTML. A single body is
/// sent as a plain single part.
pub fn build_message(message: &OutgoingMessage) -> Result<Message, TransportError> {
    let mut builder = Message::builder().from(parse_mailbox(&message.from)?);

    for to in &message.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &message.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    for bcc in &message.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }
    if let Some(subject) = &message.subject {
        builder = builder.subject(subject.clone());
    }

    for (name, value) in &message.headers {
        let header_name = HeaderName::new_from_ascii(name.clone())
            .map_err(|e| TransportError::Build(format!("invalid header {}: {}", name, e)))?;
        builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
    }

    let mut parts = Vec::with_capacity(message.alternatives.len() + 2);
    if let Some(text) = &message.text {
        parts.push(SinglePart::plain(text.clone()));
    }
    for alternative in &message.alternatives {
        let content_type = ContentType::parse(&format!(
            "{}; charset=utf-8",
            alternative.content_type
        ))
        .map_err(|e| {
            TransportError::Build(format!(
                "invalid content type {}: {}",
                alternative.content_type, e
            ))
        })?;
        parts.push(
            SinglePart::builder()
                .header(content_type)
                .body(alternative.content.clone()),
        );
    }
    if let Some(html) = &message.html {
        parts.push(SinglePart::html(html.clone()));
    }

    let build_error = |e: lettre::error::Error| TransportError::Build(e.to_string());
    let mut parts = parts.into_iter();

    let Some(first) = parts.next() else {
        return builder.body(String::new()).map_err(build_error);
    };
    let Some(second) = parts.next() else {
        return builder.singlepart(first).map_err(build_error);
    };

    let body = parts.fold(
        MultiPart::alternative().singlepart(first).singlepart(second),
        |multipart, part| multipart.singlepart(part),
    );

    builder.multipart(body).map_err(build_error)
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
