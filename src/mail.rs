//! Plain-text mail with file attachments, sent over SMTP
//!
//! Scrapers use this to deliver their results, typically a CSV export
//! attached to a short summary.

use crate::config::{MailConfig, SmtpSecurity};
use crate::MailError;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as Email, Tokio1Executor};
use std::path::Path;

/// File attached to a [`Message`]
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub name: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// A mail being composed
#[derive(Debug, Clone)]
pub struct Message {
    sender: String,
    recipients: Vec<String>,
    subject: String,
    body: String,
    attachments: Vec<MailAttachment>,
}

impl Message {
    /// Creates a message with a plain-text body and no attachments
    ///
    /// # Arguments
    ///
    /// * `from` - Sender address, optionally with a display name
    /// * `to` - Recipient addresses
    /// * `subject` - Subject line
    /// * `body` - Plain-text body
    pub fn new(
        from: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: from.into(),
            recipients: to,
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    pub fn add_recipient(&mut self, address: impl Into<String>) {
        self.recipients.push(address.into());
    }

    /// Reads a file and attaches it under its file name
    ///
    /// The content type is guessed from the extension, falling back to
    /// `application/octet-stream`.
    pub fn attach(&mut self, path: &Path) -> Result<(), MailError> {
        let body = std::fs::read(path).map_err(|source| MailError::Attachment {
            path: path.display().to_string(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        tracing::debug!("Attached {} ({}, {} bytes)", name, content_type, body.len());

        self.attachments.push(MailAttachment {
            name,
            content_type,
            body,
        });
        Ok(())
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn attachments(&self) -> &[MailAttachment] {
        &self.attachments
    }

    /// Builds the MIME message
    ///
    /// The result is `multipart/mixed`: the text body first, then one
    /// base64-encoded part per attachment.
    pub fn to_email(&self) -> Result<Email, MailError> {
        let mut builder = Email::builder()
            .from(parse_mailbox(&self.sender)?)
            .subject(self.subject.clone());
        for recipient in &self.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(self.body.clone()));
        for attachment in &self.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|_| MailError::ContentType(attachment.content_type.clone()))?;
            let body = Body::new_with_encoding(
                attachment.body.clone(),
                ContentTransferEncoding::Base64,
            )
            .unwrap_or_else(Body::new);
            parts = parts
                .singlepart(Attachment::new(attachment.name.clone()).body(body, content_type));
        }

        Ok(builder.multipart(parts)?)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Builds the SMTP transport described by the configuration
pub fn build_transport(
    config: &MailConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    type Transport = AsyncSmtpTransport<Tokio1Executor>;

    let builder = match config.security {
        SmtpSecurity::Starttls => Transport::starttls_relay(&config.host)?,
        SmtpSecurity::Tls => Transport::relay(&config.host)?,
        SmtpSecurity::None => Transport::builder_dangerous(&config.host),
    };
    let builder = builder.port(config.port);

    let builder = match (&config.username, &config.password) {
        (Some(username), Some(password)) => {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        }
        _ => builder,
    };

    Ok(builder.build())
}

/// Sends a message through the configured SMTP server
///
/// # Arguments
///
/// * `config` - SMTP server settings
/// * `message` - The message to send
///
/// # Returns
///
/// * `Ok(())` - The server accepted the message
/// * `Err(MailError)` - The message could not be built or the server refused it
pub async fn send(config: &MailConfig, message: &Message) -> Result<(), MailError> {
    let email = message.to_email()?;
    let transport = build_transport(config)?;

    tracing::info!(
        "Sending \"{}\" to {} recipient(s) via {}:{}",
        message.subject(),
        message.recipients().len(),
        config.host,
        config.port
    );

    transport.send(email).await?;
    Ok(())
}
