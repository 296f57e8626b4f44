//! SMTP delivery of notification mail.

use fillform_core::{MailTransport, OutgoingMail, TransportError};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Mailboxes};
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpSettings;

/// Unauthenticated, unencrypted SMTP to a local relay.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Self {
        let transport = SmtpTransport::builder_dangerous(settings.host.as_str())
            .port(settings.port)
            .build();
        SmtpMailer { transport }
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = build_message(mail)?;
        self.transport
            .send(&message)
            .map_err(|e| TransportError::new(format!("SMTP delivery failed: {e}")))?;
        Ok(())
    }
}

/// Build a plain-text message. `to` may list several comma-separated
/// addresses.
pub fn build_message(mail: &OutgoingMail) -> Result<Message, TransportError> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| TransportError::new(format!("invalid sender '{}': {e}", mail.from)))?;
    let recipients: Mailboxes = mail
        .to
        .parse()
        .map_err(|e| TransportError::new(format!("invalid recipient '{}': {e}", mail.to)))?;

    let mut builder = Message::builder()
        .from(from)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for recipient in recipients {
        builder = builder.to(recipient);
    }
    builder
        .body(mail.body.clone())
        .map_err(|e| TransportError::new(format!("cannot build message: {e}")))
}
