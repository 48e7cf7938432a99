//! Summary notifications for newly found listings.

use crate::config::{EmailSettings, NotificationConfig};
use crate::error::{Result, ScanError};
use crate::models::Listing;
use async_trait::async_trait;
use chrono::Local;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Write;
use tracing::{error, info, warn};

/// Listings printed when email delivery fails
const CONSOLE_LIMIT: usize = 5;

/// One message covering every listing from a run
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub subject: String,
    pub body: String,
}

impl Digest {
    pub fn new(listings: &[Listing]) -> Self {
        let subject = format!(
            "New Properties Found: {} at {}",
            listings.len(),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let mut body = String::from("New properties found:\n\n");
        for listing in listings {
            let _ = writeln!(
                body,
                "{} - {} - {} - [{}]",
                listing.title, listing.price_text, listing.address, listing.source
            );
            let _ = writeln!(body, "Link: {}\n", listing.link);
        }

        Self { subject, body }
    }
}

/// Outbound channel for a digest
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, digest: &Digest) -> Result<()>;
}

/// Delivers digests over implicit-TLS SMTP
pub struct SmtpMailer {
    settings: EmailSettings,
}

impl SmtpMailer {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    fn message(&self, digest: &Digest) -> Result<Message> {
        let mailbox = |addr: &str, role: &str| -> Result<Mailbox> {
            addr.parse()
                .map_err(|e| ScanError::Notification(format!("Bad {role} address {addr}: {e}")))
        };

        Message::builder()
            .from(mailbox(&self.settings.sender, "sender")?)
            .to(mailbox(&self.settings.recipient, "recipient")?)
            .subject(&digest.subject)
            .body(digest.body.clone())
            .map_err(|e| ScanError::Notification(format!("Failed to build message: {e}")))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let message = self.message(digest)?;
        let creds = Credentials::new(self.settings.username.clone(), self.settings.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.smtp_server)
            .map_err(|e| ScanError::Notification(format!("SMTP relay error: {e}")))?
            .port(self.settings.smtp_port)
            .credentials(creds)
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| ScanError::Notification(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}

/// How a notification ended up reaching the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Emailed,
    Console,
}

/// Sends the run summary, falling back to stdout when email isn't possible
pub struct Notifier {
    transport: Option<Box<dyn MailTransport>>,
}

impl Notifier {
    pub fn new(transport: Option<Box<dyn MailTransport>>) -> Self {
        Self { transport }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        let transport = config
            .email
            .clone()
            .map(|settings| Box::new(SmtpMailer::new(settings)) as Box<dyn MailTransport>);
        Self::new(transport)
    }

    pub async fn notify(&self, listings: &[Listing]) -> Delivery {
        let result = match &self.transport {
            Some(transport) => transport.send(&Digest::new(listings)).await,
            None => Err(ScanError::Notification("No email configuration found".to_string())),
        };

        match result {
            Ok(()) => {
                info!("Email notification sent for {} listings", listings.len());
                Delivery::Emailed
            }
            Err(e) => {
                match &e {
                    ScanError::Notification(reason) if self.transport.is_none() => warn!("{reason}"),
                    _ => error!("{e}"),
                }
                info!("Printing listings:");
                print!("{}", console_summary(listings));
                Delivery::Console
            }
        }
    }
}

/// The first few listings plus a count of the rest
pub fn console_summary(listings: &[Listing]) -> String {
    let mut out = String::new();
    for listing in listings.iter().take(CONSOLE_LIMIT) {
        let _ = writeln!(out, "{} - {} - {}", listing.title, listing.price_text, listing.address);
        let _ = writeln!(out, "Link: {}\n", listing.link);
    }
    if listings.len() > CONSOLE_LIMIT {
        let _ = writeln!(out, "... and {} more listings", listings.len() - CONSOLE_LIMIT);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use std::sync::{Arc, Mutex};

    fn listings(n: usize) -> Vec<Listing> {
        (0..n)
            .map(|i| {
                let mut l = Listing::new(Source::Zoopla, &i.to_string());
                l.title = format!("Flat {i}");
                l.price_text = "£900 pcm".to_string();
                l.address = "Bristol".to_string();
                l.link = format!("https://www.zoopla.co.uk/to-rent/details/{i}/");
                l
            })
            .collect()
    }

    struct Recording(Arc<Mutex<Vec<Digest>>>);

    #[async_trait]
    impl MailTransport for Recording {
        async fn send(&self, digest: &Digest) -> Result<()> {
            self.0.lock().unwrap().push(digest.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MailTransport for Failing {
        async fn send(&self, _digest: &Digest) -> Result<()> {
            Err(ScanError::Notification("connection refused".to_string()))
        }
    }

    #[test]
    fn digest_lists_every_listing() {
        let digest = Digest::new(&listings(2));
        assert!(digest.subject.starts_with("New Properties Found: 2 at "));
        assert!(digest.body.contains("Flat 0 - £900 pcm - Bristol - [zoopla]"));
        assert!(digest.body.contains("Link: https://www.zoopla.co.uk/to-rent/details/1/"));
    }

    #[test]
    fn console_summary_caps_at_five() {
        let summary = console_summary(&listings(8));
        assert!(summary.contains("Flat 4"));
        assert!(!summary.contains("Flat 5"));
        assert!(summary.ends_with("... and 3 more listings\n"));
    }

    #[test]
    fn console_summary_without_overflow_line() {
        let summary = console_summary(&listings(2));
        assert!(!summary.contains("more listings"));
    }

    #[tokio::test]
    async fn sends_through_transport() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(Some(Box::new(Recording(sent.clone()))));
        assert_eq!(notifier.notify(&listings(3)).await, Delivery::Emailed);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_console_on_failure() {
        let notifier = Notifier::new(Some(Box::new(Failing)));
        assert_eq!(notifier.notify(&listings(3)).await, Delivery::Console);
    }

    #[tokio::test]
    async fn falls_back_to_console_without_email_settings() {
        let notifier = Notifier::from_config(&NotificationConfig::default());
        assert_eq!(notifier.notify(&listings(1)).await, Delivery::Console);
    }

    #[test]
    fn rejects_bad_addresses() {
        let mailer = SmtpMailer::new(EmailSettings {
            sender: "not an address".to_string(),
            recipient: "me@example.com".to_string(),
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 465,
            username: "u".to_string(),
            password: "p".to_string(),
        });
        let err = mailer.message(&Digest::new(&listings(1))).unwrap_err();
        assert!(matches!(err, ScanError::Notification(_)));
    }
}
