use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::{SearchResult, WatchedCourse};

/// SMTP credentials loaded from email.json. The file is optional; without it
/// the engine runs with email disabled rather than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub sender_email: String,
    pub sender_password: String,
}

impl EmailSettings {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read email settings from {}", path.display()))?;
        let settings = serde_json::from_str(&contents)
            .with_context(|| format!("invalid email settings in {}", path.display()))?;
        Ok(Some(settings))
    }
}

/// Outbound alert channel. `Ok(true)` means the message was handed to the
/// transport; `Ok(false)` means sending was skipped (unconfigured) or the
/// transport refused it. Only `Ok(true)` may be recorded as a notification.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_alert(&self, course: &WatchedCourse, result: &SearchResult) -> Result<bool>;
}

pub struct SmtpMailer {
    settings: Option<EmailSettings>,
}

impl SmtpMailer {
    pub fn new(settings: Option<EmailSettings>) -> Self {
        if settings.is_none() {
            info!("No email settings found; email notifications disabled");
        }
        Self { settings }
    }

    pub fn from_file(path: &Path) -> Self {
        match EmailSettings::load(path) {
            Ok(settings) => Self::new(settings),
            Err(err) => {
                warn!("Failed to load email settings: {err:#}; email disabled");
                Self::new(None)
            }
        }
    }
}

fn alert_body(course: &WatchedCourse, result: &SearchResult) -> String {
    let mut sections_html = String::new();
    for section in result.sections.iter().take(10) {
        if section.available > 0 {
            sections_html.push_str(&format!(
                "<li>{}/{} seats</li>\n",
                section.available, section.total
            ));
        }
    }

    format!(
        "<html><body>\
         <h2>Seatwatch Alert</h2>\
         <p><strong>{}</strong> has seats available!</p>\
         <ul>{}</ul>\
         <p><strong>Total: {} seats</strong></p>\
         </body></html>",
        course.label(),
        sections_html,
        result.total_available,
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_alert(&self, course: &WatchedCourse, result: &SearchResult) -> Result<bool> {
        let Some(settings) = self.settings.clone() else {
            info!("Email skipped for {} (no email settings)", course.label());
            return Ok(false);
        };

        let subject = format!("{} - Seats Available!", course.label());
        let body = alert_body(course, result);
        let recipient = course.email.clone();
        let label = course.label();

        // lettre's SMTP transport is blocking; run it off the scheduler
        // thread the same way other blocking work is handled.
        let sent = tokio::task::spawn_blocking(move || -> Result<bool> {
            let message = Message::builder()
                .from(settings.sender_email.parse().context("invalid sender address")?)
                .to(recipient.parse().context("invalid recipient address")?)
                .subject(subject)
                .header(ContentType::TEXT_HTML)
                .body(body)
                .context("failed to build email message")?;

            let transport = SmtpTransport::relay(&settings.smtp_host)
                .context("failed to configure SMTP relay")?
                .credentials(Credentials::new(
                    settings.sender_email,
                    settings.sender_password,
                ))
                .build();

            transport.send(&message).context("SMTP send failed")?;
            Ok(true)
        })
        .await
        .context("email worker join failed")??;

        if sent {
            info!("Email sent for {label}");
        }
        Ok(sent)
    }
}
