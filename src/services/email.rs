//! Email delivery of the daily valet report

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

/// Implicit-TLS submission port; any other port negotiates STARTTLS when TLS is on
const SMTPS_PORT: u16 = 465;

/// Sends the nightly report to the manager
#[async_trait]
pub trait ReportMailer: Send + Sync {
    /// Whether a relay and a recipient are both configured
    fn is_configured(&self) -> bool;

    async fn send_daily_report(&self, date: NaiveDate, html: &str, csv: &str) -> AppResult<()>;
}

pub fn report_subject(date: NaiveDate) -> String {
    format!("Valet Daily Report {}", date.format("%Y-%m-%d"))
}

pub fn report_attachment_name(date: NaiveDate) -> String {
    format!("valet-report-{}.csv", date.format("%Y-%m-%d"))
}

#[derive(Clone)]
pub struct SmtpReportMailer {
    config: EmailConfig,
}

impl SmtpReportMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// HTML body with the CSV attached
    fn build_message(&self, date: NaiveDate, html: &str, csv: &str) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Valet Reports");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(&self.config.manager_email)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let csv_type = ContentType::parse("text/csv; charset=utf-8")
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(report_subject(date))
            .multipart(
                MultiPart::mixed()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    )
                    .singlepart(
                        Attachment::new(report_attachment_name(date)).body(csv.to_string(), csv_type),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_port == SMTPS_PORT {
            SmtpTransport::relay(&self.config.smtp_host)
                .map_err(|e| AppError::Upstream(format!("Failed to create SMTP transport: {}", e)))?
        } else if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Upstream(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl ReportMailer for SmtpReportMailer {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn send_daily_report(&self, date: NaiveDate, html: &str, csv: &str) -> AppResult<()> {
        let email = self.build_message(date, html, csv)?;
        let mailer = self.transport()?;

        // lettre's SMTP transport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Mail task failed: {}", e)))?
            .map_err(|e| AppError::Upstream(format!("Failed to send email: {}", e)))?;

        tracing::info!(date = %date, "Daily report emailed");
        Ok(())
    }
}
