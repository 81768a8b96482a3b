//! Invoice payment reminders.
//!
//! Delivery is webhook-first: when a webhook URL is configured it is
//! tried before SMTP, and the first channel that succeeds wins. The
//! reminder fails only when every configured channel fails.

use crate::config::{ReminderConfig, SmtpConfig};
use crate::models::{Customer, Invoice};
use crate::services::metrics::REMINDERS_TOTAL;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use service_core::error::AppError;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Webhook payload for a reminder request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReminderWebhookPayload<'a> {
    invoice_id: Uuid,
    invoice_number: &'a str,
    company_id: Uuid,
    requested_by: Uuid,
    status: &'a str,
}

/// Which channel ultimately delivered the reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderChannel {
    Webhook,
    Email,
}

impl ReminderChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderChannel::Webhook => "webhook",
            ReminderChannel::Email => "email",
        }
    }
}

#[derive(Clone)]
pub struct ReminderService {
    config: ReminderConfig,
    http: reqwest::Client,
    smtp: Option<SmtpChannel>,
}

#[derive(Clone)]
struct SmtpChannel {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl ReminderService {
    pub fn new(config: ReminderConfig, smtp_config: SmtpConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        let smtp = if smtp_config.enabled {
            let creds = Credentials::new(smtp_config.user.clone(), smtp_config.password.clone());
            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_config.host)
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e))
                })?
                .port(smtp_config.port)
                .credentials(creds)
                .build();
            Some(SmtpChannel {
                config: smtp_config,
                transport,
            })
        } else {
            None
        };

        Ok(Self { config, http, smtp })
    }

    /// Send a reminder for the invoice, trying the webhook first and
    /// falling back to email. Returns the channel that delivered it.
    pub async fn send_reminder(
        &self,
        invoice: &Invoice,
        customer: &Customer,
        requested_by: Uuid,
    ) -> Result<ReminderChannel, AppError> {
        let mut webhook_error: Option<String> = None;

        if self.config.webhook_url.is_some() {
            match self.send_webhook(invoice, requested_by).await {
                Ok(()) => {
                    REMINDERS_TOTAL
                        .with_label_values(&["webhook", "success"])
                        .inc();
                    info!(invoice_id = %invoice.id, "Reminder delivered via webhook");
                    return Ok(ReminderChannel::Webhook);
                }
                Err(e) => {
                    REMINDERS_TOTAL
                        .with_label_values(&["webhook", "failure"])
                        .inc();
                    warn!(invoice_id = %invoice.id, error = %e, "Reminder webhook failed");
                    webhook_error = Some(e.to_string());
                }
            }
        }

        if self.smtp.is_some() {
            match self.send_email(invoice, customer).await {
                Ok(()) => {
                    REMINDERS_TOTAL
                        .with_label_values(&["email", "success"])
                        .inc();
                    info!(invoice_id = %invoice.id, "Reminder delivered via email");
                    return Ok(ReminderChannel::Email);
                }
                Err(e) => {
                    REMINDERS_TOTAL
                        .with_label_values(&["email", "failure"])
                        .inc();
                    warn!(invoice_id = %invoice.id, error = %e, "Reminder email failed");
                    return Err(AppError::BadGateway(format!(
                        "Reminder delivery failed on all channels: {}",
                        e
                    )));
                }
            }
        }

        match webhook_error {
            Some(e) => Err(AppError::BadGateway(format!(
                "Reminder delivery failed on all channels: {}",
                e
            ))),
            None => Err(AppError::BadGateway(
                "No reminder channel is configured".to_string(),
            )),
        }
    }

    async fn send_webhook(&self, invoice: &Invoice, requested_by: Uuid) -> Result<(), AppError> {
        let url = self
            .config
            .webhook_url
            .as_ref()
            .ok_or_else(|| AppError::BadGateway("Reminder webhook not configured".to_string()))?;

        let payload = ReminderWebhookPayload {
            invoice_id: invoice.id,
            invoice_number: &invoice.invoice_number,
            company_id: invoice.company_id,
            requested_by,
            status: &invoice.status,
        };

        let response = self.http.post(url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(AppError::BadGateway(format!(
                "Reminder webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn send_email(&self, invoice: &Invoice, customer: &Customer) -> Result<(), AppError> {
        let channel = self
            .smtp
            .as_ref()
            .ok_or_else(|| AppError::BadGateway("SMTP is not configured".to_string()))?;

        let to_email = customer.email.as_ref().ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "Customer has no email address on file"
            ))
        })?;

        let from: Mailbox = format!(
            "{} <{}>",
            channel.config.from_name, channel.config.from_email
        )
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e)))?;

        let to: Mailbox = to_email
            .parse()
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid recipient: {}", e)))?;

        let body = format!(
            "This is a reminder that invoice {} for {} {} is awaiting payment.",
            invoice.invoice_number, invoice.total_amount, invoice.currency
        );

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Payment reminder: invoice {}", invoice.invoice_number))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::EmailError(format!("Failed to build message: {}", e)))?;

        channel
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}
