//! Transactional mail client.
//!
//! Posts task-assignment emails to an HTTP mail delivery API. Delivery is
//! always best-effort from the caller's point of view; transient upstream
//! failures are retried with exponential backoff before giving up.

use anyhow::{Context, Result};
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::Settings;

#[derive(Clone)]
pub struct Mailer {
    client: Client,
    base_url: Url,
    token: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

impl Mailer {
    /// Build the mailer from settings. Returns `None` when the mail API is
    /// not configured; callers then skip email delivery entirely.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let (api_url, token) = match (&settings.mail_api_url, &settings.mail_api_token) {
            (Some(url), Some(token)) => (url, token),
            _ => {
                tracing::info!("Mail API not configured - assignment emails disabled");
                return Ok(None);
            }
        };

        let base_url = Url::parse(api_url).context("Invalid MAIL_API_URL")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.mail_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = %base_url, "Mail client initialized");

        Ok(Some(Self {
            client,
            base_url,
            token: token.clone(),
        }))
    }

    /// Send a task-assignment email.
    #[instrument(skip(self))]
    pub async fn send_task_assignment(
        &self,
        to_email: &str,
        task_title: &str,
        property_name: &str,
    ) -> Result<()> {
        let subject = format!("Task assigned: {}", task_title);
        let text_body = format!(
            "You have been assigned a remediation task at {}.\n\nTask: {}\n",
            property_name, task_title
        );

        let request = SendMessageRequest {
            to: to_email,
            subject: &subject,
            text_body: &text_body,
        };

        self.post_message(&request).await
    }

    async fn post_message(&self, request: &SendMessageRequest<'_>) -> Result<()> {
        let url = self
            .base_url
            .join("v1/messages")
            .context("Invalid mail API path")?;

        let send = || async {
            debug!(url = %url, "Mail API request");

            let response = self
                .client
                .post(url.clone())
                .bearer_auth(&self.token)
                .json(request)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(anyhow::Error::from(e)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let err = anyhow::anyhow!("Mail API returned {}", status);
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            }
        };

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        match backoff::future::retry(backoff, send).await {
            Ok(()) => {
                debug!("Mail delivered");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Mail delivery failed");
                Err(e)
            }
        }
    }
}
