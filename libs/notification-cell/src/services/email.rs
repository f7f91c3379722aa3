// libs/notification-cell/src/services/email.rs
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::NotificationError;

const SEND_TIMEOUT_SECS: u64 = 10;

/// Transactional email sender. Unconfigured deployments degrade to a
/// logged stub so booking flows keep working in local development.
#[derive(Clone)]
pub struct EmailService {
    client: Client,
    base_url: String,
    api_key: String,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.sendgrid_base_url.clone(),
            api_key: config.sendgrid_api_key.clone(),
            from_email: config.sendgrid_from_email.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Sends a plain-text email. Returns `Ok(true)` when the provider
    /// accepted the message and `Ok(false)` when the service is not
    /// configured and the send was stubbed.
    pub async fn send_confirmation_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<bool, NotificationError> {
        if !self.is_configured() {
            info!("[EMAIL STUB] to={} subject={}", to, subject);
            return Ok(false);
        }

        debug!("Sending email to {} via provider", to);

        let payload = json!({
            "personalizations": [{
                "to": [{"email": to}],
                "subject": subject,
            }],
            "from": {"email": self.from_email},
            "content": [{
                "type": "text/plain",
                "value": body,
            }],
        });

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            info!("Email sent to {}", to);
            Ok(true)
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!("Email provider rejected message: {} {}", status, detail);
            Err(NotificationError::Rejected(format!(
                "{}: {}",
                status, detail
            )))
        }
    }
}
