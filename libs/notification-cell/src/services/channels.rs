// libs/notification-cell/src/services/channels.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{InAppNotice, NotificationError, NotificationRequest};
use crate::services::email::EmailService;

const CHANNEL_TIMEOUT_SECS: u64 = 8;
const IN_APP_LOG_CAPACITY: usize = 200;

/// One hop in the dispatcher's chain. `deliver` performs a single attempt;
/// retry and timeout policy live in the dispatcher.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Unready channels are skipped rather than attempted.
    fn is_configured(&self) -> bool;

    async fn deliver(&self, request: &NotificationRequest) -> Result<(), NotificationError>;

    /// Per-attempt deadline enforced by the dispatcher.
    fn timeout_secs(&self) -> u64 {
        CHANNEL_TIMEOUT_SECS
    }
}

/// Posts to a fixed workspace channel via chat.postMessage.
pub struct SlackChannel {
    client: Client,
    base_url: String,
    bot_token: String,
    channel_id: String,
}

impl SlackChannel {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(CHANNEL_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.slack_base_url.clone(),
            bot_token: config.slack_bot_token.clone(),
            channel_id: config.slack_channel_id.clone(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.channel_id.is_empty()
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        debug!("Posting notification to slack channel {}", self.channel_id);

        let response = self
            .client
            .post(format!("{}/api/chat.postMessage", self.base_url))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": self.channel_id,
                "text": format!("*{}*\n{}", request.subject, request.text),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotificationError::Transport(format!(
                "slack returned {}",
                response.status()
            )));
        }

        // Slack reports API-level failures inside a 200 body.
        let body: Value = response.json().await?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(NotificationError::Rejected(reason.to_string()));
        }

        info!("Notification delivered to slack");
        Ok(())
    }
}

/// Email hop; requires a recipient on the request.
pub struct EmailChannel {
    email: EmailService,
}

impl EmailChannel {
    pub fn new(email: EmailService) -> Self {
        Self { email }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn is_configured(&self) -> bool {
        self.email.is_configured()
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        let recipient = request
            .recipient
            .as_deref()
            .ok_or_else(|| NotificationError::Rejected("no recipient address".to_string()))?;

        let sent = self
            .email
            .send_confirmation_email(recipient, &request.subject, &request.text)
            .await?;

        if sent {
            Ok(())
        } else {
            Err(NotificationError::NotConfigured("email".to_string()))
        }
    }

    fn timeout_secs(&self) -> u64 {
        // provider client carries its own 10s timeout
        12
    }
}

/// Durable local log, the terminal hop that cannot fail. Keeps the most
/// recent notices in a bounded in-memory buffer and writes each one to the
/// application log.
pub struct InAppLogChannel {
    notices: Arc<RwLock<Vec<InAppNotice>>>,
}

impl InAppLogChannel {
    pub fn new() -> Self {
        Self {
            notices: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn recent_notices(&self) -> Vec<InAppNotice> {
        self.notices.read().await.clone()
    }
}

impl Default for InAppLogChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for InAppLogChannel {
    fn name(&self) -> &str {
        "in_app_log"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        let notice = InAppNotice {
            subject: request.subject.clone(),
            text: request.text.clone(),
            created_at: Utc::now(),
        };

        let mut notices = self.notices.write().await;
        if notices.len() >= IN_APP_LOG_CAPACITY {
            notices.remove(0);
        }
        notices.push(notice);

        warn!(
            "Notification fell through to in-app log: {}",
            request.subject
        );
        Ok(())
    }
}
