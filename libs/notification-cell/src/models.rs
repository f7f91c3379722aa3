// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A message to push through the channel chain. `recipient` is an email
/// address used by the email channel; chat and in-app channels ignore it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipient: Option<String>,
    pub subject: String,
    pub text: String,
}

impl NotificationRequest {
    pub fn new(subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient: None,
            subject: subject.into(),
            text: text.into(),
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOutcome {
    Delivered,
    Failed,
    Skipped,
}

/// One entry in the ordered attempt trail of a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAttempt {
    pub channel: String,
    pub outcome: ChannelOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of walking the channel chain. `delivered` is true iff at least
/// one channel succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub attempts: Vec<ChannelAttempt>,
}

impl DeliveryReport {
    pub fn delivered_via(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.outcome == ChannelOutcome::Delivered)
            .map(|a| a.channel.as_str())
    }
}

/// A notice persisted by the in-app log channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppNotice {
    pub subject: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Channel transport error: {0}")]
    Transport(String),

    #[error("Channel rejected the message: {0}")]
    Rejected(String),

    #[error("Channel timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Transport(err.to_string())
    }
}
