// libs/notification-cell/src/services/dispatcher.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{ChannelAttempt, ChannelOutcome, DeliveryReport, NotificationRequest};
use crate::services::channels::{
    EmailChannel, InAppLogChannel, NotificationChannel, SlackChannel,
};
use crate::services::email::EmailService;

const ATTEMPTS_PER_CHANNEL: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 250;

/// Walks an ordered channel chain until one hop delivers. The chain ends
/// with the in-app log, which always succeeds, so every dispatch resolves
/// to a deterministic report.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    in_app_log: Option<Arc<InAppLogChannel>>,
}

impl NotificationDispatcher {
    pub fn new(config: &AppConfig, email: EmailService) -> Self {
        let in_app_log = Arc::new(InAppLogChannel::new());

        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(SlackChannel::new(config)),
            Arc::new(EmailChannel::new(email)),
            in_app_log.clone(),
        ];

        Self {
            channels,
            in_app_log: Some(in_app_log),
        }
    }

    /// Builds a dispatcher over an explicit chain. The last channel should
    /// be one that cannot fail if callers rely on guaranteed delivery.
    /// `in_app_log()` is `None` here; callers that want to read the log
    /// keep their own handle to the channel they put in the chain.
    pub fn with_channels(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            in_app_log: None,
        }
    }

    /// The tail log channel of the default chain, if this dispatcher owns
    /// one.
    pub fn in_app_log(&self) -> Option<Arc<InAppLogChannel>> {
        self.in_app_log.clone()
    }

    /// Attempts each channel in priority order, moving on immediately when
    /// one fails. A channel gets up to two tries with a short backoff before
    /// it is marked failed.
    pub async fn send(&self, request: &NotificationRequest) -> DeliveryReport {
        let mut attempts = Vec::with_capacity(self.channels.len());
        let mut delivered = false;

        for channel in &self.channels {
            if delivered {
                attempts.push(ChannelAttempt {
                    channel: channel.name().to_string(),
                    outcome: ChannelOutcome::Skipped,
                    detail: Some("already delivered".to_string()),
                });
                continue;
            }

            if !channel.is_configured() {
                attempts.push(ChannelAttempt {
                    channel: channel.name().to_string(),
                    outcome: ChannelOutcome::Skipped,
                    detail: Some("not configured".to_string()),
                });
                continue;
            }

            match self.try_channel(channel.as_ref(), request).await {
                Ok(()) => {
                    info!("Notification delivered via {}", channel.name());
                    delivered = true;
                    attempts.push(ChannelAttempt {
                        channel: channel.name().to_string(),
                        outcome: ChannelOutcome::Delivered,
                        detail: None,
                    });
                }
                Err(detail) => {
                    warn!(
                        "Channel {} failed, falling through: {}",
                        channel.name(),
                        detail
                    );
                    attempts.push(ChannelAttempt {
                        channel: channel.name().to_string(),
                        outcome: ChannelOutcome::Failed,
                        detail: Some(detail),
                    });
                }
            }
        }

        DeliveryReport {
            delivered,
            attempts,
        }
    }

    async fn try_channel(
        &self,
        channel: &dyn NotificationChannel,
        request: &NotificationRequest,
    ) -> Result<(), String> {
        let deadline = Duration::from_secs(channel.timeout_secs());
        let mut last_error = String::new();

        for attempt in 1..=ATTEMPTS_PER_CHANNEL {
            if attempt > 1 {
                sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            }

            match timeout(deadline, channel.deliver(request)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    last_error = e.to_string();
                }
                Err(_) => {
                    last_error = format!("timed out after {}s", channel.timeout_secs());
                }
            }
        }

        Err(last_error)
    }
}
