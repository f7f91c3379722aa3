use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_api_key: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub sendgrid_api_key: String,
    pub sendgrid_from_email: String,
    pub sendgrid_base_url: String,
    pub slack_bot_token: String,
    pub slack_channel_id: String,
    pub slack_base_url: String,
    pub google_calendar_token: String,
    pub google_calendar_id: String,
    pub google_calendar_base_url: String,
    pub frontend_origin: String,
    pub session_idle_minutes: i64,
    pub agent_max_steps: u32,
    pub slot_duration_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_URL not set, using empty value");
                    String::new()
                }),
            store_api_key: env::var("STORE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_API_KEY not set, using empty value");
                    String::new()
                }),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("GEMINI_API_KEY not set, agent planning unavailable");
                    String::new()
                }),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            sendgrid_from_email: env::var("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@example.com".to_string()),
            sendgrid_base_url: env::var("SENDGRID_BASE_URL")
                .unwrap_or_else(|_| "https://api.sendgrid.com".to_string()),
            slack_bot_token: env::var("SLACK_BOT_TOKEN").unwrap_or_default(),
            slack_channel_id: env::var("SLACK_CHANNEL_ID").unwrap_or_default(),
            slack_base_url: env::var("SLACK_BASE_URL")
                .unwrap_or_else(|_| "https://slack.com".to_string()),
            google_calendar_token: env::var("GOOGLE_CALENDAR_TOKEN").unwrap_or_default(),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            google_calendar_base_url: env::var("GOOGLE_CALENDAR_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            session_idle_minutes: env::var("SESSION_IDLE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            agent_max_steps: env::var("AGENT_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),
            slot_duration_minutes: env::var("SLOT_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_api_key.is_empty()
    }

    pub fn is_gemini_configured(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.sendgrid_api_key.is_empty()
    }

    pub fn is_slack_configured(&self) -> bool {
        !self.slack_bot_token.is_empty() && !self.slack_channel_id.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.google_calendar_token.is_empty()
    }
}
