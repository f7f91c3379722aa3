// libs/notification-cell/tests/dispatcher_test.rs
use std::sync::Arc;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::models::{ChannelOutcome, NotificationRequest};
use notification_cell::services::channels::{
    EmailChannel, InAppLogChannel, NotificationChannel, SlackChannel,
};
use notification_cell::services::dispatcher::NotificationDispatcher;
use notification_cell::services::email::EmailService;
use shared_config::AppConfig;

fn test_config(slack_base: &str, sendgrid_base: &str) -> AppConfig {
    AppConfig {
        store_url: String::new(),
        store_api_key: String::new(),
        gemini_api_key: String::new(),
        gemini_model: "gemini-2.0-flash".to_string(),
        gemini_base_url: String::new(),
        sendgrid_api_key: "sg-test-key".to_string(),
        sendgrid_from_email: "noreply@clinic.test".to_string(),
        sendgrid_base_url: sendgrid_base.to_string(),
        slack_bot_token: "xoxb-test".to_string(),
        slack_channel_id: "C123".to_string(),
        slack_base_url: slack_base.to_string(),
        google_calendar_token: String::new(),
        google_calendar_id: "primary".to_string(),
        google_calendar_base_url: String::new(),
        frontend_origin: "http://localhost:3000".to_string(),
        session_idle_minutes: 30,
        agent_max_steps: 6,
        slot_duration_minutes: 60,
    }
}

#[tokio::test]
async fn falls_through_to_email_when_slack_fails() {
    let slack_server = MockServer::start().await;
    let email_server = MockServer::start().await;

    // Both retry attempts against slack fail with a transport error.
    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&slack_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&email_server)
        .await;

    let config = test_config(&slack_server.uri(), &email_server.uri());
    let dispatcher = NotificationDispatcher::new(&config, EmailService::new(&config));

    let request = NotificationRequest::new("Daily report", "3 visits yesterday")
        .with_recipient("doctor@clinic.test");
    let report = dispatcher.send(&request).await;

    assert!(report.delivered);
    assert_eq!(report.delivered_via(), Some("email"));

    let outcomes: Vec<_> = report.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ChannelOutcome::Failed,
            ChannelOutcome::Delivered,
            ChannelOutcome::Skipped,
        ]
    );
}

#[tokio::test]
async fn slack_api_error_in_ok_body_counts_as_failure() {
    let slack_server = MockServer::start().await;
    let email_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"ok": false, "error": "channel_not_found"})),
        )
        .expect(2)
        .mount(&slack_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&email_server)
        .await;

    let config = test_config(&slack_server.uri(), &email_server.uri());
    let dispatcher = NotificationDispatcher::new(&config, EmailService::new(&config));

    let request = NotificationRequest::new("Stats", "2 appointments today")
        .with_recipient("doctor@clinic.test");
    let report = dispatcher.send(&request).await;

    assert!(report.delivered);
    let slack = &report.attempts[0];
    assert_eq!(slack.outcome, ChannelOutcome::Failed);
    assert!(slack
        .detail
        .as_deref()
        .is_some_and(|d| d.contains("channel_not_found")));
}

#[tokio::test]
async fn delivers_via_slack_and_skips_the_rest() {
    let slack_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .and(body_partial_json(serde_json::json!({"channel": "C123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&slack_server)
        .await;

    let config = test_config(&slack_server.uri(), "http://unused.test");
    let dispatcher = NotificationDispatcher::new(&config, EmailService::new(&config));

    let report = dispatcher
        .send(&NotificationRequest::new("Report", "all clear"))
        .await;

    assert!(report.delivered);
    assert_eq!(report.delivered_via(), Some("slack"));
    assert!(report.attempts[1..]
        .iter()
        .all(|a| a.outcome == ChannelOutcome::Skipped));
}

#[tokio::test]
async fn in_app_log_guarantees_delivery_when_nothing_is_configured() {
    let mut config = test_config("http://unused.test", "http://unused.test");
    config.slack_bot_token = String::new();
    config.sendgrid_api_key = String::new();

    let dispatcher = NotificationDispatcher::new(&config, EmailService::new(&config));
    let log = dispatcher.in_app_log().expect("default chain owns a log");

    let report = dispatcher
        .send(&NotificationRequest::new("Report", "nobody home"))
        .await;

    assert!(report.delivered);
    assert_eq!(report.delivered_via(), Some("in_app_log"));
    assert_eq!(report.attempts[0].outcome, ChannelOutcome::Skipped);
    assert_eq!(report.attempts[1].outcome, ChannelOutcome::Skipped);

    let notices = log.recent_notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].subject, "Report");
}

#[tokio::test]
async fn explicit_chain_preserves_attempt_order() {
    let email_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&email_server)
        .await;

    let config = test_config("http://unused.test", &email_server.uri());
    let chain: Vec<Arc<dyn NotificationChannel>> = vec![
        Arc::new(EmailChannel::new(EmailService::new(&config))),
        Arc::new(InAppLogChannel::new()),
    ];
    let dispatcher = NotificationDispatcher::with_channels(chain);

    let report = dispatcher
        .send(&NotificationRequest::new("Order check", "hello").with_recipient("a@b.test"))
        .await;

    let names: Vec<_> = report
        .attempts
        .iter()
        .map(|a| a.channel.as_str())
        .collect();
    assert_eq!(names, vec!["email", "in_app_log"]);
}

#[tokio::test]
async fn report_email_addresses_the_requested_recipient() {
    let email_server = MockServer::start().await;

    // Slack unconfigured, so the chain lands on the email hop directly.
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(body_partial_json(serde_json::json!({
            "personalizations": [{"to": [{"email": "ahuja@clinic.test"}]}],
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&email_server)
        .await;

    let mut config = test_config("http://unused.test", &email_server.uri());
    config.slack_bot_token = String::new();

    let dispatcher = NotificationDispatcher::new(&config, EmailService::new(&config));
    let request = NotificationRequest::new("Doctor report", "3 visits yesterday")
        .with_recipient("ahuja@clinic.test");

    let report = dispatcher.send(&request).await;

    assert!(report.delivered);
    assert_eq!(report.delivered_via(), Some("email"));
}

#[tokio::test]
async fn explicit_chain_log_handle_receives_notices() {
    let log = Arc::new(InAppLogChannel::new());
    let chain: Vec<Arc<dyn NotificationChannel>> =
        vec![log.clone() as Arc<dyn NotificationChannel>];
    let dispatcher = NotificationDispatcher::with_channels(chain);

    // An explicit chain has no dispatcher-owned log to read from.
    assert!(dispatcher.in_app_log().is_none());

    let report = dispatcher
        .send(&NotificationRequest::new("Handle check", "still readable"))
        .await;

    assert!(report.delivered);
    let notices = log.recent_notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].subject, "Handle check");
}
