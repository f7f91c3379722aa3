pub mod models;
pub mod services;

pub use models::*;
pub use services::channels::{EmailChannel, InAppLogChannel, NotificationChannel, SlackChannel};
pub use services::dispatcher::NotificationDispatcher;
pub use services::email::EmailService;
