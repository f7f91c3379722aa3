pub mod models;
pub mod parse;
pub mod services;

pub use models::*;
pub use services::availability::AvailabilityService;
pub use services::booking::BookingService;
pub use services::calendar::CalendarService;
pub use services::directory::DirectoryService;
