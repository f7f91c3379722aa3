pub mod orchestrator;
pub mod planner;
pub mod registry;
pub mod session;
pub mod tools;
