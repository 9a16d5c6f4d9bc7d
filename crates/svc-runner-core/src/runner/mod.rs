mod record;
mod service_runner;

pub use service_runner::{RunOutcome, ServiceRunner};
