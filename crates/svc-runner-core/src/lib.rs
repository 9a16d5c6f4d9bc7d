//! Service runner core - platform-independent lifecycle adapter
//!
//! This crate provides the handler and host traits, the status vocabulary,
//! the lifecycle state machine and the error and configuration types that
//! are shared across the platform-specific service manager bindings.

pub mod config;
pub mod error;
pub mod handler;
pub mod host;
pub mod registry;
mod runner;
pub mod status;

pub use config::{RunnerConfig, RunnerConfigBuilder};
pub use error::ServiceError;
pub use handler::{ServiceHandler, ServiceSpecificError};
pub use host::{ControlCallback, EntryPoint, ServiceHost, ServiceHostFactory};
pub use registry::{DispatchSlot, SlotGuard};
pub use runner::{RunOutcome, ServiceRunner};
pub use status::{
    AcceptedControls, ControlCode, ControlResponse, ServiceExitCode, ServiceState, ServiceStatus,
    StatusTiming,
};
