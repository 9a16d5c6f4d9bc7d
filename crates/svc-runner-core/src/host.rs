use crate::error::ServiceError;
use crate::status::{ControlCode, ControlResponse, ServiceStatus};
use std::sync::Arc;

/// Callback the host invokes for every control request addressed to the service
pub type ControlCallback = Arc<dyn Fn(ControlCode) -> ControlResponse + Send + Sync>;

/// Entry point the host invokes once it starts the service, with the start arguments
pub type EntryPoint = Box<dyn FnOnce(Vec<String>) + Send>;

/// Binding to a host operating system's service manager
///
/// This trait is the narrow boundary between the runner's state machine and
/// the platform's control protocol. Platform crates implement it over the
/// native API; tests implement it in memory.
///
/// # Contract
///
/// - `start_dispatch()` blocks the calling thread and hands control to the
///   host. The host calls `entry` at most once, possibly on another thread,
///   and `start_dispatch()` returns only after the host's dispatch loop for
///   this process exited.
/// - `register()` is called from inside `entry`. It associates the process
///   with the named service and installs `on_control`; the returned token
///   addresses every later status report.
/// - `on_control` may be called on any thread, any number of times after a
///   successful registration, and must return in bounded time.
/// - `report()` is fire-and-forget. Errors are logged by the caller and never
///   change the lifecycle.
pub trait ServiceHost: Send + Sync + 'static {
    /// Opaque handle returned by a successful registration
    type Token: Send + Sync + 'static;

    /// Associate this process with the named service and install the control callback
    fn register(&self, name: &str, on_control: ControlCallback)
    -> Result<Self::Token, ServiceError>;

    /// Inform the host of a new status snapshot
    fn report(&self, token: &Self::Token, status: &ServiceStatus) -> Result<(), ServiceError>;

    /// Hand the calling thread to the host's dispatch loop
    fn start_dispatch(&self, name: &str, entry: EntryPoint) -> Result<(), ServiceError>;

    /// Platform name for logging and debugging
    fn platform_name(&self) -> &'static str;
}

impl<S: ServiceHost> ServiceHost for Arc<S> {
    type Token = S::Token;

    fn register(&self, name: &str, on_control: ControlCallback) -> Result<S::Token, ServiceError> {
        (**self).register(name, on_control)
    }

    fn report(&self, token: &S::Token, status: &ServiceStatus) -> Result<(), ServiceError> {
        (**self).report(token, status)
    }

    fn start_dispatch(&self, name: &str, entry: EntryPoint) -> Result<(), ServiceError> {
        (**self).start_dispatch(name, entry)
    }

    fn platform_name(&self) -> &'static str {
        (**self).platform_name()
    }
}

/// Factory trait for creating platform-specific hosts
pub trait ServiceHostFactory {
    /// The type of host this factory creates
    type Host: ServiceHost;

    /// Create a host for the current platform
    fn create_host() -> Self::Host;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
