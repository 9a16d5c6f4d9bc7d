//! Windows-specific service manager binding
//!
//! Adapts the service runner to the Service Control Manager through the
//! `windows-service` crate: the dispatcher and `ServiceMain`, the control
//! handler, and status reports.

#[cfg(windows)]
mod windows_service_host;

#[cfg(windows)]
pub use windows_service_host::{WindowsServiceHost, WindowsServiceToken};

/// Windows-specific service host factory
#[cfg(windows)]
pub struct WindowsServiceHostFactory;

#[cfg(windows)]
impl svc_runner_core::ServiceHostFactory for WindowsServiceHostFactory {
    type Host = WindowsServiceHost;

    fn create_host() -> WindowsServiceHost {
        WindowsServiceHost::new()
    }

    fn platform_name() -> &'static str {
        "windows"
    }
}
