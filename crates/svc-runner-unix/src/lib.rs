//! Unix service host
//!
//! Speaks the systemd notification protocol for status reports and turns
//! termination signals into control requests.

#[cfg(unix)]
mod notify;
#[cfg(unix)]
mod signals;
#[cfg(unix)]
mod systemd_service_host;

#[cfg(unix)]
pub use notify::{NOTIFY_SOCKET_ENV, notify, notify_socket, notify_states, status_text};
#[cfg(unix)]
pub use signals::SignalWatcher;
#[cfg(unix)]
pub use systemd_service_host::{SystemdServiceHost, SystemdServiceToken};

#[cfg(unix)]
pub struct SystemdServiceHostFactory;

#[cfg(unix)]
impl svc_runner_core::ServiceHostFactory for SystemdServiceHostFactory {
    type Host = SystemdServiceHost;

    fn create_host() -> SystemdServiceHost {
        SystemdServiceHost::new()
    }

    fn platform_name() -> &'static str {
        "unix"
    }
}

/// Serializes tests that raise signals at the test process
#[cfg(all(test, unix))]
pub(crate) static SIGNAL_TESTS: std::sync::Mutex<()> = std::sync::Mutex::new(());
