//! systemd notification protocol
//!
//! A notify-capable service manager passes the address of a datagram socket
//! in `NOTIFY_SOCKET`. Every status report becomes one set of notify states:
//! - `READY=1` once the service runs
//! - `STOPPING=1` when shutdown begins
//! - `STATUS=...` free-form text shown by `systemctl status`
//! - `EXTEND_TIMEOUT_USEC=...` while a pending transition is in progress
//! - `ERRNO=...` when the service stops with a failure code

use sd_notify::NotifyState;
use std::ffi::OsString;
use std::io;
use svc_runner_core::{ServiceState, ServiceStatus};

pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// Address of the service manager's notification socket, if one was announced
pub fn notify_socket() -> Option<OsString> {
    std::env::var_os(NOTIFY_SOCKET_ENV).filter(|addr| !addr.is_empty())
}

/// Human-readable `STATUS=` text for a snapshot
pub fn status_text(service: &str, status: &ServiceStatus) -> String {
    match status.state {
        ServiceState::StartPending => format!("Starting {service}"),
        ServiceState::Running => format!("{service} running"),
        ServiceState::StopPending => format!("Stopping {service}"),
        ServiceState::Stopped if status.exit_code.is_success() => format!("{service} stopped"),
        ServiceState::Stopped => format!(
            "{service} stopped with exit code {}",
            status.exit_code.code()
        ),
    }
}

/// Notify states announcing a status snapshot
pub fn notify_states<'a>(
    status: &ServiceStatus,
    text: &'a str,
    main_pid: u32,
) -> Vec<NotifyState<'a>> {
    let mut states = Vec::new();

    match status.state {
        ServiceState::Running => {
            states.push(NotifyState::Ready);
            states.push(NotifyState::MainPid(main_pid));
        }
        ServiceState::StopPending => states.push(NotifyState::Stopping),
        _ => {}
    }

    states.push(NotifyState::Status(text));

    if status.state == ServiceState::Stopped && !status.exit_code.is_success() {
        states.push(NotifyState::Errno(status.exit_code.code()));
    }

    if status.state.is_pending() && !status.wait_hint.is_zero() {
        let usec = u32::try_from(status.wait_hint.as_micros()).unwrap_or(u32::MAX);
        states.push(NotifyState::ExtendTimeoutUsec(usec));
    }

    states
}

/// Send one notification to the socket named in the environment
pub fn notify(states: &[NotifyState<'_>]) -> io::Result<()> {
    sd_notify::notify(false, states)
}
