use crate::notify::{NOTIFY_SOCKET_ENV, notify, notify_socket, notify_states, status_text};
use crate::signals::SignalWatcher;
use std::ffi::OsString;
use svc_runner_core::{
    ControlCallback, DispatchSlot, EntryPoint, ServiceError, ServiceHost, ServiceStatus,
};
use tracing::{debug, info};

/// Guards against two runners sharing the process-wide signal handlers
static DISPATCH: DispatchSlot<()> = DispatchSlot::new();

/// Registration token for a service supervised by systemd
pub struct SystemdServiceToken {
    name: String,
    main_pid: u32,
    _signals: SignalWatcher,
}

impl SystemdServiceToken {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Binding to a notify-capable service manager such as systemd
///
/// Status reports go out over the `NOTIFY_SOCKET` datagram protocol and
/// control requests arrive as process signals.
#[derive(Debug, Clone, Default)]
pub struct SystemdServiceHost {
    socket: Option<OsString>,
}

impl SystemdServiceHost {
    /// Host bound to the socket announced in the environment
    pub fn new() -> Self {
        Self {
            socket: notify_socket(),
        }
    }
}

impl ServiceHost for SystemdServiceHost {
    type Token = SystemdServiceToken;

    fn register(
        &self,
        name: &str,
        on_control: ControlCallback,
    ) -> Result<SystemdServiceToken, ServiceError> {
        let Some(socket) = &self.socket else {
            return Err(ServiceError::registration_failed(format!(
                "{name}: {NOTIFY_SOCKET_ENV} is not set, the process was not started by a service manager"
            )));
        };

        let signals = SignalWatcher::spawn(name, on_control)
            .map_err(|e| ServiceError::registration_failed(format!("{name}: {e:#}")))?;

        info!(service = %name, socket = ?socket, "Registered with the service manager");
        Ok(SystemdServiceToken {
            name: name.to_string(),
            main_pid: nix::unistd::getpid().as_raw() as u32,
            _signals: signals,
        })
    }

    fn report(&self, token: &SystemdServiceToken, status: &ServiceStatus) -> Result<(), ServiceError> {
        let text = status_text(&token.name, status);
        let states = notify_states(status, &text, token.main_pid);
        debug!(service = %token.name, state = %status.state, "sd_notify");

        notify(&states).map_err(|e| ServiceError::report(format!("sd_notify failed: {e}")))
    }

    fn start_dispatch(&self, name: &str, entry: EntryPoint) -> Result<(), ServiceError> {
        let _guard = DISPATCH.claim(name, ())?;

        debug!(service = %name, "Running service entry on the dispatch thread");
        entry(std::env::args().collect());
        Ok(())
    }

    fn platform_name(&self) -> &'static str {
        "unix"
    }
}
