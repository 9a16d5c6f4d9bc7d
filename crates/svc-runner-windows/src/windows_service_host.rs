use std::ffi::OsString;
use std::panic::{AssertUnwindSafe, catch_unwind};

use svc_runner_core::{
    AcceptedControls, ControlCallback, ControlCode, ControlResponse, DispatchSlot, EntryPoint,
    ServiceError, ServiceExitCode, ServiceHost, ServiceState, ServiceStatus,
};
use tracing::{debug, error, info, warn};
use windows_service::define_windows_service;
use windows_service::service::{
    self, ServiceControl, ServiceControlAccept, ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::service_dispatcher;

/// `ServiceMain` receives no context, so the pending entry point waits here
static DISPATCH: DispatchSlot<EntryPoint> = DispatchSlot::new();

define_windows_service!(ffi_service_main, service_main);

/// Registration token for a service running under the SCM
pub struct WindowsServiceToken {
    handle: ServiceStatusHandle,
}

/// Binding to the Windows Service Control Manager
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsServiceHost;

impl WindowsServiceHost {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceHost for WindowsServiceHost {
    type Token = WindowsServiceToken;

    fn register(
        &self,
        name: &str,
        on_control: ControlCallback,
    ) -> Result<WindowsServiceToken, ServiceError> {
        let handle = service_control_handler::register(name, move |control| {
            let code = control_code(control);
            match catch_unwind(AssertUnwindSafe(|| on_control(code))) {
                Ok(ControlResponse::Handled) => ServiceControlHandlerResult::NoError,
                Ok(ControlResponse::NotImplemented) => ServiceControlHandlerResult::NotImplemented,
                Err(_) => {
                    warn!(control = %code, "Control callback panicked");
                    ServiceControlHandlerResult::NotImplemented
                }
            }
        })
        .map_err(|e| ServiceError::registration_failed(format!("{name}: {e}")))?;

        info!(service = %name, "Registered control handler with the SCM");
        Ok(WindowsServiceToken { handle })
    }

    fn report(&self, token: &WindowsServiceToken, status: &ServiceStatus) -> Result<(), ServiceError> {
        let native = native_status(status);
        debug!(
            state = ?native.current_state,
            controls = native.controls_accepted.bits(),
            checkpoint = native.checkpoint,
            wait_hint_ms = status.wait_hint_ms(),
            "SetServiceStatus"
        );

        token
            .handle
            .set_service_status(native)
            .map_err(|e| ServiceError::report(format!("SetServiceStatus failed: {e}")))
    }

    fn start_dispatch(&self, name: &str, entry: EntryPoint) -> Result<(), ServiceError> {
        let _guard = DISPATCH.claim(name, entry)?;

        info!(service = %name, "Connecting to the service control manager");
        service_dispatcher::start(name, ffi_service_main).map_err(|e| {
            ServiceError::dispatch(format!("StartServiceCtrlDispatcherW failed: {e}"))
        })?;

        debug!(service = %name, "Service control dispatcher returned");
        Ok(())
    }

    fn platform_name(&self) -> &'static str {
        "windows"
    }
}

/// Body of the generated `ServiceMain`
fn service_main(arguments: Vec<OsString>) {
    let args = arguments
        .into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let Some(entry) = DISPATCH.take() else {
        error!("ServiceMain invoked without a pending entry point");
        return;
    };

    if catch_unwind(AssertUnwindSafe(|| entry(args))).is_err() {
        error!("Service entry point panicked");
    }
}

fn control_code(control: ServiceControl) -> ControlCode {
    match control {
        ServiceControl::Stop => ControlCode::Stop,
        ServiceControl::Shutdown => ControlCode::Shutdown,
        ServiceControl::Pause => ControlCode::Pause,
        ServiceControl::Continue => ControlCode::Continue,
        ServiceControl::Interrogate => ControlCode::Interrogate,
        other => ControlCode::Other(other.raw_service_control_type()),
    }
}

fn current_state(state: ServiceState) -> service::ServiceState {
    match state {
        ServiceState::Stopped => service::ServiceState::Stopped,
        ServiceState::StartPending => service::ServiceState::StartPending,
        ServiceState::Running => service::ServiceState::Running,
        ServiceState::StopPending => service::ServiceState::StopPending,
    }
}

fn accepted_mask(controls: AcceptedControls) -> ServiceControlAccept {
    let mut mask = ServiceControlAccept::empty();
    if controls.contains(AcceptedControls::STOP) {
        mask |= ServiceControlAccept::STOP;
    }
    if controls.contains(AcceptedControls::SHUTDOWN) {
        mask |= ServiceControlAccept::SHUTDOWN;
    }
    if controls.contains(AcceptedControls::PAUSE_CONTINUE) {
        mask |= ServiceControlAccept::PAUSE_CONTINUE;
    }
    mask
}

fn native_status(status: &ServiceStatus) -> service::ServiceStatus {
    let exit_code = match status.exit_code {
        ServiceExitCode::Success => service::ServiceExitCode::Win32(0),
        ServiceExitCode::ServiceSpecific(code) => service::ServiceExitCode::ServiceSpecific(code),
    };

    service::ServiceStatus {
        service_type: ServiceType::OWN_PROCESS,
        current_state: current_state(status.state),
        controls_accepted: accepted_mask(status.controls_accepted),
        exit_code,
        checkpoint: status.checkpoint,
        wait_hint: status.wait_hint,
        process_id: None,
    }
}
