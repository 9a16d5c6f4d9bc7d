use crate::status::{ServiceExitCode, ServiceState, ServiceStatus};

/// Mutable lifecycle bookkeeping shared by the service and control threads
///
/// Always accessed under the runner's status lock.
#[derive(Debug, Default)]
pub(crate) struct StatusRecord {
    /// Last snapshot sent to the host
    pub(crate) current: ServiceStatus,
    /// Exit code derived from the handler's `run()` result
    pub(crate) exit_code: ServiceExitCode,
    /// The host invoked the entry point
    pub(crate) entered: bool,
    /// Registration failure message, if the entry point aborted
    pub(crate) registration_error: Option<String>,
    /// A stop sequence began; `stop()` has been or is being called
    pub(crate) stop_requested: bool,
    /// `stop()` returned
    pub(crate) stop_returned: bool,
    /// `run()` returned
    pub(crate) run_returned: bool,
}

impl StatusRecord {
    pub(crate) fn state(&self) -> ServiceState {
        self.current.state
    }

    /// Both halves of the shutdown have unwound and STOPPED is still owed
    pub(crate) fn ready_to_stop(&self) -> bool {
        self.run_returned && self.stop_returned && self.state() == ServiceState::StopPending
    }

    /// `run()` must block until STOPPED has been reported
    pub(crate) fn awaiting_stop(&self) -> bool {
        self.stop_requested && self.state() != ServiceState::Stopped
    }
}
