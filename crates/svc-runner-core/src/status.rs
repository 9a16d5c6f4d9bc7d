use derive_more::Display;
use std::ops::BitOr;
use std::time::Duration;

/// Lifecycle state of a service, in the host manager's vocabulary
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceState {
    #[default]
    #[display("STOPPED")]
    Stopped,
    #[display("START_PENDING")]
    StartPending,
    #[display("RUNNING")]
    Running,
    #[display("STOP_PENDING")]
    StopPending,
}

impl ServiceState {
    /// Whether the host manager is waiting on a transition to complete
    pub fn is_pending(self) -> bool {
        matches!(self, ServiceState::StartPending | ServiceState::StopPending)
    }

    /// The state that must follow this one, if the lifecycle continues
    pub fn next(self) -> ServiceState {
        match self {
            ServiceState::Stopped => ServiceState::StartPending,
            ServiceState::StartPending => ServiceState::Running,
            ServiceState::Running => ServiceState::StopPending,
            ServiceState::StopPending => ServiceState::Stopped,
        }
    }
}

/// Control request delivered by the host manager
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCode {
    #[display("STOP")]
    Stop,
    #[display("SHUTDOWN")]
    Shutdown,
    #[display("PAUSE")]
    Pause,
    #[display("CONTINUE")]
    Continue,
    #[display("INTERROGATE")]
    Interrogate,
    /// Any code without a dedicated meaning for this runner
    #[display("OTHER({_0})")]
    Other(u32),
}

impl ControlCode {
    /// STOP and SHUTDOWN are the only codes that leave RUNNING
    pub fn is_stop_request(self) -> bool {
        matches!(self, ControlCode::Stop | ControlCode::Shutdown)
    }
}

/// What the runner tells the host manager after handling a control code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResponse {
    Handled,
    NotImplemented,
}

/// Set of control codes the service currently accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AcceptedControls(u8);

impl AcceptedControls {
    pub const NONE: AcceptedControls = AcceptedControls(0);
    pub const STOP: AcceptedControls = AcceptedControls(1);
    pub const SHUTDOWN: AcceptedControls = AcceptedControls(1 << 1);
    pub const PAUSE_CONTINUE: AcceptedControls = AcceptedControls(1 << 2);

    /// Mask reported alongside a given state
    pub fn for_state(state: ServiceState) -> AcceptedControls {
        match state {
            ServiceState::Running => AcceptedControls::STOP | AcceptedControls::SHUTDOWN,
            _ => AcceptedControls::NONE,
        }
    }

    pub fn contains(self, other: AcceptedControls) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AcceptedControls {
    type Output = AcceptedControls;

    fn bitor(self, rhs: AcceptedControls) -> AcceptedControls {
        AcceptedControls(self.0 | rhs.0)
    }
}

/// Exit code reported with the final STOPPED status
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceExitCode {
    #[default]
    #[display("success")]
    Success,
    #[display("service specific error {_0}")]
    ServiceSpecific(u32),
}

impl ServiceExitCode {
    pub fn is_success(self) -> bool {
        matches!(self, ServiceExitCode::Success)
    }

    pub fn code(self) -> u32 {
        match self {
            ServiceExitCode::Success => 0,
            ServiceExitCode::ServiceSpecific(code) => code,
        }
    }
}

/// Wait hints applied to the pending states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusTiming {
    pub start_wait_hint: Duration,
    pub stop_wait_hint: Duration,
}

/// Snapshot sent to the host manager on every status report
///
/// Everything except the state is derived from the state, so the metadata
/// can never disagree with the lifecycle position it is reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub controls_accepted: AcceptedControls,
    pub exit_code: ServiceExitCode,
    pub checkpoint: u32,
    pub wait_hint: Duration,
}

impl ServiceStatus {
    pub fn for_state(
        state: ServiceState,
        exit_code: ServiceExitCode,
        timing: &StatusTiming,
    ) -> ServiceStatus {
        let wait_hint = match state {
            ServiceState::StartPending => timing.start_wait_hint,
            ServiceState::StopPending => timing.stop_wait_hint,
            ServiceState::Stopped | ServiceState::Running => Duration::ZERO,
        };

        ServiceStatus {
            state,
            controls_accepted: AcceptedControls::for_state(state),
            exit_code: match state {
                ServiceState::Stopped => exit_code,
                _ => ServiceExitCode::Success,
            },
            checkpoint: u32::from(state.is_pending()),
            wait_hint,
        }
    }

    /// Wait hint in whole milliseconds, saturating
    pub fn wait_hint_ms(&self) -> u32 {
        u32::try_from(self.wait_hint.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Default for ServiceStatus {
    fn default() -> Self {
        ServiceStatus::for_state(
            ServiceState::Stopped,
            ServiceExitCode::Success,
            &StatusTiming::default(),
        )
    }
}
