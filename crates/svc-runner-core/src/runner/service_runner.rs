use crate::config::RunnerConfig;
use crate::error::ServiceError;
use crate::handler::{ServiceHandler, exit_code_for};
use crate::host::{ControlCallback, ServiceHost};
use crate::runner::record::StatusRecord;
use crate::status::{
    ControlCode, ControlResponse, ServiceExitCode, ServiceState, ServiceStatus, StatusTiming,
};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tracing::{debug, error, info, warn};

/// Result of a service lifecycle that reached the host manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code reported with the final status
    pub exit_code: ServiceExitCode,
    /// State of the last report sent
    pub final_state: ServiceState,
}

/// Adapts a `ServiceHandler` to a host service manager's lifecycle protocol
///
/// The runner owns the handler and drives it through
/// `STOPPED → START_PENDING → RUNNING → STOP_PENDING → STOPPED`, reporting every
/// transition to the host. The handler's `run()` executes on the service
/// thread; stop requests arrive on the host's control thread. The status lock
/// is never held while the handler is executing.
pub struct ServiceRunner<H: ServiceHandler, S: ServiceHost> {
    name: String,
    config: RunnerConfig,
    timing: StatusTiming,
    handler: H,
    host: S,
    status: Mutex<StatusRecord>,
    stopped: Condvar,
    control_token: OnceLock<S::Token>,
}

impl<H: ServiceHandler, S: ServiceHost> ServiceRunner<H, S> {
    /// Create a runner for the configured service, taking ownership of the handler
    pub fn new(config: RunnerConfig, handler: H, host: S) -> Self {
        Self {
            name: config.name.clone(),
            timing: config.timing(),
            config,
            handler,
            host,
            status: Mutex::new(StatusRecord::default()),
            stopped: Condvar::new(),
            control_token: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        self.lock_status().state()
    }

    /// Last snapshot reported to the host
    pub fn last_status(&self) -> ServiceStatus {
        self.lock_status().current
    }

    fn lock_status(&self) -> MutexGuard<'_, StatusRecord> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand the calling thread to the host and block until the lifecycle completes
    ///
    /// Returns once the host's dispatch loop has exited and, if the service
    /// was started, STOPPED has been reported.
    pub fn run(self) -> Result<RunOutcome, ServiceError> {
        self.config.validate()?;

        let runner = Arc::new(self);
        info!(
            service = %runner.name,
            platform = runner.host.platform_name(),
            "Starting service dispatch"
        );

        let entry = {
            let runner = runner.clone();
            Box::new(move |args: Vec<String>| runner.service_main(args))
        };

        let dispatched = runner.host.start_dispatch(&runner.name, entry);

        let mut record = runner.lock_status();
        while record.awaiting_stop() {
            record = runner
                .stopped
                .wait(record)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if let Err(e) = dispatched {
            error!(service = %runner.name, error = %e, "Service dispatch failed");
            return Err(e);
        }

        if let Some(message) = record.registration_error.take() {
            return Err(ServiceError::RegistrationFailed(message));
        }

        if !record.entered {
            warn!(service = %runner.name, "Dispatch returned without starting the service");
            return Err(ServiceError::NotStarted);
        }

        let outcome = RunOutcome {
            exit_code: record.exit_code,
            final_state: record.state(),
        };
        info!(
            service = %runner.name,
            exit_code = %outcome.exit_code,
            "Service dispatch finished"
        );
        Ok(outcome)
    }

    /// Entry point invoked by the host once it starts the service
    fn service_main(self: Arc<Self>, args: Vec<String>) {
        info!(service = %self.name, args = ?args, "Service entry point invoked");
        self.lock_status().entered = true;

        let on_control: ControlCallback = {
            let runner: Weak<Self> = Arc::downgrade(&self);
            Arc::new(move |code| match runner.upgrade() {
                Some(runner) => runner.on_control_request(code),
                None => ControlResponse::NotImplemented,
            })
        };

        let token = match self.host.register(&self.name, on_control) {
            Ok(token) => token,
            Err(e) => {
                // Nothing to report to without a token
                error!(service = %self.name, error = %e, "Service registration failed");
                self.lock_status().registration_error = Some(e.to_string());
                return;
            }
        };

        if self.control_token.set(token).is_err() {
            warn!(service = %self.name, "Entry point invoked twice, ignoring");
            return;
        }

        self.report_status(ServiceState::StartPending);
        self.report_status(ServiceState::Running);
        info!(service = %self.name, "Service running");

        // A panic is an abnormal exit; the lifecycle still has to reach STOPPED
        let result = catch_unwind(AssertUnwindSafe(|| self.handler.run())).unwrap_or_else(|panic| {
            Err(anyhow::anyhow!(
                "handler run panicked: {}",
                panic_message(panic.as_ref())
            ))
        });
        match &result {
            Ok(()) => info!(service = %self.name, "Handler run returned"),
            Err(e) => error!(service = %self.name, error = ?e, "Handler run failed"),
        }

        {
            let mut record = self.lock_status();
            record.exit_code = exit_code_for(&result);
            record.run_returned = true;
            self.finish_locked(&mut record);
        }

        // run() may return without any stop request from the host
        self.stop_sequence();
    }

    /// React to a control code delivered by the host
    ///
    /// Only STOP and SHUTDOWN change state, and only from RUNNING.
    pub fn on_control_request(&self, code: ControlCode) -> ControlResponse {
        debug!(service = %self.name, control = %code, "Control request received");
        match code {
            code if code.is_stop_request() => {
                self.stop_sequence();
                ControlResponse::Handled
            }
            ControlCode::Other(_) => ControlResponse::NotImplemented,
            ControlCode::Interrogate => ControlResponse::Handled,
            _ => {
                debug!(service = %self.name, control = %code, "Acknowledged without state change");
                ControlResponse::Handled
            }
        }
    }

    /// RUNNING → STOP_PENDING → (handler stop) → STOPPED, once per lifecycle
    fn stop_sequence(&self) {
        {
            let mut record = self.lock_status();
            if record.stop_requested || record.state() != ServiceState::Running {
                debug!(
                    service = %self.name,
                    state = %record.state(),
                    "Stop already handled or service not running"
                );
                return;
            }
            record.stop_requested = true;
            self.report_locked(&mut record, ServiceState::StopPending);
        }

        info!(service = %self.name, "Stopping handler");
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.handler.stop())) {
            error!(
                service = %self.name,
                panic = panic_message(panic.as_ref()),
                "Handler stop panicked"
            );
        }

        let mut record = self.lock_status();
        record.stop_returned = true;
        self.finish_locked(&mut record);
    }

    /// Report STOPPED once both `stop()` and `run()` have returned
    fn finish_locked(&self, record: &mut StatusRecord) {
        if record.ready_to_stop() {
            self.report_locked(record, ServiceState::Stopped);
            info!(
                service = %self.name,
                exit_code = %record.exit_code,
                "Service stopped"
            );
            self.stopped.notify_all();
        }
    }

    /// Store and send the snapshot for `state`
    pub(crate) fn report_status(&self, state: ServiceState) {
        let mut record = self.lock_status();
        self.report_locked(&mut record, state);
    }

    fn report_locked(&self, record: &mut StatusRecord, state: ServiceState) {
        // Status only moves forward one step at a time, or repeats
        let current = record.state();
        if state != current && state != current.next() {
            warn!(
                service = %self.name,
                from = %current,
                to = %state,
                "Refusing out-of-order status report"
            );
            return;
        }

        let Some(token) = self.control_token.get() else {
            warn!(service = %self.name, state = %state, "No control token, status not reported");
            return;
        };

        let status = ServiceStatus::for_state(state, record.exit_code, &self.timing);
        record.current = status;
        debug!(service = %self.name, status = ?status, "Reporting status");

        if let Err(e) = self.host.report(token, &status) {
            warn!(service = %self.name, state = %state, error = %e, "Failed to report status");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
