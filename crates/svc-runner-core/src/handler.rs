use crate::status::ServiceExitCode;
use anyhow::Result;
use std::sync::Arc;

/// Exit code used when a handler fails without naming one
pub const DEFAULT_FAILURE_EXIT_CODE: u32 = 1;

/// Unit of work adapted to the host's service protocol
///
/// `run()` executes on the service thread and blocks for the lifetime of the
/// service. `stop()` is called from the host's control thread while `run()` is
/// still executing, or after it returned on its own, and must make `run()`
/// return cooperatively.
pub trait ServiceHandler: Send + Sync + 'static {
    /// Do the work until finished or until asked to stop
    fn run(&self) -> Result<()>;

    /// Request cooperative termination of `run()`
    fn stop(&self);
}

impl<H: ServiceHandler> ServiceHandler for Arc<H> {
    fn run(&self) -> Result<()> {
        (**self).run()
    }

    fn stop(&self) {
        (**self).stop()
    }
}

impl ServiceHandler for Box<dyn ServiceHandler> {
    fn run(&self) -> Result<()> {
        (**self).run()
    }

    fn stop(&self) {
        (**self).stop()
    }
}

/// Error a handler returns to report a service specific exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("service exited with code {0}")]
pub struct ServiceSpecificError(pub u32);

/// Exit code for the outcome of a handler's `run()`
///
/// A `ServiceSpecificError` anywhere in the error chain supplies the code.
pub fn exit_code_for(result: &Result<()>) -> ServiceExitCode {
    match result {
        Ok(()) => ServiceExitCode::Success,
        Err(error) => {
            let code = error
                .chain()
                .find_map(|cause| cause.downcast_ref::<ServiceSpecificError>())
                .map(|specific| specific.0)
                .unwrap_or(DEFAULT_FAILURE_EXIT_CODE);

            // Zero would read as success to the host manager
            ServiceExitCode::ServiceSpecific(code.max(DEFAULT_FAILURE_EXIT_CODE))
        }
    }
}
