//! Run a program as a service of the host operating system
//!
//! Implement [`ServiceHandler`] and hand it to [`run`]. The call blocks
//! until the service manager stopped the service, reporting every lifecycle
//! transition along the way:
//!
//! ```no_run
//! use svc_runner::ServiceHandler;
//!
//! struct Worker;
//!
//! impl ServiceHandler for Worker {
//!     fn run(&self) -> anyhow::Result<()> {
//!         // serve until stop() is called
//!         Ok(())
//!     }
//!
//!     fn stop(&self) {}
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let outcome = svc_runner::run("SampleSvc", Worker)?;
//!     std::process::exit(outcome.exit_code.code() as i32);
//! }
//! ```

mod factory;

pub use factory::PlatformServiceHostFactory;
pub use svc_runner_core::*;

/// Run `handler` as the named service with default timing
pub fn run<H: ServiceHandler>(
    name: impl Into<String>,
    handler: H,
) -> Result<RunOutcome, ServiceError> {
    run_with_config(RunnerConfig::new(name), handler)
}

/// Run `handler` as a service described by `config`
#[cfg(any(unix, windows))]
pub fn run_with_config<H: ServiceHandler>(
    config: RunnerConfig,
    handler: H,
) -> Result<RunOutcome, ServiceError> {
    let host = PlatformServiceHostFactory::create_host();
    tracing::info!(
        service = %config.name,
        platform = PlatformServiceHostFactory::platform_name(),
        "Starting service runner"
    );

    let result = ServiceRunner::new(config, handler, host).run();
    match &result {
        Err(e) if e.is_startup_failure() => {
            tracing::error!(error = %e, "Service never started");
        }
        Err(e) => tracing::error!(error = %e, "Service runner failed"),
        Ok(_) => {}
    }
    result
}

/// Run `handler` as a service described by `config`
#[cfg(not(any(unix, windows)))]
pub fn run_with_config<H: ServiceHandler>(
    config: RunnerConfig,
    _handler: H,
) -> Result<RunOutcome, ServiceError> {
    tracing::error!(service = %config.name, "No service host for this platform");
    Err(ServiceError::Unsupported(std::env::consts::OS))
}
