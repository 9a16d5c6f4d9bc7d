use std::sync::{Condvar, Mutex};
use std::time::Duration;
use svc_runner::{RunnerConfig, ServiceHandler};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs a heartbeat every few seconds until the service manager stops it
struct Heartbeat {
    interval: Duration,
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ServiceHandler for Heartbeat {
    fn run(&self) -> anyhow::Result<()> {
        let mut beats = 0u64;
        let mut stopped = self
            .stopped
            .lock()
            .map_err(|_| anyhow::anyhow!("heartbeat state poisoned"))?;

        while !*stopped {
            let (guard, timeout) = self
                .wake
                .wait_timeout(stopped, self.interval)
                .map_err(|_| anyhow::anyhow!("heartbeat state poisoned"))?;
            stopped = guard;

            if timeout.timed_out() {
                beats += 1;
                info!(beats, "heartbeat");
            }
        }

        info!(beats, "Heartbeat finished");
        Ok(())
    }

    fn stop(&self) {
        info!("Stop requested");
        if let Ok(mut stopped) = self.stopped.lock() {
            *stopped = true;
        }
        self.wake.notify_all();
    }
}

fn main() -> anyhow::Result<()> {
    // Service managers collect stderr; HEARTBEAT_LOG_JSON switches to JSON lines
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var_os("HEARTBEAT_LOG_JSON").is_some() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let config = RunnerConfig::builder()
        .name("Heartbeat")
        .stop_wait_hint_ms(5_000u32)
        .build()?;

    let handler = Heartbeat {
        interval: Duration::from_secs(5),
        stopped: Mutex::new(false),
        wake: Condvar::new(),
    };

    let outcome = svc_runner::run_with_config(config, handler)?;
    info!(state = %outcome.final_state, exit_code = outcome.exit_code.code(), "Service exited");
    std::process::exit(outcome.exit_code.code() as i32);
}
