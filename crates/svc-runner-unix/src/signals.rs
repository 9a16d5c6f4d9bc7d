use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use std::thread::{self, JoinHandle};
use svc_runner_core::{ControlCallback, ControlCode};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Translates process signals into control requests on a dedicated thread
///
/// | signal  | control     |
/// |---------|-------------|
/// | SIGTERM | Stop        |
/// | SIGINT  | Shutdown    |
/// | SIGCONT | Continue    |
/// | SIGHUP  | Interrogate |
///
/// The process keeps tokio's handlers for these signals after the watcher is
/// dropped, since tokio never restores a default disposition. Once the
/// service has stopped, SIGTERM and SIGINT no longer terminate the process;
/// callers that keep running afterwards have to exit on their own.
pub struct SignalWatcher {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    /// Install the signal handlers and start the watcher thread
    ///
    /// Handlers are installed before this returns, so a signal delivered
    /// afterwards always reaches `on_control`.
    pub fn spawn(service: &str, on_control: ControlCallback) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .context("Failed to build signal runtime")?;

        let (mut terminate, mut interrupt, mut resume, mut hangup) = {
            let _enter = runtime.enter();
            (
                signal(SignalKind::terminate()).context("Failed to watch SIGTERM")?,
                signal(SignalKind::interrupt()).context("Failed to watch SIGINT")?,
                signal(SignalKind::from_raw(Signal::SIGCONT as i32))
                    .context("Failed to watch SIGCONT")?,
                signal(SignalKind::hangup()).context("Failed to watch SIGHUP")?,
            )
        };

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let service_name = service.to_string();

        let thread = thread::Builder::new()
            .name(format!("{service}-signals"))
            .spawn(move || {
                let service_name = &service_name;
                runtime.block_on(async move {
                    loop {
                        let code = tokio::select! {
                            _ = &mut shutdown_rx => break,
                            Some(()) = terminate.recv() => ControlCode::Stop,
                            Some(()) = interrupt.recv() => ControlCode::Shutdown,
                            Some(()) = resume.recv() => ControlCode::Continue,
                            Some(()) = hangup.recv() => ControlCode::Interrogate,
                        };

                        info!(service = %service_name, control = %code, "Signal received");
                        let response = on_control(code);
                        debug!(service = %service_name, ?response, "Control request answered");
                    }
                });
                debug!(service = %service_name, "Signal watcher exited");
            })
            .context("Failed to spawn signal watcher thread")?;

        Ok(Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let Some(thread) = self.thread.take() else {
            return;
        };

        // The last runner reference can be released by a control callback on
        // the watcher thread itself
        if thread.thread().id() == thread::current().id() {
            return;
        }

        if thread.join().is_err() {
            warn!("Signal watcher thread panicked");
        }
    }
}
