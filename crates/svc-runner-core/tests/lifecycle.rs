use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use svc_runner_core::{
    AcceptedControls, ControlCallback, ControlCode, ControlResponse, DispatchSlot, EntryPoint,
    RunnerConfig, ServiceError, ServiceExitCode, ServiceHandler, ServiceHost, ServiceRunner,
    ServiceSpecificError, ServiceState, ServiceStatus,
};

/// In-memory service manager that runs the entry point on its own service thread
#[derive(Default)]
struct MockHost {
    slot: Arc<DispatchSlot<()>>,
    fail_registration: bool,
    skip_entry: bool,
    dispatch_error: Option<&'static str>,
    on_control: Mutex<Option<ControlCallback>>,
    reports: Mutex<Vec<ServiceStatus>>,
}

impl MockHost {
    fn with_slot(slot: Arc<DispatchSlot<()>>) -> Self {
        Self {
            slot,
            ..Default::default()
        }
    }

    fn send(&self, code: ControlCode) -> ControlResponse {
        let callback = self
            .on_control
            .lock()
            .unwrap()
            .clone()
            .expect("service registered a control callback");
        callback(code)
    }

    fn reports(&self) -> Vec<ServiceStatus> {
        self.reports.lock().unwrap().clone()
    }

    fn states(&self) -> Vec<ServiceState> {
        self.reports().iter().map(|s| s.state).collect()
    }

    fn last_state(&self) -> Option<ServiceState> {
        self.reports().last().map(|s| s.state)
    }
}

impl ServiceHost for MockHost {
    type Token = String;

    fn register(&self, name: &str, on_control: ControlCallback) -> Result<String, ServiceError> {
        if self.fail_registration {
            return Err(ServiceError::registration_failed(format!(
                "service {name} is not installed"
            )));
        }
        *self.on_control.lock().unwrap() = Some(on_control);
        Ok(format!("token:{name}"))
    }

    fn report(&self, token: &String, status: &ServiceStatus) -> Result<(), ServiceError> {
        assert!(token.starts_with("token:"));
        self.reports.lock().unwrap().push(*status);
        Ok(())
    }

    fn start_dispatch(&self, name: &str, entry: EntryPoint) -> Result<(), ServiceError> {
        let _guard = self.slot.claim(name, ())?;

        if let Some(message) = self.dispatch_error {
            return Err(ServiceError::dispatch(message));
        }
        if self.skip_entry {
            return Ok(());
        }

        let args = vec![name.to_string()];
        let service_thread = thread::Builder::new()
            .name("service-main".to_string())
            .spawn(move || entry(args))
            .map_err(|e| ServiceError::Other(e.into()))?;
        service_thread
            .join()
            .map_err(|_| ServiceError::dispatch("service thread panicked"))
    }

    fn platform_name(&self) -> &'static str {
        "mock"
    }
}

/// Handler whose `run()` blocks until `stop()` is called
#[derive(Default)]
struct BlockingHandler {
    stopped: Mutex<bool>,
    wake: Condvar,
    run_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    failure: Option<u32>,
}

impl ServiceHandler for BlockingHandler {
    fn run(&self) -> anyhow::Result<()> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let mut stopped = self.stopped.lock().unwrap();
        while !*stopped {
            stopped = self.wake.wait(stopped).unwrap();
        }
        match self.failure {
            Some(code) => Err(ServiceSpecificError(code)).context("worker loop failed"),
            None => Ok(()),
        }
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.stopped.lock().unwrap() = true;
        self.wake.notify_all();
    }
}

/// Handler whose `run()` finishes on its own
#[derive(Default)]
struct OneShotHandler {
    run_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl ServiceHandler for OneShotHandler {
    fn run(&self) -> anyhow::Result<()> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Where `PanickingHandler` panics
#[derive(Clone, Copy, PartialEq, Eq)]
enum PanicAt {
    RunStart,
    RunAfterStop,
    Stop,
}

/// Handler that panics at a chosen point of the lifecycle
struct PanickingHandler {
    at: PanicAt,
    stopped: Mutex<bool>,
    wake: Condvar,
    stop_calls: AtomicUsize,
}

impl PanickingHandler {
    fn new(at: PanicAt) -> Self {
        Self {
            at,
            stopped: Mutex::new(false),
            wake: Condvar::new(),
            stop_calls: AtomicUsize::new(0),
        }
    }
}

impl ServiceHandler for PanickingHandler {
    fn run(&self) -> anyhow::Result<()> {
        if self.at == PanicAt::RunStart {
            panic!("worker failed to start");
        }
        let mut stopped = self.stopped.lock().unwrap();
        while !*stopped {
            stopped = self.wake.wait(stopped).unwrap();
        }
        drop(stopped);
        if self.at == PanicAt::RunAfterStop {
            panic!("worker failed while draining");
        }
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.stopped.lock().unwrap() = true;
        self.wake.notify_all();
        if self.at == PanicAt::Stop {
            panic!("stop failed after releasing the worker");
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        thread::sleep(Duration::from_millis(5));
    }
}

fn spawn_runner<H: ServiceHandler>(
    host: &Arc<MockHost>,
    handler: H,
) -> thread::JoinHandle<Result<svc_runner_core::RunOutcome, ServiceError>> {
    let runner = ServiceRunner::new(RunnerConfig::new("SampleSvc"), handler, host.clone());
    thread::spawn(move || runner.run())
}

#[test]
fn test_stop_request_drives_full_lifecycle() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(BlockingHandler::default());
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    assert_eq!(host.send(ControlCode::Stop), ControlResponse::Handled);

    let outcome = running.join().unwrap().unwrap();
    assert_eq!(outcome.final_state, ServiceState::Stopped);
    assert_eq!(outcome.exit_code, ServiceExitCode::Success);

    assert_eq!(
        host.states(),
        vec![
            ServiceState::StartPending,
            ServiceState::Running,
            ServiceState::StopPending,
            ServiceState::Stopped,
        ]
    );
    assert_eq!(handler.run_calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_behaves_like_stop() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(BlockingHandler::default());
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    host.send(ControlCode::Shutdown);

    running.join().unwrap().unwrap();
    assert_eq!(host.last_state(), Some(ServiceState::Stopped));
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registration_failure_never_runs_handler() {
    init_tracing();
    let host = Arc::new(MockHost {
        fail_registration: true,
        ..Default::default()
    });
    let handler = Arc::new(BlockingHandler::default());

    let started = Instant::now();
    let result =
        ServiceRunner::new(RunnerConfig::new("SampleSvc"), handler.clone(), host.clone()).run();

    assert!(matches!(result, Err(ServiceError::RegistrationFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(host.reports().is_empty());
    assert_eq!(handler.run_calls.load(Ordering::SeqCst), 0);
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pause_while_running_is_acknowledged_silently() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(BlockingHandler::default());
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    let before = host.reports().len();

    assert_eq!(host.send(ControlCode::Pause), ControlResponse::Handled);
    assert_eq!(host.send(ControlCode::Continue), ControlResponse::Handled);
    assert_eq!(host.send(ControlCode::Interrogate), ControlResponse::Handled);
    assert_eq!(
        host.send(ControlCode::Other(129)),
        ControlResponse::NotImplemented
    );

    assert_eq!(host.reports().len(), before);
    assert_eq!(host.last_state(), Some(ServiceState::Running));
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 0);

    host.send(ControlCode::Stop);
    running.join().unwrap().unwrap();
}

#[test]
fn test_handler_finishing_on_its_own_still_stops_cleanly() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(OneShotHandler::default());

    let outcome = ServiceRunner::new(RunnerConfig::new("SampleSvc"), handler.clone(), host.clone())
        .run()
        .unwrap();

    assert_eq!(outcome.final_state, ServiceState::Stopped);
    assert_eq!(
        host.states(),
        vec![
            ServiceState::StartPending,
            ServiceState::Running,
            ServiceState::StopPending,
            ServiceState::Stopped,
        ]
    );
    assert_eq!(handler.run_calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_handler_failure_reports_service_specific_exit_code() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(BlockingHandler {
        failure: Some(42),
        ..Default::default()
    });
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    host.send(ControlCode::Stop);

    let outcome = running.join().unwrap().unwrap();
    assert_eq!(outcome.exit_code, ServiceExitCode::ServiceSpecific(42));

    let last = *host.reports().last().unwrap();
    assert_eq!(last.state, ServiceState::Stopped);
    assert_eq!(last.exit_code, ServiceExitCode::ServiceSpecific(42));
}

#[test]
fn test_repeated_stop_requests_stop_handler_once() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(BlockingHandler::default());
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));

    let senders: Vec<_> = [ControlCode::Stop, ControlCode::Shutdown, ControlCode::Stop]
        .into_iter()
        .map(|code| {
            let host = host.clone();
            thread::spawn(move || host.send(code))
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }

    running.join().unwrap().unwrap();
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 1);

    let states = host.states();
    let count = |wanted| states.iter().filter(|s| **s == wanted).count();
    assert_eq!(count(ServiceState::StopPending), 1);
    assert_eq!(count(ServiceState::Stopped), 1);
}

#[test]
fn test_reported_masks_follow_state() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(BlockingHandler::default());
    let running = spawn_runner(&host, handler);

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    host.send(ControlCode::Stop);
    running.join().unwrap().unwrap();

    for status in host.reports() {
        match status.state {
            ServiceState::Running => assert_eq!(
                status.controls_accepted,
                AcceptedControls::STOP | AcceptedControls::SHUTDOWN
            ),
            _ => assert!(status.controls_accepted.is_empty()),
        }
    }
}

#[test]
fn test_dispatch_without_entry_reports_not_started() {
    init_tracing();
    let host = Arc::new(MockHost {
        skip_entry: true,
        ..Default::default()
    });
    let handler = Arc::new(OneShotHandler::default());

    let result =
        ServiceRunner::new(RunnerConfig::new("SampleSvc"), handler.clone(), host.clone()).run();

    assert!(matches!(result, Err(ServiceError::NotStarted)));
    assert_eq!(handler.run_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dispatch_error_is_returned() {
    init_tracing();
    let host = Arc::new(MockHost {
        dispatch_error: Some("not launched by the service manager"),
        ..Default::default()
    });

    let result = ServiceRunner::new(
        RunnerConfig::new("SampleSvc"),
        OneShotHandler::default(),
        host.clone(),
    )
    .run();

    match result {
        Err(ServiceError::Dispatch(message)) => assert!(message.contains("not launched")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(host.reports().is_empty());
}

#[test]
fn test_second_concurrent_run_is_rejected() {
    init_tracing();
    let slot = Arc::new(DispatchSlot::new());
    let first_host = Arc::new(MockHost::with_slot(slot.clone()));
    let handler = Arc::new(BlockingHandler::default());
    let running = spawn_runner(&first_host, handler.clone());

    wait_until(|| first_host.last_state() == Some(ServiceState::Running));

    let second_host = Arc::new(MockHost::with_slot(slot.clone()));
    let second = ServiceRunner::new(
        RunnerConfig::new("OtherSvc"),
        OneShotHandler::default(),
        second_host.clone(),
    )
    .run();

    match second {
        Err(ServiceError::AlreadyRunning { active }) => assert_eq!(active, "SampleSvc"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(second_host.reports().is_empty());

    first_host.send(ControlCode::Stop);
    running.join().unwrap().unwrap();

    // The slot is free again once the first lifecycle unwound
    assert!(!slot.is_occupied());
}

fn full_lifecycle() -> Vec<ServiceState> {
    vec![
        ServiceState::StartPending,
        ServiceState::Running,
        ServiceState::StopPending,
        ServiceState::Stopped,
    ]
}

#[test]
fn test_run_panicking_immediately_still_reaches_stopped() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(PanickingHandler::new(PanicAt::RunStart));

    let outcome = ServiceRunner::new(RunnerConfig::new("SampleSvc"), handler.clone(), host.clone())
        .run()
        .unwrap();

    assert_eq!(outcome.final_state, ServiceState::Stopped);
    assert_eq!(outcome.exit_code, ServiceExitCode::ServiceSpecific(1));
    assert_eq!(host.states(), full_lifecycle());
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_run_panicking_after_stop_does_not_hang() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(PanickingHandler::new(PanicAt::RunAfterStop));
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    assert_eq!(host.send(ControlCode::Stop), ControlResponse::Handled);

    wait_until(|| running.is_finished());
    let outcome = running.join().unwrap().unwrap();
    assert_eq!(outcome.exit_code, ServiceExitCode::ServiceSpecific(1));
    assert_eq!(host.states(), full_lifecycle());

    let last = *host.reports().last().unwrap();
    assert_eq!(last.exit_code, ServiceExitCode::ServiceSpecific(1));
}

#[test]
fn test_stop_panicking_counts_as_returned() {
    init_tracing();
    let host = Arc::new(MockHost::default());
    let handler = Arc::new(PanickingHandler::new(PanicAt::Stop));
    let running = spawn_runner(&host, handler.clone());

    wait_until(|| host.last_state() == Some(ServiceState::Running));
    assert_eq!(host.send(ControlCode::Stop), ControlResponse::Handled);

    wait_until(|| running.is_finished());
    let outcome = running.join().unwrap().unwrap();
    assert_eq!(outcome.final_state, ServiceState::Stopped);
    assert_eq!(outcome.exit_code, ServiceExitCode::Success);
    assert_eq!(host.states(), full_lifecycle());
    assert_eq!(handler.stop_calls.load(Ordering::SeqCst), 1);
}
