/*
[INPUT]:  Test scenarios needing collaborators and observation hooks
[OUTPUT]: Recording error handler, counting dispatcher, event log, polling helper
[POS]:    Test infrastructure - shared across all integration test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for async-command tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_command::{
    AsyncCommand, CommandEvent, CommandFactory, DispatchAction, Dispatcher, ErrorHandler,
    PropertyChange,
};
use tokio::time::Instant;
use wiremock::MockServer;

/// Error handler that keeps every error it receives.
#[derive(Default)]
pub struct RecordingErrorHandler {
    errors: Mutex<Vec<anyhow::Error>>,
}

impl RecordingErrorHandler {
    pub fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap()
            .iter()
            .map(|err| format!("{err:#}"))
            .collect()
    }

    /// Run `f` against the recorded errors.
    #[allow(dead_code)]
    pub fn inspect<R>(&self, f: impl FnOnce(&[anyhow::Error]) -> R) -> R {
        f(&self.errors.lock().unwrap())
    }
}

impl ErrorHandler for RecordingErrorHandler {
    fn handle_error(&self, error: anyhow::Error) {
        self.errors.lock().unwrap().push(error);
    }
}

/// Inline dispatcher that counts the actions it ran.
#[derive(Default)]
pub struct CountingDispatcher {
    dispatched: AtomicUsize,
}

impl CountingDispatcher {
    #[allow(dead_code)]
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

impl Dispatcher for CountingDispatcher {
    fn dispatch(&self, action: DispatchAction) -> bool {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        action();
        true
    }
}

pub struct Harness {
    pub dispatcher: Arc<CountingDispatcher>,
    pub errors: Arc<RecordingErrorHandler>,
    pub factory: CommandFactory,
}

pub fn harness() -> Harness {
    let dispatcher = Arc::new(CountingDispatcher::default());
    let errors = Arc::new(RecordingErrorHandler::default());
    let factory = CommandFactory::new(dispatcher.clone(), errors.clone());
    Harness {
        dispatcher,
        errors,
        factory,
    }
}

/// Setup a mock HTTP server for testing
#[allow(dead_code)]
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Subscribe and collect every event the command emits.
#[allow(dead_code)]
pub fn record_events<P>(command: &AsyncCommand<P>) -> Arc<Mutex<Vec<CommandEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    command.subscribe(move |event: &CommandEvent| {
        events_clone.lock().unwrap().push(event.clone());
    });
    events
}

#[allow(dead_code)]
pub fn progress_values(events: &[CommandEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            CommandEvent::PropertyChanged(PropertyChange::Progress(value)) => Some(*value),
            _ => None,
        })
        .collect()
}

#[allow(dead_code)]
pub fn busy_values(events: &[CommandEvent]) -> Vec<bool> {
    events
        .iter()
        .filter_map(|event| match event {
            CommandEvent::PropertyChanged(PropertyChange::IsBusy(value)) => Some(*value),
            _ => None,
        })
        .collect()
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return;
        }
        if Instant::now() >= deadline {
            panic!("timed out after {timeout:?} waiting for condition");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
