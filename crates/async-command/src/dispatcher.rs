/*
[INPUT]:  Zero-argument notification actions, operation failures
[OUTPUT]: Dispatcher / ErrorHandler capabilities + stock implementations
[POS]:    Capability layer - the single serialization point and the failure sink
[UPDATE]: When adding dispatcher flavors or changing queue shutdown semantics
*/

use std::panic::AssertUnwindSafe;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A unit of work handed to a [`Dispatcher`].
pub type DispatchAction = Box<dyn FnOnce() + Send + 'static>;

/// Marshals callbacks onto a designated execution context.
///
/// Implementations must preserve submission order when they serialize
/// actions. Returns whether the action was accepted.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, action: DispatchAction) -> bool;
}

impl<F> Dispatcher for F
where
    F: Fn(DispatchAction) -> bool + Send + Sync,
{
    fn dispatch(&self, action: DispatchAction) -> bool {
        self(action)
    }
}

/// Sink for failures escaping a command's operation. Must not panic.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, error: anyhow::Error);
}

impl<F> ErrorHandler for F
where
    F: Fn(anyhow::Error) + Send + Sync,
{
    fn handle_error(&self, error: anyhow::Error) {
        self(error)
    }
}

/// Runs every action immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, action: DispatchAction) -> bool {
        action();
        true
    }
}

/// Logs every failure through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle_error(&self, error: anyhow::Error) {
        error!(error = format_args!("{error:#}"), "command operation failed");
    }
}

/// FIFO dispatcher backed by an unbounded channel.
///
/// Actions run one at a time on the paired [`DispatchLoop`], which plays the
/// role of a UI thread.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    tx: mpsc::UnboundedSender<DispatchAction>,
}

impl QueueDispatcher {
    /// Create a dispatcher and the loop that drains it.
    pub fn new() -> (Self, DispatchLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DispatchLoop { rx })
    }

    /// Create a dispatcher and spawn its loop on the current runtime.
    ///
    /// The join handle resolves to the number of actions executed.
    pub fn spawn(shutdown: CancellationToken) -> (Self, JoinHandle<usize>) {
        let (dispatcher, event_loop) = Self::new();
        let handle = tokio::spawn(event_loop.run(shutdown));
        (dispatcher, handle)
    }

    /// Whether the loop side is still accepting actions.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, action: DispatchAction) -> bool {
        self.tx.send(action).is_ok()
    }
}

/// Receiving half of a [`QueueDispatcher`].
#[derive(Debug)]
pub struct DispatchLoop {
    rx: mpsc::UnboundedReceiver<DispatchAction>,
}

impl DispatchLoop {
    /// Execute queued actions in submission order until `shutdown` fires or
    /// every dispatcher handle is dropped.
    ///
    /// Actions already queued when shutdown fires are still executed.
    pub async fn run(mut self, shutdown: CancellationToken) -> usize {
        let mut executed = 0usize;

        loop {
            tokio::select! {
                biased;
                action = self.rx.recv() => {
                    let Some(action) = action else {
                        debug!(executed, "dispatch queue closed");
                        break;
                    };
                    run_action(action);
                    executed += 1;
                }
                _ = shutdown.cancelled() => {
                    self.rx.close();
                    while let Ok(action) = self.rx.try_recv() {
                        run_action(action);
                        executed += 1;
                    }
                    debug!(executed, "dispatch loop shut down");
                    break;
                }
            }
        }

        executed
    }
}

fn run_action(action: DispatchAction) {
    if std::panic::catch_unwind(AssertUnwindSafe(action)).is_err() {
        warn!("dispatched action panicked; continuing with next action");
    }
}
