/*
[INPUT]:  Operation + eligibility predicate, Dispatcher, ErrorHandler, execute/cancel calls
[OUTPUT]: Busy/progress/title state with dispatcher-routed change notifications
[POS]:    Core state machine - at most one in-flight run per command
[UPDATE]: When changing run lifecycle, cancellation, or failure routing
*/

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatcher::{Dispatcher, ErrorHandler};
use crate::error::{CommandError, Result, is_cancellation};
use crate::notify::{CommandEvent, Notifier, PropertyChange, SubscriptionId};
use crate::operation::{self, Capabilities, Operation, OperationContext, Predicate};
use crate::progress::{ProgressSink, TitleSink};

/// How a call to `execute_async` ended.
///
/// Never carries the operation's error; that goes to the [`ErrorHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Not eligible (busy or predicate denied); nothing happened
    Skipped,
    /// The operation finished normally
    Completed,
    /// The operation stopped after cancellation was requested
    Cancelled,
    /// The operation failed and the error was handed to the error handler
    Failed,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Skipped => "skipped",
            ExecutionOutcome::Completed => "completed",
            ExecutionOutcome::Cancelled => "cancelled",
            ExecutionOutcome::Failed => "failed",
        }
    }
}

/// Point-in-time view of a command's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSnapshot {
    pub id: Uuid,
    pub title: String,
    pub is_busy: bool,
    pub progress: u8,
}

#[derive(Debug)]
struct ActiveRun {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug)]
struct CoreState {
    title: String,
    progress: u8,
    active_run: Option<ActiveRun>,
}

/// Parameter-independent half of a command: state, gating, notifications.
pub(crate) struct CommandCore {
    id: Uuid,
    original_title: String,
    reset_title_on_complete: bool,
    busy: AtomicBool,
    disposed: AtomicBool,
    run_counter: AtomicU64,
    state: Mutex<CoreState>,
    /// Held across every busy flip and the notifications it raises.
    transition: Mutex<()>,
    notifier: Notifier,
}

impl CommandCore {
    fn new(title: String, reset_title_on_complete: bool, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_title: title.clone(),
            reset_title_on_complete,
            busy: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            run_counter: AtomicU64::new(0),
            state: Mutex::new(CoreState {
                title,
                progress: 0,
                active_run: None,
            }),
            transition: Mutex::new(()),
            notifier: Notifier::new(dispatcher),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        // No user code runs under this lock.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn title(&self) -> String {
        self.lock().title.clone()
    }

    fn progress(&self) -> u8 {
        self.lock().progress
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_title(&self, title: String) {
        {
            let mut state = self.lock();
            if state.title == title {
                return;
            }
            state.title = title.clone();
        }
        self.notifier.property_changed(PropertyChange::Title(title));
    }

    pub(crate) fn report_title(&self, run_id: u64, title: String) -> bool {
        {
            let mut state = self.lock();
            if !is_current(&state, run_id) {
                debug!(command_id = %self.id, run_id, "dropping title report from finished run");
                return false;
            }
            if state.title == title {
                return true;
            }
            state.title = title.clone();
        }
        self.notifier.property_changed(PropertyChange::Title(title));
        true
    }

    pub(crate) fn report_progress(&self, run_id: u64, progress: u8) -> bool {
        {
            let mut state = self.lock();
            if !is_current(&state, run_id) {
                debug!(command_id = %self.id, run_id, "dropping progress report from finished run");
                return false;
            }
            if state.progress == progress {
                return true;
            }
            state.progress = progress;
        }
        self.notifier.property_changed(PropertyChange::Progress(progress));
        true
    }

    /// Atomically move Idle -> Running. `None` if a run is already in flight
    /// or another transition is still raising its notifications.
    fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        // try_lock: a start from inside a transition's own dispatch must not block.
        let _transition = match self.transition.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!(command_id = %self.id, "busy transition in progress; not starting");
                return None;
            }
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let run_id = self.run_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let progress_reset = {
            let mut state = self.lock();
            state.active_run = Some(ActiveRun {
                id: run_id,
                token: token.clone(),
            });
            let changed = state.progress != 0;
            state.progress = 0;
            changed
        };

        if progress_reset {
            self.notifier.property_changed(PropertyChange::Progress(0));
        }
        self.notifier.property_changed(PropertyChange::IsBusy(true));
        self.notifier.can_execute_changed();

        debug!(command_id = %self.id, title = %self.original_title, run_id, "command started");
        Some(RunGuard {
            core: self.clone(),
            run_id,
            token,
        })
    }

    /// Running -> Idle for `run_id`; restores the title when configured.
    fn finish(&self, run_id: u64) {
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let reset_title = {
            let mut state = self.lock();
            if !is_current(&state, run_id) {
                return;
            }
            state.active_run = None;
            if self.reset_title_on_complete && state.title != self.original_title {
                state.title = self.original_title.clone();
                Some(state.title.clone())
            } else {
                None
            }
        };
        self.busy.store(false, Ordering::Release);

        self.notifier.property_changed(PropertyChange::IsBusy(false));
        self.notifier.can_execute_changed();
        if let Some(title) = reset_title {
            self.notifier.property_changed(PropertyChange::Title(title));
        }
    }

    fn cancel(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        let state = self.lock();
        match &state.active_run {
            Some(run) if !run.token.is_cancelled() => {
                run.token.cancel();
                debug!(command_id = %self.id, run_id = run.id, "cancellation requested");
                true
            }
            _ => false,
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(run) = &self.lock().active_run {
            run.token.cancel();
        }
        self.notifier.registry().clear();
        debug!(command_id = %self.id, "command disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for CommandCore {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(run) = state.active_run.take() {
            run.token.cancel();
        }
    }
}

fn is_current(state: &CoreState, run_id: u64) -> bool {
    state.active_run.as_ref().is_some_and(|run| run.id == run_id)
}

/// Finishes the run when dropped, including when the run future is dropped
/// mid-flight or the error handler panics.
struct RunGuard {
    core: Arc<CommandCore>,
    run_id: u64,
    token: CancellationToken,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.core.finish(self.run_id);
    }
}

struct CommandInner<P> {
    core: Arc<CommandCore>,
    operation: Operation<P>,
    can_execute: Option<Predicate<P>>,
    capabilities: Capabilities,
    error_handler: Arc<dyn ErrorHandler>,
}

/// Stateful handle wrapping one cancellable, progress-reporting async
/// operation with busy-state mutual exclusion.
///
/// Cloning yields another handle to the same command. `P` is the parameter
/// passed to the operation and to the eligibility predicate; plain commands
/// use `P = ()`.
pub struct AsyncCommand<P = ()> {
    inner: Arc<CommandInner<P>>,
}

impl<P> Clone for AsyncCommand<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> fmt::Debug for AsyncCommand<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = &self.inner.core;
        f.debug_struct("AsyncCommand")
            .field("id", &core.id)
            .field("title", &core.title())
            .field("is_busy", &core.is_busy())
            .field("progress", &core.progress())
            .finish()
    }
}

impl AsyncCommand<()> {
    /// Create a plain command whose operation receives the run context.
    pub fn new<F, Fut>(
        title: impl Into<String>,
        operation: F,
        dispatcher: Arc<dyn Dispatcher>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_parts(
            title.into(),
            operation::contextual(operation),
            Capabilities::FULL,
            None,
            true,
            dispatcher,
            error_handler,
        )
    }

    pub fn can_execute(&self) -> bool {
        self.can_execute_with(&())
    }

    /// Fire-and-forget; see [`AsyncCommand::execute_with`].
    pub fn execute(&self) -> Result<()> {
        self.execute_with(())
    }

    /// Run to completion; see [`AsyncCommand::execute_async_with`].
    pub async fn execute_async(&self) -> Result<ExecutionOutcome> {
        self.execute_async_with(()).await
    }
}

impl<P> AsyncCommand<P> {
    pub(crate) fn from_parts(
        title: String,
        operation: Operation<P>,
        capabilities: Capabilities,
        can_execute: Option<Predicate<P>>,
        reset_title_on_complete: bool,
        dispatcher: Arc<dyn Dispatcher>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(CommandInner {
                core: Arc::new(CommandCore::new(title, reset_title_on_complete, dispatcher)),
                operation,
                can_execute,
                capabilities,
                error_handler,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.core.id
    }

    /// Current display title.
    pub fn title(&self) -> String {
        self.inner.core.title()
    }

    /// Title captured at construction.
    pub fn original_title(&self) -> &str {
        &self.inner.core.original_title
    }

    pub fn is_busy(&self) -> bool {
        self.inner.core.is_busy()
    }

    /// Last reported progress of the current (or last) run.
    pub fn progress(&self) -> u8 {
        self.inner.core.progress()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    pub fn reset_title_on_complete(&self) -> bool {
        self.inner.core.reset_title_on_complete
    }

    pub fn snapshot(&self) -> CommandSnapshot {
        let core = &self.inner.core;
        let state = core.lock();
        CommandSnapshot {
            id: core.id,
            title: state.title.clone(),
            is_busy: core.is_busy(),
            progress: state.progress,
        }
    }

    /// Request cancellation of the in-flight run.
    ///
    /// Advisory only: the operation has to observe its token. Returns `true`
    /// when this call signalled the scope; `false` when idle or already
    /// signalled.
    pub fn cancel(&self) -> bool {
        self.inner.core.cancel()
    }

    /// Set the title directly, outside the run-bound title sink.
    pub fn update_title(&self, title: impl Into<String>) {
        self.inner.core.set_title(title.into());
    }

    /// Tell observers that eligibility may have changed.
    pub fn raise_can_execute_changed(&self) {
        self.inner.core.notifier.can_execute_changed();
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CommandEvent) + Send + Sync + 'static,
    {
        self.inner.core.notifier.registry().subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.core.notifier.registry().unsubscribe(id)
    }

    /// Detach every subscriber and release the active cancellation scope.
    ///
    /// Idempotent. Executing afterwards returns [`CommandError::Disposed`].
    pub fn dispose(&self) {
        self.inner.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.core.is_disposed()
    }
}

impl<P: Send + 'static> AsyncCommand<P> {
    /// Create a command whose operation receives the parameter and the run context.
    pub fn with_parameter<F, Fut>(
        title: impl Into<String>,
        operation: F,
        dispatcher: Arc<dyn Dispatcher>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self
    where
        F: Fn(P, OperationContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_parts(
            title.into(),
            operation::with_parameter(operation),
            Capabilities::FULL,
            None,
            true,
            dispatcher,
            error_handler,
        )
    }

    /// `false` while busy; otherwise the predicate's answer (default `true`).
    pub fn can_execute_with(&self, param: &P) -> bool {
        if self.is_busy() {
            return false;
        }
        self.inner
            .can_execute
            .as_ref()
            .is_none_or(|predicate| predicate(param))
    }

    /// Fire-and-forget entry point.
    ///
    /// Eligibility and the busy transition happen before returning; the
    /// operation then runs on the current Tokio runtime. Operation failures
    /// go to the error handler. Ineligible calls are a no-op.
    pub fn execute_with(&self, param: P) -> Result<()> {
        self.ensure_not_disposed()?;
        if !self.is_eligible(&param) {
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CommandError::NoRuntime);
        }

        let Some(guard) = self.inner.core.try_begin() else {
            return Ok(());
        };

        let this = self.clone();
        tokio::spawn(async move {
            this.run(guard, param).await;
        });
        Ok(())
    }

    /// Awaitable entry point.
    ///
    /// `Err` only for precondition violations; the operation's own failure
    /// is routed to the error handler and reported as
    /// [`ExecutionOutcome::Failed`].
    pub async fn execute_async_with(&self, param: P) -> Result<ExecutionOutcome> {
        self.ensure_not_disposed()?;
        if !self.is_eligible(&param) {
            return Ok(ExecutionOutcome::Skipped);
        }
        let Some(guard) = self.inner.core.try_begin() else {
            return Ok(ExecutionOutcome::Skipped);
        };
        Ok(self.run(guard, param).await)
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            warn!(command_id = %self.id(), "execute called on disposed command");
            return Err(CommandError::Disposed);
        }
        Ok(())
    }

    fn is_eligible(&self, param: &P) -> bool {
        let eligible = self.can_execute_with(param);
        if !eligible {
            debug!(command_id = %self.id(), "command not eligible; skipping");
        }
        eligible
    }

    async fn run(&self, guard: RunGuard, param: P) -> ExecutionOutcome {
        let core = &self.inner.core;
        let ctx = OperationContext::new(
            guard.token.clone(),
            ProgressSink::attached(core.clone(), guard.run_id),
            TitleSink::attached(core.clone(), guard.run_id),
        );

        let operation = &self.inner.operation;
        let result = match std::panic::catch_unwind(AssertUnwindSafe(|| operation(param, ctx))) {
            Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(CommandError::from_panic(payload).into()),
            },
            Err(payload) => Err(CommandError::from_panic(payload).into()),
        };

        let outcome = match result {
            Ok(()) if guard.token.is_cancelled() => ExecutionOutcome::Cancelled,
            Ok(()) => ExecutionOutcome::Completed,
            Err(err) if is_cancellation(&err) => ExecutionOutcome::Cancelled,
            Err(err) => {
                debug!(command_id = %core.id, run_id = guard.run_id, error = %err, "operation failed");
                self.inner.error_handler.handle_error(err);
                ExecutionOutcome::Failed
            }
        };

        let run_id = guard.run_id;
        drop(guard);
        debug!(command_id = %core.id, run_id, outcome = outcome.as_str(), "command finished");
        outcome
    }
}
