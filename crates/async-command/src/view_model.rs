/*
[INPUT]:  Ad hoc async actions, standing commands, optional external CancellationToken
[OUTPUT]: Busy / loading-text / title state with dispatcher-routed notifications
[POS]:    Orchestration layer - busy discipline without a standing command
[UPDATE]: When changing busy accounting or the cancellation race
*/

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::{AsyncCommand, ExecutionOutcome};
use crate::dispatcher::ErrorHandler;
use crate::error::{CommandError, Result, is_cancellation};
use crate::factory::CommandFactory;
use crate::notify::{CommandEvent, Notifier, PropertyChange, SubscriptionId};
use crate::operation::OperationContext;

/// How a busy task ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyOutcome {
    Completed,
    /// The action failed; the error went to the error handler
    Failed,
    /// The action reported cancellation, or the caller's token fired first
    Cancelled,
}

#[derive(Debug, Default)]
struct ViewState {
    title: String,
    loading_text: String,
}

struct ViewModelInner {
    factory: CommandFactory,
    notifier: Notifier,
    busy_depth: AtomicUsize,
    /// Held across a depth change and the `IsBusy` notification it raises.
    busy_transition: Mutex<()>,
    state: Mutex<ViewState>,
}

impl ViewModelInner {
    fn lock_busy_transition(&self) -> MutexGuard<'_, ()> {
        self.busy_transition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Base for screens that run async work under a busy indicator.
///
/// `is_busy` stays true while at least one busy task is running.
#[derive(Clone)]
pub struct ViewModel {
    inner: Arc<ViewModelInner>,
}

impl ViewModel {
    pub fn new(factory: CommandFactory) -> Self {
        let notifier = Notifier::new(factory.dispatcher().clone());
        Self {
            inner: Arc::new(ViewModelInner {
                factory,
                notifier,
                busy_depth: AtomicUsize::new(0),
                busy_transition: Mutex::new(()),
                state: Mutex::new(ViewState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn factory(&self) -> &CommandFactory {
        &self.inner.factory
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        {
            let mut state = self.lock();
            if state.title == title {
                return;
            }
            state.title = title.clone();
        }
        self.inner
            .notifier
            .property_changed(PropertyChange::Title(title));
    }

    pub fn loading_text(&self) -> String {
        self.lock().loading_text.clone()
    }

    pub fn set_loading_text(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut state = self.lock();
            if state.loading_text == text {
                return;
            }
            state.loading_text = text.clone();
        }
        self.inner
            .notifier
            .property_changed(PropertyChange::LoadingText(text));
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy_depth.load(Ordering::Acquire) > 0
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CommandEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.registry().subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.registry().unsubscribe(id)
    }

    /// Tell views to re-query the commands this view model exposes.
    pub fn raise_can_execute_changed(&self) {
        self.inner.notifier.can_execute_changed();
    }

    /// Run `action` while `is_busy` is set, racing it against `cancel`.
    ///
    /// When `cancel` fires first this returns [`BusyOutcome::Cancelled`]
    /// right away, but the action keeps running in the background unless it
    /// observes the same token itself. Failures of the action reach the
    /// error handler either way.
    pub async fn perform_busy_task<Fut>(
        &self,
        action: Fut,
        cancel: Option<CancellationToken>,
        loading_text: impl Into<String>,
    ) -> BusyOutcome
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let _busy = self.enter_busy(loading_text.into());
        let error_handler = self.inner.factory.error_handler().clone();

        let mut task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(action).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(CommandError::from_panic(payload).into()),
            };
            match result {
                Ok(()) => BusyOutcome::Completed,
                Err(err) if is_cancellation(&err) => BusyOutcome::Cancelled,
                Err(err) => {
                    error_handler.handle_error(err);
                    BusyOutcome::Failed
                }
            }
        });

        let cancel = cancel.unwrap_or_default();
        tokio::select! {
            biased;
            joined = &mut task => match joined {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    debug!(error = %join_err, "busy task did not run to completion");
                    BusyOutcome::Cancelled
                }
            },
            _ = cancel.cancelled() => {
                debug!("busy task detached after cancellation");
                BusyOutcome::Cancelled
            }
        }
    }

    /// Run a standing command under this view model's busy flag.
    pub async fn perform_busy_command(
        &self,
        command: &AsyncCommand<()>,
        loading_text: impl Into<String>,
    ) -> Result<ExecutionOutcome> {
        let _busy = self.enter_busy(loading_text.into());
        command.execute_async().await
    }

    /// Build a throwaway command around `operation`, run it busy, dispose it.
    pub async fn perform_busy_operation<F, Fut>(
        &self,
        operation: F,
        loading_text: impl Into<String>,
    ) -> Result<ExecutionOutcome>
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let loading_text = loading_text.into();
        let command = self.inner.factory.create(loading_text.clone(), operation);
        let outcome = self.perform_busy_command(&command, loading_text).await;
        command.dispose();
        outcome
    }

    fn enter_busy(&self, loading_text: String) -> BusyGuard {
        let _transition = self.inner.lock_busy_transition();
        self.set_loading_text(loading_text);
        if self.inner.busy_depth.fetch_add(1, Ordering::AcqRel) == 0 {
            self.inner
                .notifier
                .property_changed(PropertyChange::IsBusy(true));
        }
        BusyGuard { view: self.clone() }
    }
}

struct BusyGuard {
    view: ViewModel,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let inner = &self.view.inner;
        let _transition = inner.lock_busy_transition();
        if inner.busy_depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            inner.notifier.property_changed(PropertyChange::IsBusy(false));
            self.view.set_loading_text(String::new());
        }
    }
}
