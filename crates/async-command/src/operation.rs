/*
[INPUT]:  User-supplied async closures of various shapes
[OUTPUT]: One canonical operation type + the per-run context handed to it
[POS]:    Operation layer - cancellation scope, progress/title sinks, shape adapters
[UPDATE]: When adding operation shapes or context helpers
*/

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::CommandError;
use crate::progress::{ProgressSink, TitleSink};

/// Future returned by every operation.
pub type OperationFuture = BoxFuture<'static, anyhow::Result<()>>;

pub(crate) type Operation<P> = Arc<dyn Fn(P, OperationContext) -> OperationFuture + Send + Sync>;

pub(crate) type Predicate<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// What an operation makes use of, so views can decide e.g. whether to
/// show a cancel button or a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub cancellable: bool,
    pub reports_progress: bool,
}

impl Capabilities {
    pub const FULL: Self = Self {
        cancellable: true,
        reports_progress: true,
    };
    pub const NONE: Self = Self {
        cancellable: false,
        reports_progress: false,
    };
}

/// Per-run handles passed to an operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    token: CancellationToken,
    progress: ProgressSink,
    title: TitleSink,
}

impl OperationContext {
    pub(crate) fn new(token: CancellationToken, progress: ProgressSink, title: TitleSink) -> Self {
        Self {
            token,
            progress,
            title,
        }
    }

    /// A context not attached to any command, for driving an operation
    /// directly. Reports are dropped.
    pub fn detached(token: CancellationToken) -> Self {
        Self::new(token, ProgressSink::detached(), TitleSink::detached())
    }

    /// The run's cancellation scope. Pass clones into cancellable I/O.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation was requested for this run.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// `Err(Cancelled)` if cancellation was requested; handy inside loops.
    pub fn check_cancelled(&self) -> Result<(), CommandError> {
        if self.token.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Race `fut` against the run's cancellation scope.
    ///
    /// Cancellation wins ties, and the losing future is dropped.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output, CommandError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CommandError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Cancellable delay.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CommandError> {
        self.guard(tokio::time::sleep(duration)).await
    }

    pub fn progress(&self) -> &ProgressSink {
        &self.progress
    }

    pub fn title(&self) -> &TitleSink {
        &self.title
    }

    pub fn report_progress(&self, value: i32) -> bool {
        self.progress.report(value)
    }

    pub fn report_title(&self, title: impl Into<String>) -> bool {
        self.title.report(title)
    }
}

pub(crate) fn contextual<F, Fut>(operation: F) -> Operation<()>
where
    F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |_: (), ctx: OperationContext| operation(ctx).boxed())
}

pub(crate) fn with_parameter<P, F, Fut>(operation: F) -> Operation<P>
where
    F: Fn(P, OperationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |param: P, ctx: OperationContext| operation(param, ctx).boxed())
}

/// Adapter for operations that ignore cancellation and progress.
pub(crate) fn simple<P, F, Fut>(operation: F) -> Operation<P>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |param: P, _ctx: OperationContext| operation(param).boxed())
}
