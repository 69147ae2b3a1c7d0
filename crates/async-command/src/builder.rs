/*
[INPUT]:  Title, operation, optional predicate / reset flag, collaborators
[OUTPUT]: Fully wired AsyncCommand, or a fail-fast precondition error
[POS]:    Construction layer - optional settings without positional defaults
[UPDATE]: When adding construction-time options
*/

use std::future::Future;
use std::sync::Arc;

use crate::command::AsyncCommand;
use crate::config::CommandConfig;
use crate::dispatcher::{Dispatcher, ErrorHandler};
use crate::error::{CommandError, Result};
use crate::operation::{self, Capabilities, Operation, OperationContext, Predicate};

/// Builder for [`AsyncCommand`].
///
/// The dispatcher and error handler are required; `build` fails with
/// [`CommandError::MissingCollaborator`] when either is absent.
pub struct CommandBuilder<P = ()> {
    title: String,
    operation: Operation<P>,
    capabilities: Capabilities,
    can_execute: Option<Predicate<P>>,
    reset_title_on_complete: bool,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl CommandBuilder<()> {
    pub fn new<F, Fut>(title: impl Into<String>, operation: F) -> Self
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_operation(title.into(), operation::contextual(operation), Capabilities::FULL)
    }

    /// Eligibility predicate for commands without a parameter.
    pub fn enabled_when<F>(self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.can_execute(move |_: &()| predicate())
    }
}

impl<P: Send + 'static> CommandBuilder<P> {
    /// Operation receiving the parameter and the run context.
    pub fn with_parameter<F, Fut>(title: impl Into<String>, operation: F) -> Self
    where
        F: Fn(P, OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_operation(
            title.into(),
            operation::with_parameter(operation),
            Capabilities::FULL,
        )
    }

    /// Operation receiving only the parameter; cancellation and progress
    /// are not wired.
    pub fn simple<F, Fut>(title: impl Into<String>, operation: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_operation(title.into(), operation::simple(operation), Capabilities::NONE)
    }
}

impl<P> CommandBuilder<P> {
    fn from_operation(title: String, operation: Operation<P>, capabilities: Capabilities) -> Self {
        Self {
            title,
            operation,
            capabilities,
            can_execute: None,
            reset_title_on_complete: true,
            dispatcher: None,
            error_handler: None,
        }
    }

    pub fn can_execute<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        self.can_execute = Some(Arc::new(predicate));
        self
    }

    pub fn reset_title_on_complete(mut self, reset: bool) -> Self {
        self.reset_title_on_complete = reset;
        self
    }

    /// Apply declarative options. The title in `config` replaces the current one.
    pub fn config(mut self, config: &CommandConfig) -> Self {
        self.title = config.title.clone();
        self.reset_title_on_complete = config.reset_title_on_complete;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    pub fn build(self) -> Result<AsyncCommand<P>> {
        let Some(dispatcher) = self.dispatcher.clone() else {
            return Err(CommandError::MissingCollaborator("dispatcher"));
        };
        let Some(error_handler) = self.error_handler.clone() else {
            return Err(CommandError::MissingCollaborator("error handler"));
        };
        Ok(self.build_or(dispatcher, error_handler))
    }

    /// Build, using the given collaborators where none were set.
    pub(crate) fn build_or(
        self,
        dispatcher: Arc<dyn Dispatcher>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> AsyncCommand<P> {
        AsyncCommand::from_parts(
            self.title,
            self.operation,
            self.capabilities,
            self.can_execute,
            self.reset_title_on_complete,
            self.dispatcher.unwrap_or(dispatcher),
            self.error_handler.unwrap_or(error_handler),
        )
    }
}
