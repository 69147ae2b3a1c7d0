/*
[INPUT]:  Dispatcher + ErrorHandler (captured once), per-command title/operation
[OUTPUT]: Independent AsyncCommand instances wired to the shared collaborators
[POS]:    Factory layer - removes repeated capability wiring from callers
[UPDATE]: When adding new operation shapes or creation shortcuts
*/

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::builder::CommandBuilder;
use crate::command::AsyncCommand;
use crate::config::CommandConfig;
use crate::dispatcher::{Dispatcher, ErrorHandler};
use crate::error::{CommandError, Result};
use crate::operation::OperationContext;

/// Creates commands that share one dispatcher and one error handler.
///
/// Holds no other state: every call returns an independent command.
#[derive(Clone)]
pub struct CommandFactory {
    dispatcher: Arc<dyn Dispatcher>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl CommandFactory {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, error_handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            dispatcher,
            error_handler,
        }
    }

    /// Builder for when the collaborators are resolved at runtime.
    pub fn builder() -> CommandFactoryBuilder {
        CommandFactoryBuilder::default()
    }

    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    pub fn error_handler(&self) -> &Arc<dyn ErrorHandler> {
        &self.error_handler
    }

    /// Pre-wired builder for a plain command, for setting the predicate or
    /// reset flag before `build`.
    pub fn command<F, Fut>(&self, title: impl Into<String>, operation: F) -> CommandBuilder<()>
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.wire(CommandBuilder::new(title, operation))
    }

    /// Pre-wired builder for a parameterized command.
    pub fn command_with<P, F, Fut>(&self, title: impl Into<String>, operation: F) -> CommandBuilder<P>
    where
        P: Send + 'static,
        F: Fn(P, OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.wire(CommandBuilder::with_parameter(title, operation))
    }

    pub fn create<F, Fut>(&self, title: impl Into<String>, operation: F) -> AsyncCommand<()>
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        AsyncCommand::new(
            title,
            operation,
            self.dispatcher.clone(),
            self.error_handler.clone(),
        )
    }

    pub fn create_with<P, F, Fut>(&self, title: impl Into<String>, operation: F) -> AsyncCommand<P>
    where
        P: Send + 'static,
        F: Fn(P, OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        AsyncCommand::with_parameter(
            title,
            operation,
            self.dispatcher.clone(),
            self.error_handler.clone(),
        )
    }

    /// Pre-wired builder for a command whose operation only takes the parameter.
    pub fn command_simple<P, F, Fut>(&self, title: impl Into<String>, operation: F) -> CommandBuilder<P>
    where
        P: Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.wire(CommandBuilder::simple(title, operation))
    }

    /// Command whose operation only takes the parameter.
    pub fn create_simple<P, F, Fut>(&self, title: impl Into<String>, operation: F) -> AsyncCommand<P>
    where
        P: Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.finish(self.command_simple(title, operation))
    }

    /// Command declared through [`CommandConfig`]; the config is validated first.
    pub fn create_from_config<F, Fut>(
        &self,
        config: &CommandConfig,
        operation: F,
    ) -> Result<AsyncCommand<()>>
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        config.validate()?;
        Ok(self.finish(self.command(config.title.clone(), operation).config(config)))
    }

    fn wire<P>(&self, builder: CommandBuilder<P>) -> CommandBuilder<P> {
        builder
            .dispatcher(self.dispatcher.clone())
            .error_handler(self.error_handler.clone())
    }

    fn finish<P>(&self, builder: CommandBuilder<P>) -> AsyncCommand<P> {
        builder.build_or(self.dispatcher.clone(), self.error_handler.clone())
    }
}

impl fmt::Debug for CommandFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFactory").finish_non_exhaustive()
    }
}

/// Collects collaborators and fails fast when one is missing.
#[derive(Default)]
pub struct CommandFactoryBuilder {
    dispatcher: Option<Arc<dyn Dispatcher>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl CommandFactoryBuilder {
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    pub fn build(self) -> Result<CommandFactory> {
        let dispatcher = self
            .dispatcher
            .ok_or(CommandError::MissingCollaborator("dispatcher"))?;
        let error_handler = self
            .error_handler
            .ok_or(CommandError::MissingCollaborator("error handler"))?;
        Ok(CommandFactory::new(dispatcher, error_handler))
    }
}
