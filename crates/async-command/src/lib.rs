/*
[INPUT]:  Public API exports for the async-command crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod builder;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod notify;
pub mod operation;
pub mod progress;
pub mod view_model;

// Re-export main types for convenience
pub use builder::CommandBuilder;
pub use command::{AsyncCommand, CommandSnapshot, ExecutionOutcome};
pub use config::CommandConfig;
pub use dispatcher::{
    DispatchAction, DispatchLoop, Dispatcher, ErrorHandler, InlineDispatcher, QueueDispatcher,
    TracingErrorHandler,
};
pub use error::{CommandError, Result, is_cancellation};
pub use factory::{CommandFactory, CommandFactoryBuilder};
pub use notify::{CommandEvent, Property, PropertyChange, SubscriptionId};
pub use operation::{Capabilities, OperationContext, OperationFuture};
pub use progress::{MAX_PROGRESS, ProgressSink, TitleSink};
pub use view_model::{BusyOutcome, ViewModel};

pub use tokio_util::sync::CancellationToken;
