/*
[INPUT]:  Failure sources inside the engine (cancellation, panics, misuse, config)
[OUTPUT]: Structured error type shared by commands, factory, and view model
[POS]:    Error handling layer - unified error type for the crate
[UPDATE]: When adding new precondition checks or failure classes
*/

use thiserror::Error;

/// Main error type for the command engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The operation observed its cancellation scope and stopped
    #[error("operation was cancelled")]
    Cancelled,

    /// The operation panicked while being built or polled
    #[error("operation panicked: {message}")]
    Panicked { message: String },

    /// The command was used after `dispose`
    #[error("command has been disposed")]
    Disposed,

    /// Fire-and-forget execution needs a running Tokio runtime
    #[error("no Tokio runtime available to run the command")]
    NoRuntime,

    /// A required collaborator was not supplied at construction
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl CommandError {
    /// Check if the error means the operation was asked to stop, not that it failed
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CommandError::Cancelled)
    }

    /// Check if the error is a caller mistake rather than an operation failure
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            CommandError::Disposed
                | CommandError::NoRuntime
                | CommandError::MissingCollaborator(_)
                | CommandError::Config(_)
        )
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        CommandError::Panicked { message }
    }
}

/// Check whether an operation error is a cancellation somewhere in its chain.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<CommandError>()
            .is_some_and(CommandError::is_cancellation)
    })
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn test_cancellation_detected_through_context() {
        let err: anyhow::Result<()> = Err(CommandError::Cancelled).context("fetch page");
        let err = err.unwrap_err();
        assert!(is_cancellation(&err));

        let other = anyhow::anyhow!("boom");
        assert!(!is_cancellation(&other));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(CommandError::Disposed.is_precondition_violation());
        assert!(CommandError::MissingCollaborator("dispatcher").is_precondition_violation());
        assert!(!CommandError::Cancelled.is_precondition_violation());
        assert!(
            !CommandError::Panicked {
                message: "x".to_string()
            }
            .is_precondition_violation()
        );
    }

    #[test]
    fn test_panic_payload_message() {
        let err = CommandError::from_panic(Box::new("kaboom"));
        assert_eq!(
            err,
            CommandError::Panicked {
                message: "kaboom".to_string()
            }
        );

        let err = CommandError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "operation panicked: owned");
    }
}
