/*
[INPUT]:  Serialized command declarations (YAML/JSON via serde)
[OUTPUT]: Validated construction-time options for commands
[POS]:    Configuration layer - declarative command setup
[UPDATE]: When adding new construction-time options
*/

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Result};

/// Construction-time options for a single command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandConfig {
    /// Initial display text
    pub title: String,
    /// Whether the title reverts after each run
    #[serde(default = "default_reset_title_on_complete")]
    pub reset_title_on_complete: bool,
}

impl CommandConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            reset_title_on_complete: default_reset_title_on_complete(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CommandError::Config("command title must not be empty".to_string()));
        }
        Ok(())
    }
}

fn default_reset_title_on_complete() -> bool {
    true
}
