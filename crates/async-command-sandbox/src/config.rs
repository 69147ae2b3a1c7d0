/*
[INPUT]:  YAML configuration file (optional)
[OUTPUT]: Parsed sandbox configuration with built-in demo defaults
[POS]:    Configuration layer - demo command setup
[UPDATE]: When adding new demo kinds or options
*/

use anyhow::{Context, ensure};
use async_command::CommandConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the sandbox run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    /// Title of the hosting view model
    #[serde(default = "default_view_title")]
    pub title: String,
    /// Demo commands, executed in order
    #[serde(default = "default_demos")]
    pub demos: Vec<DemoConfig>,
    /// Delay before the long-running demo is cancelled
    #[serde(default = "default_cancel_after_ms")]
    pub cancel_after_ms: u64,
}

/// What a demo command does when executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoKind {
    /// Counts from 0 to 100 percent, one step at a time
    Progress,
    /// Waits for `steps * step_delay_ms`, cancelled by the runner
    LongRunning,
    /// Fails after one step
    Failing,
}

impl DemoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoKind::Progress => "progress",
            DemoKind::LongRunning => "long_running",
            DemoKind::Failing => "failing",
        }
    }
}

/// Configuration for a single demo command
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoConfig {
    pub kind: DemoKind,
    pub title: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_reset_title")]
    pub reset_title_on_complete: bool,
}

impl DemoConfig {
    pub fn new(kind: DemoKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            steps: default_steps(),
            step_delay_ms: default_step_delay_ms(),
            reset_title_on_complete: default_reset_title(),
        }
    }

    /// Command-level options derived from this demo.
    pub fn command_config(&self) -> CommandConfig {
        CommandConfig {
            title: self.title.clone(),
            reset_title_on_complete: self.reset_title_on_complete,
        }
    }
}

fn default_view_title() -> String {
    "Tests".to_string()
}

fn default_demos() -> Vec<DemoConfig> {
    vec![
        DemoConfig::new(DemoKind::Progress, "Increase Progress"),
        DemoConfig {
            steps: 50,
            ..DemoConfig::new(DemoKind::LongRunning, "Test Command")
        },
        DemoConfig {
            steps: 1,
            ..DemoConfig::new(DemoKind::Failing, "Failing Command")
        },
    ]
}

fn default_cancel_after_ms() -> u64 {
    1500
}

fn default_steps() -> u32 {
    100
}

fn default_step_delay_ms() -> u64 {
    100
}

fn default_reset_title() -> bool {
    true
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            title: default_view_title(),
            demos: default_demos(),
            cancel_after_ms: default_cancel_after_ms(),
        }
    }
}

impl SandboxConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("read config file {path}"))?;
        let config: Self = serde_yaml::from_str(&content).context("parse sandbox config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (index, demo) in self.demos.iter().enumerate() {
            demo.command_config()
                .validate()
                .with_context(|| format!("demo #{index}"))?;
            ensure!(demo.steps > 0, "demo '{}' must have at least one step", demo.title);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_mirror_sandbox_screen() {
        let config = SandboxConfig::default();
        assert_eq!(config.title, "Tests");
        let kinds: Vec<DemoKind> = config.demos.iter().map(|demo| demo.kind).collect();
        assert_eq!(
            kinds,
            vec![DemoKind::Progress, DemoKind::LongRunning, DemoKind::Failing]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
demos:
  - kind: failing
    title: Broken
    reset_title_on_complete: false
"#;
        let config: SandboxConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cancel_after_ms, 1500);
        let demo = &config.demos[0];
        assert_eq!(demo.kind, DemoKind::Failing);
        assert_eq!(demo.steps, 100);
        assert!(!demo.command_config().reset_title_on_complete);
    }

    #[test]
    fn test_zero_steps_rejected() {
        let mut config = SandboxConfig::default();
        config.demos[0].steps = 0;
        assert!(config.validate().is_err());
    }
}
