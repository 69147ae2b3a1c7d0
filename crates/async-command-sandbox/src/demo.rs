/*
[INPUT]:  SandboxConfig demos, CommandFactory, shutdown token
[OUTPUT]: Executed demo commands and a report per demo
[POS]:    Demo layer - exercises commands the way a screen would
[UPDATE]: When adding demo kinds or changing how demos are driven
*/

use std::time::Duration;

use anyhow::{Context, bail};
use async_command::{
    AsyncCommand, CancellationToken, CommandEvent, CommandFactory, ExecutionOutcome,
    OperationContext, ViewModel,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{DemoConfig, DemoKind, SandboxConfig};

/// Result of one demo run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub title: String,
    pub kind: DemoKind,
    pub outcome: ExecutionOutcome,
    pub progress: u8,
    /// Title after the run, to show whether it was restored
    pub final_title: String,
}

/// Drives demo commands under one view model's busy flag.
pub struct DemoRunner {
    view: ViewModel,
    cancel_after: Duration,
}

impl DemoRunner {
    pub fn new(factory: CommandFactory, config: &SandboxConfig) -> Self {
        let view = ViewModel::new(factory);
        view.set_title(config.title.clone());
        Self {
            view,
            cancel_after: Duration::from_millis(config.cancel_after_ms),
        }
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    /// Create the command for `demo`, with a listener logging its events.
    pub fn build_command(&self, demo: &DemoConfig) -> anyhow::Result<AsyncCommand<()>> {
        let kind = demo.kind;
        let steps = demo.steps;
        let step_delay = Duration::from_millis(demo.step_delay_ms);
        let title = demo.title.clone();

        let command = self
            .view
            .factory()
            .create_from_config(&demo.command_config(), move |ctx: OperationContext| {
                run_demo(kind, title.clone(), steps, step_delay, ctx)
            })
            .with_context(|| format!("create demo command '{}'", demo.title))?;

        let log_title = demo.title.clone();
        command.subscribe(move |event: &CommandEvent| {
            debug!(command = %log_title, ?event, "command event");
        });
        Ok(command)
    }

    /// Run every demo in order. Stops early once `shutdown` fires.
    pub async fn run_all(
        &self,
        demos: &[DemoConfig],
        shutdown: &CancellationToken,
    ) -> anyhow::Result<Vec<DemoReport>> {
        let mut reports = Vec::with_capacity(demos.len());
        for demo in demos {
            if shutdown.is_cancelled() {
                warn!(remaining = demos.len() - reports.len(), "shutdown requested; skipping demos");
                break;
            }
            reports.push(self.run_one(demo, shutdown).await?);
        }
        Ok(reports)
    }

    pub async fn run_one(
        &self,
        demo: &DemoConfig,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<DemoReport> {
        let command = self.build_command(demo)?;
        info!(title = %demo.title, kind = demo.kind.as_str(), "running demo");

        let canceller = (demo.kind == DemoKind::LongRunning)
            .then(|| spawn_canceller(command.clone(), self.cancel_after));

        let run = self.view.perform_busy_command(&command, demo.title.clone());
        tokio::pin!(run);
        let result = tokio::select! {
            outcome = &mut run => outcome,
            _ = shutdown.cancelled() => {
                command.cancel();
                (&mut run).await
            }
        };
        let outcome = result.with_context(|| format!("run demo '{}'", demo.title))?;

        if let Some(canceller) = canceller {
            canceller.abort();
        }

        let report = DemoReport {
            title: demo.title.clone(),
            kind: demo.kind,
            outcome,
            progress: command.progress(),
            final_title: command.title(),
        };
        command.dispose();

        info!(
            title = %report.title,
            outcome = report.outcome.as_str(),
            progress = report.progress,
            "demo finished"
        );
        Ok(report)
    }
}

fn spawn_canceller(command: AsyncCommand<()>, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if command.cancel() {
            info!(title = %command.original_title(), "cancel requested");
        }
    })
}

async fn run_demo(
    kind: DemoKind,
    title: String,
    steps: u32,
    step_delay: Duration,
    ctx: OperationContext,
) -> anyhow::Result<()> {
    match kind {
        DemoKind::Progress => {
            for step in 0..=steps {
                let percent = u64::from(step) * 100 / u64::from(steps.max(1));
                ctx.report_title(format!("Progress: {percent}%"));
                ctx.sleep(step_delay).await?;
                ctx.report_progress(percent as i32);
            }
            Ok(())
        }
        DemoKind::LongRunning => {
            ctx.report_title(format!("{title} Running"));
            ctx.sleep(step_delay * steps).await?;
            Ok(())
        }
        DemoKind::Failing => {
            ctx.sleep(step_delay).await?;
            bail!("{title} failed on purpose")
        }
    }
}
