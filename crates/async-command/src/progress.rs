/*
[INPUT]:  Raw progress / status updates reported from inside an operation
[OUTPUT]: Command state updates + property-change notifications for the owning run
[POS]:    Progress channel - narrow write handles that never expose command internals
[UPDATE]: When changing clamping rules or stale-report handling
*/

use std::fmt;
use std::sync::Arc;

use crate::command::CommandCore;

/// Upper bound of reported progress.
pub const MAX_PROGRESS: u8 = 100;

#[derive(Clone)]
struct RunLink {
    core: Arc<CommandCore>,
    run_id: u64,
}

/// Write handle for numeric progress (0..=100).
///
/// Bound to a single run: once that run has finished, reports are ignored.
#[derive(Clone, Default)]
pub struct ProgressSink {
    link: Option<RunLink>,
}

impl ProgressSink {
    pub(crate) fn attached(core: Arc<CommandCore>, run_id: u64) -> Self {
        Self {
            link: Some(RunLink { core, run_id }),
        }
    }

    /// A sink that accepts and drops every report.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Report progress. Values outside 0..=100 are clamped.
    ///
    /// Returns `false` when the report was dropped because the run is over
    /// or the sink is detached.
    pub fn report(&self, value: i32) -> bool {
        let Some(link) = &self.link else {
            return false;
        };
        let clamped = value.clamp(0, i32::from(MAX_PROGRESS)) as u8;
        link.core.report_progress(link.run_id, clamped)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink")
            .field("run_id", &self.link.as_ref().map(|l| l.run_id))
            .finish()
    }
}

/// Write handle for the command's display title.
#[derive(Clone, Default)]
pub struct TitleSink {
    link: Option<RunLink>,
}

impl TitleSink {
    pub(crate) fn attached(core: Arc<CommandCore>, run_id: u64) -> Self {
        Self {
            link: Some(RunLink { core, run_id }),
        }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    /// Report a new title; same run-binding rules as [`ProgressSink::report`].
    pub fn report(&self, title: impl Into<String>) -> bool {
        let Some(link) = &self.link else {
            return false;
        };
        link.core.report_title(link.run_id, title.into())
    }
}

impl fmt::Debug for TitleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TitleSink")
            .field("run_id", &self.link.as_ref().map(|l| l.run_id))
            .finish()
    }
}
