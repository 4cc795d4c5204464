/*!
Event -> command pipeline.

`Notifier` is the long-lived context built once at startup and owned by the
appearance observer for the rest of the process. For every theme-change
event `handle_event`:

  1. resolves the raw preference into a `Theme`          (sync)
  2. lists running servers with `nvr --serverlist`       (blocks the event thread)
  3. spawns one dispatch unit per server                 (returns immediately)

Resolution and discovery failures are reported and end that run only.
Nothing is deduplicated or coalesced across events: every event starts its
own wave, and waves may race each other at the servers.
*/

pub mod dispatch;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::PipelineError;
use crate::nvr::discovery::discover;
use crate::nvr::runner::CommandRunner;
use crate::nvr::{NVR_PROGRAM, Target};
use crate::theme::{self, Theme};
use dispatch::{CapturedOutput, DispatchContext, Wave, spawn_wave};
use report::{Report, Reporter};

/// Upper bound for a single dispatch unit before it is reported as failed.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed knobs of the pipeline. Not user-configurable; tests override them.
#[derive(Debug, Clone)]
pub struct Settings {
    pub program: String,
    pub dispatch_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            program: NVR_PROGRAM.to_string(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

pub struct Notifier {
    runtime: Handle,
    dispatch: DispatchContext,
}

impl Notifier {
    pub fn new(
        runtime: Handle,
        runner: Arc<dyn CommandRunner>,
        reporter: Arc<dyn Reporter>,
        settings: Settings,
    ) -> Self {
        Self {
            runtime,
            dispatch: DispatchContext {
                runner,
                reporter,
                program: settings.program,
                timeout: settings.dispatch_timeout,
            },
        }
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.dispatch.reporter.as_ref()
    }

    /// Process one theme-change event.
    ///
    /// Must be called from a thread that is not driving the tokio runtime
    /// (the Cocoa run loop thread in production): discovery blocks on it.
    /// The returned `Wave` may simply be dropped.
    pub fn handle_event(&self, raw: Option<&str>) -> Wave {
        match self.prepare(raw) {
            Ok((_, targets)) if targets.is_empty() => {
                self.reporter().report(&Report::NoTargets);
                Wave::empty()
            }
            Ok((theme, targets)) => spawn_wave(&self.runtime, &self.dispatch, targets, theme),
            Err(err) => {
                self.reporter().report(&failure_report(&err));
                Wave::empty()
            }
        }
    }

    fn prepare(&self, raw: Option<&str>) -> Result<(Theme, Vec<Target>), PipelineError> {
        let theme = theme::resolve(raw)?;
        self.reporter().report(&Report::ThemeChanged(theme));

        let targets = self
            .runtime
            .block_on(discover(self.dispatch.runner.as_ref(), &self.dispatch.program))
            .map_err(PipelineError::Discovery)?;
        Ok((theme, targets))
    }
}

fn failure_report(err: &PipelineError) -> Report {
    match err {
        PipelineError::Theme(e) => Report::ResolutionFailed { raw: e.raw.clone() },
        PipelineError::Discovery(e) => Report::DiscoveryFailed {
            message: e.to_string(),
            captured: CapturedOutput::from_error(e),
        },
    }
}
