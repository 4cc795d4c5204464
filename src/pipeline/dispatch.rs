/*!
dispatch.rs - fan one theme out to every discovered server.

Each target gets its own tokio task. The caller gets a `Wave` back as soon
as the tasks are spawned:
  - dropping the `Wave` detaches the tasks (fire-and-forget)
  - `Wave::join` (tests only) waits for all of them and collects per-target outcomes

Units share nothing mutable. A failing, hanging or panicking unit only
affects its own outcome and always emits its own `Finished` report.
No cap, no queue, no cancellation.
*/

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::report::{Report, Reporter};
use crate::error::CommandError;
use crate::nvr::runner::CommandRunner;
use crate::nvr::{Invocation, Target};
use crate::theme::Theme;

/// stdout / stderr captured from a failed invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn from_error(err: &CommandError) -> Self {
        Self {
            stdout: err.stdout().to_string(),
            stderr: err.stderr().to_string(),
        }
    }
}

/// Result of one dispatch unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Failure {
        message: String,
        captured: CapturedOutput,
    },
}

impl DispatchOutcome {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success)
    }
}

impl From<Result<(), CommandError>> for DispatchOutcome {
    fn from(result: Result<(), CommandError>) -> Self {
        match result {
            Ok(()) => DispatchOutcome::Success,
            Err(err) => DispatchOutcome::Failure {
                message: err.to_string(),
                captured: CapturedOutput::from_error(&err),
            },
        }
    }
}

/// Everything a dispatch unit needs, cloned cheaply into each task.
#[derive(Clone)]
pub struct DispatchContext {
    pub runner: Arc<dyn CommandRunner>,
    pub reporter: Arc<dyn Reporter>,
    pub program: String,
    pub timeout: Duration,
}

/// The set of units spawned for one theme-change event.
#[derive(Debug, Default)]
pub struct Wave {
    units: Vec<(Target, JoinHandle<DispatchOutcome>)>,
}

impl Wave {
    /// A wave with no units (aborted run or no servers).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Wait for every unit; outcomes are returned in spawn order.
    #[cfg(test)]
    pub async fn join(self) -> Vec<(Target, DispatchOutcome)> {
        let mut outcomes = Vec::with_capacity(self.units.len());
        for (target, handle) in self.units {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => DispatchOutcome::Failure {
                    message: format!("dispatch task aborted: {e}"),
                    captured: CapturedOutput::default(),
                },
            };
            outcomes.push((target, outcome));
        }
        outcomes
    }
}

/// Spawn one unit per target on `runtime` and return without waiting.
pub fn spawn_wave(
    runtime: &Handle,
    ctx: &DispatchContext,
    targets: Vec<Target>,
    theme: Theme,
) -> Wave {
    let units = targets
        .into_iter()
        .map(|target| {
            ctx.reporter.report(&Report::Sending {
                target: target.clone(),
            });
            let invocation = Invocation::set_background(&ctx.program, &target, theme);
            let handle = runtime.spawn(run_unit(ctx.clone(), target.clone(), invocation));
            (target, handle)
        })
        .collect();
    Wave { units }
}

/// One dispatch unit: run, bound by the timeout, report, return the outcome.
///
/// A panic inside the runner is caught here so the unit still reports a
/// `Failure`, even when nobody joins the wave.
pub async fn run_unit(
    ctx: DispatchContext,
    target: Target,
    invocation: Invocation,
) -> DispatchOutcome {
    let bounded = tokio::time::timeout(ctx.timeout, ctx.runner.run(&invocation));
    let result = match AssertUnwindSafe(bounded).catch_unwind().await {
        Ok(Ok(run)) => run
            .and_then(|output| output.into_checked(&invocation.program))
            .map(|_| ()),
        Ok(Err(_)) => Err(CommandError::TimedOut {
            program: invocation.program.clone(),
            after: ctx.timeout,
        }),
        Err(payload) => Err(CommandError::Panicked {
            program: invocation.program.clone(),
            reason: panic_reason(payload.as_ref()),
        }),
    };
    let outcome = DispatchOutcome::from(result);
    ctx.reporter.report(&Report::Finished {
        target,
        command: invocation.to_string(),
        outcome: outcome.clone(),
    });
    outcome
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvr::runner::CommandOutput;
    use crate::pipeline::testing::{RecordingReporter, ScriptedRunner};

    fn targets(names: &[&str]) -> Vec<Target> {
        names.iter().map(|n| Target::parse(n).unwrap()).collect()
    }

    fn ctx(runner: ScriptedRunner, reporter: Arc<RecordingReporter>) -> DispatchContext {
        DispatchContext {
            runner: Arc::new(runner),
            reporter,
            program: "nvr".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn one_failure_does_not_affect_siblings() {
        let reporter = Arc::new(RecordingReporter::default());
        let runner = ScriptedRunner::default()
            .fail("srv2", CommandOutput::failed(1, "partial", "E247: no server"));
        let ctx = ctx(runner, reporter.clone());

        let wave = spawn_wave(
            &Handle::current(),
            &ctx,
            targets(&["srv1", "srv2", "srv3"]),
            Theme::Dark,
        );
        assert_eq!(wave.len(), 3);
        let outcomes = wave.join().await;

        assert!(outcomes[0].1.is_success());
        assert!(outcomes[2].1.is_success());
        match &outcomes[1].1 {
            DispatchOutcome::Failure { captured, .. } => {
                assert_eq!(captured.stderr, "E247: no server");
                assert_eq!(captured.stdout, "partial");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(reporter.count(|r| matches!(r, Report::Sending { .. })), 3);
        assert_eq!(reporter.count(|r| matches!(r, Report::Finished { .. })), 3);
        assert_eq!(reporter.count(Report::is_error), 1);
    }

    #[tokio::test]
    async fn hanging_unit_times_out() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut ctx = ctx(ScriptedRunner::default().hang("slow"), reporter);
        ctx.timeout = Duration::from_millis(50);

        let invocation = Invocation::set_background("nvr", &targets(&["slow"])[0], Theme::Light);
        let outcome = run_unit(ctx, targets(&["slow"]).remove(0), invocation).await;
        match outcome {
            DispatchOutcome::Failure { message, .. } => assert!(message.contains("did not finish")),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_is_a_failure_outcome() {
        let reporter = Arc::new(RecordingReporter::default());
        let ctx = ctx(ScriptedRunner::default().missing_program(), reporter);
        let t = targets(&["srv1"]).remove(0);
        let invocation = Invocation::set_background("nvr", &t, Theme::Dark);
        let outcome = run_unit(ctx, t, invocation).await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn panicking_unit_is_isolated() {
        let reporter = Arc::new(RecordingReporter::default());
        let ctx = ctx(ScriptedRunner::default().panic_on("bad"), reporter.clone());
        let wave = spawn_wave(&Handle::current(), &ctx, targets(&["bad", "good"]), Theme::Dark);
        let outcomes = wave.join().await;
        assert!(!outcomes[0].1.is_success());
        assert!(outcomes[1].1.is_success());
        assert_eq!(reporter.count(|r| matches!(r, Report::Finished { .. })), 2);
    }

    #[tokio::test]
    async fn panicking_unit_reports_its_failure() {
        let reporter = Arc::new(RecordingReporter::default());
        let ctx = ctx(ScriptedRunner::default().panic_on("bad"), reporter.clone());
        let t = targets(&["bad"]).remove(0);
        let invocation = Invocation::set_background("nvr", &t, Theme::Dark);

        let outcome = run_unit(ctx, t, invocation).await;
        match outcome {
            DispatchOutcome::Failure { message, .. } => {
                assert!(message.contains("scripted panic for bad"))
            }
            other => panic!("expected panic failure, got {other:?}"),
        }
        assert_eq!(reporter.count(|r| matches!(r, Report::Finished { .. })), 1);
        assert_eq!(reporter.count(Report::is_error), 1);
    }

    #[tokio::test]
    async fn command_uses_theme_and_target() {
        let reporter = Arc::new(RecordingReporter::default());
        let runner = ScriptedRunner::default();
        let calls = runner.calls();
        let ctx = ctx(runner, reporter);
        spawn_wave(&Handle::current(), &ctx, targets(&["srv1"]), Theme::Light)
            .join()
            .await;
        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec!["--servername", "srv1", "-c", "lua vim.o.background = 'light'"]
        );
    }
}
