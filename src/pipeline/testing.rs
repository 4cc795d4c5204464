//! Test doubles: a scripted `nvr` and a reporter that records instead of logging.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::report::{Report, Reporter};
use crate::error::CommandError;
use crate::nvr::runner::{CommandOutput, CommandRunner};
use crate::nvr::{Invocation, SERVERLIST_FLAG};

/// Reporter that keeps every report in memory.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Report) -> bool) -> usize {
        self.reports.lock().iter().filter(|r| pred(r)).count()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, report: &Report) {
        self.reports.lock().push(report.clone());
    }
}

/// Fake `nvr`.
///
/// `--serverlist` replays the queued listings in order (the last one repeats;
/// `None` simulates a missing executable). `--servername X` succeeds unless X
/// was configured to fail, hang or panic.
#[derive(Default)]
pub struct ScriptedRunner {
    listings: Mutex<VecDeque<Option<CommandOutput>>>,
    failures: HashMap<String, CommandOutput>,
    hanging: HashSet<String>,
    panicking: HashSet<String>,
    missing: bool,
    gate: Option<Arc<Semaphore>>,
    calls: Arc<Mutex<Vec<Invocation>>>,
    discoveries: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    pub fn listing(self, stdout: &str) -> Self {
        self.listings.lock().push_back(Some(CommandOutput::ok(stdout)));
        self
    }

    pub fn listing_output(self, output: Option<CommandOutput>) -> Self {
        self.listings.lock().push_back(output);
        self
    }

    pub fn fail(mut self, target: &str, output: CommandOutput) -> Self {
        self.failures.insert(target.to_string(), output);
        self
    }

    pub fn hang(mut self, target: &str) -> Self {
        self.hanging.insert(target.to_string());
        self
    }

    pub fn panic_on(mut self, target: &str) -> Self {
        self.panicking.insert(target.to_string());
        self
    }

    /// Every invocation fails to launch.
    pub fn missing_program(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Dispatch calls wait for a permit from `gate` before finishing.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Shared log of every invocation seen.
    pub fn calls(&self) -> Arc<Mutex<Vec<Invocation>>> {
        self.calls.clone()
    }

    pub fn discoveries(&self) -> Arc<AtomicUsize> {
        self.discoveries.clone()
    }

    fn launch_error(invocation: &Invocation) -> CommandError {
        CommandError::Launch {
            program: invocation.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        }
    }

    fn next_listing(&self) -> Option<CommandOutput> {
        let mut listings = self.listings.lock();
        if listings.len() > 1 {
            listings.pop_front().flatten()
        } else {
            listings.front().cloned().flatten()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.lock().push(invocation.clone());
        if self.missing {
            return Err(Self::launch_error(invocation));
        }

        if invocation.args.first().map(String::as_str) == Some(SERVERLIST_FLAG) {
            self.discoveries.fetch_add(1, Ordering::SeqCst);
            return self
                .next_listing()
                .ok_or_else(|| Self::launch_error(invocation));
        }

        let target = invocation.args.get(1).cloned().unwrap_or_default();
        if self.panicking.contains(&target) {
            panic!("scripted panic for {target}");
        }
        if self.hanging.contains(&target) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        Ok(self
            .failures
            .get(&target)
            .cloned()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}
