/*!
report.rs - one log line per pipeline step / outcome.

`Report` enumerates everything worth telling the user; `render` turns a
report into a (level, text) pair and `LogReporter` hands it to the logger,
which adds the timestamp. Reporting never feeds back into control flow.
*/

use super::dispatch::{CapturedOutput, DispatchOutcome};
use crate::nvr::Target;
use crate::theme::Theme;
use crate::utils::logging::{self, LogLevel};

/// A step or outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Subscription registered.
    Observing,
    ThemeChanged(Theme),
    ResolutionFailed {
        raw: String,
    },
    DiscoveryFailed {
        message: String,
        captured: CapturedOutput,
    },
    /// Discovery succeeded but listed nothing.
    NoTargets,
    Sending {
        target: Target,
    },
    Finished {
        target: Target,
        command: String,
        outcome: DispatchOutcome,
    },
}

impl Report {
    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Report::ResolutionFailed { .. }
                | Report::DiscoveryFailed { .. }
                | Report::Finished {
                    outcome: DispatchOutcome::Failure { .. },
                    ..
                }
        )
    }
}

/// Sink for reports. Implementations must not panic or block for long;
/// they are called from dispatch tasks.
pub trait Reporter: Send + Sync {
    fn report(&self, report: &Report);
}

/// Default reporter: the crate logger (stdout, timestamped).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, report: &Report) {
        let (level, line) = render(report);
        logging::log(level, line);
    }
}

/// Text and level for a report.
pub fn render(report: &Report) -> (LogLevel, String) {
    match report {
        Report::Observing => (LogLevel::Info, "Observing".to_string()),
        Report::ThemeChanged(theme) => (LogLevel::Info, format!("Theme changed: {theme}")),
        Report::ResolutionFailed { raw } => (
            LogLevel::Error,
            format!("Theme change ignored: unrecognized appearance preference '{raw}'"),
        ),
        Report::DiscoveryFailed { message, captured } => (
            LogLevel::Error,
            format!("neovim: server discovery failed: {message}{}", captured_block(captured)),
        ),
        Report::NoTargets => (LogLevel::Info, "neovim: no servers".to_string()),
        Report::Sending { target } => (
            LogLevel::Info,
            format!("neovim server ({target}): sending command"),
        ),
        Report::Finished {
            target,
            command,
            outcome,
        } => match outcome {
            DispatchOutcome::Success => (
                LogLevel::Info,
                format!("neovim server ({target}): background updated"),
            ),
            DispatchOutcome::Failure { message, captured } => (
                LogLevel::Error,
                format!(
                    "neovim server ({target}): command failed with arguments - {command}: {message}{}",
                    captured_block(captured)
                ),
            ),
        },
    }
}

fn captured_block(captured: &CapturedOutput) -> String {
    let mut out = String::new();
    for (label, text) in [("stderr", &captured.stderr), ("stdout", &captured.stdout)] {
        let text = text.trim_end();
        if !text.is_empty() {
            out.push_str(&format!("\n  {label}: {text}"));
        }
    }
    out
}
