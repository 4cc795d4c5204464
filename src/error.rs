/*!
error.rs - typed failures of a single pipeline run.

None of these ever escape the event handler: each is reported where it
happens and the run for that event is dropped (or, for dispatch, only that
target's unit fails).
*/

use std::time::Duration;

use thiserror::Error;

/// Raw preference value was present but is neither "Light" nor "Dark".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized appearance preference '{raw}' (expected 'Light' or 'Dark')")]
pub struct ThemeResolutionError {
    pub raw: String,
}

/// Failure of one external `nvr` invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The executable could not be started at all.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("'{program}' exited with {}", describe_code(.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The runner panicked while driving the process.
    #[error("'{program}' dispatch panicked: {reason}")]
    Panicked { program: String, reason: String },

    /// The process did not finish within the dispatch timeout.
    #[error("'{program}' did not finish within {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },
}

impl CommandError {
    /// Captured standard error, if the process got far enough to produce any.
    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Exit { stderr, .. } => stderr,
            _ => "",
        }
    }

    /// Captured standard output, if any.
    pub fn stdout(&self) -> &str {
        match self {
            CommandError::Exit { stdout, .. } => stdout,
            _ => "",
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Reasons a whole pipeline run is aborted before any dispatch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Theme(#[from] ThemeResolutionError),

    #[error("server discovery failed: {0}")]
    Discovery(#[source] CommandError),
}
