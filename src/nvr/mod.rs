//! neovim-remote (`nvr`) invocation model.
//!
//! Target        -> one running neovim server, as listed by `nvr --serverlist`
//! Invocation    -> program + argv, rendered shell-quoted for log lines
//! build_background_args -> argv that sets `background` on one server
//!
//! `nvr` itself is opaque: we only rely on its argv contract, exit status
//! and captured stdout/stderr.
//!
pub mod discovery;
pub mod runner;

use std::fmt;

use crate::theme::Theme;

/// Executable used for both discovery and dispatch.
pub const NVR_PROGRAM: &str = "nvr";

/// Flag making `nvr` print one server address per line.
pub const SERVERLIST_FLAG: &str = "--serverlist";

/// Identifier of one active neovim server (socket path or address).
///
/// Never empty, never contains a line break; the only constructor enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// Build a target from one line of `--serverlist` output.
    ///
    /// Surrounding whitespace is trimmed; blank or multi-line input yields `None`.
    pub fn parse(raw: &str) -> Option<Target> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains(is_line_break) {
            return None;
        }
        Some(Target(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Line terminators recognized in `nvr` output (LF, CR, VT, FF, NEL, LS, PS).
pub fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully-specified external command (no shell involved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `nvr --serverlist`
    pub fn server_list(program: &str) -> Self {
        Self::new(program, vec![SERVERLIST_FLAG.to_string()])
    }

    /// `nvr --servername <target> -c "lua vim.o.background = '<theme>'"`
    pub fn set_background(program: &str, target: &Target, theme: Theme) -> Self {
        Self::new(program, build_background_args(target, theme))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words =
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

/// Lua snippet executed inside the target server.
pub fn background_command(theme: Theme) -> String {
    format!("lua vim.o.background = '{}'", theme.as_background())
}

/// Argument vector addressing `target` and setting its background to `theme`.
///
/// Arguments go straight to the process (no shell), so the `-c` payload
/// carries no extra quoting.
pub fn build_background_args(target: &Target, theme: Theme) -> Vec<String> {
    vec![
        "--servername".to_string(),
        target.as_str().to_string(),
        "-c".to_string(),
        background_command(theme),
    ]
}
