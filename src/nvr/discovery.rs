/*!
discovery.rs - enumerate running neovim servers via `nvr --serverlist`.

An empty list is a normal outcome ("no servers"); only a launch failure or
an unsuccessful exit is an error. No retry.
*/

use super::runner::CommandRunner;
use super::{Invocation, Target, is_line_break};
use crate::error::CommandError;

/// Parse `--serverlist` output: one target per line, trimmed, blanks dropped,
/// order preserved. Any line terminator counts, not only `\n`.
pub fn parse_server_list(stdout: &str) -> Vec<Target> {
    stdout.split(is_line_break).filter_map(Target::parse).collect()
}

/// Run the listing command and parse its output.
pub async fn discover(
    runner: &dyn CommandRunner,
    program: &str,
) -> Result<Vec<Target>, CommandError> {
    let invocation = Invocation::server_list(program);
    crate::log_trace!("discovery: running `{}`", invocation);
    let output = runner.run(&invocation).await?.into_checked(program)?;
    let targets = parse_server_list(&output.stdout);
    crate::log_debug!("discovery: {} server(s) listed", targets.len());
    Ok(targets)
}
