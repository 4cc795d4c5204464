// Off macOS the binary only reports that it cannot subscribe.
#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

mod error;
mod nvr;
mod observer;
mod pipeline;
mod theme;
mod utils;

use nvr::runner::ProcessRunner;
use pipeline::report::LogReporter;
use pipeline::{Notifier, Settings};

/// Appearance Notifier - keep neovim's `background` in sync with macOS dark mode
///
/// Runs as a background agent. Each time the system appearance flips between
/// Light and Dark it:
///   1. lists running neovim servers    (`nvr --serverlist`)
///   2. sends every server, concurrently:
///        nvr --servername <server> -c "lua vim.o.background = '<light|dark>'"
///
/// A failing server never affects the others or later changes.
/// Log lines (timestamped) go to stdout; there is no config file or env.
///
/// Requires `nvr` (neovim-remote) on PATH.
#[derive(Parser, Debug)]
#[command(
    name = "appearance-notifier",
    version,
    author,
    about = "Propagate macOS light/dark mode changes to running neovim servers",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    // Dispatch units run here; the main thread belongs to the Cocoa run loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("appearance-dispatch")
        .build()
        .context("Failed to create Tokio runtime")?;

    let notifier = Notifier::new(
        runtime.handle().clone(),
        Arc::new(ProcessRunner),
        Arc::new(LogReporter),
        Settings::default(),
    );

    let subscription =
        observer::subscribe(notifier).context("Failed to observe appearance changes")?;
    crate::log_debug!("subscription active: {:?}", subscription);

    // `runtime` must outlive the subscription; run_forever never returns.
    let _runtime = runtime;
    subscription.run_forever()
}
