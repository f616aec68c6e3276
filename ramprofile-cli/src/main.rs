//! ramprofile: set up profile-sync-daemon so browser profiles live in RAM.
//!
//! # Usage
//!
//! ```text
//! ramprofile [--browsers <LIST>] [--disable-overlay] [--disable-backups]
//!            [--enable-fast-sync] [--privilege-tool sudo|doas] [-y] [--json]
//! ```

mod commands;
mod prompt;

use anyhow::Result;
use clap::Parser;

use commands::setup::SetupArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ramprofile",
    version,
    about = "Configure profile-sync-daemon to keep browser profiles in RAM",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    setup: SetupArgs,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    cli.setup.run()
}

/// Log lines go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
