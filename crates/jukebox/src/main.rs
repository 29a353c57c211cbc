//! Jukebox: a console front-end over the playback session controller.
//!
//! Plays a playlist through a simulated timer engine, printing the queued event
//! stream and the coalesced "now playing" snapshot as they change. Commands are
//! read line by line from stdin (`help` lists them).

use anyhow::Result;
use clap::Parser;
use jukebox::cli::Args;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();
    jukebox::runtime::run(config)
}
