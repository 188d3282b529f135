//! All the CLI arguments for Constellation

use crate::config::LogLevel;

/// Run a particle simulation that talks JSON over STDIN and STDOUT.
#[derive(clap::Parser, Debug, Clone, Default)]
#[command(
    version,
    about,
    long_about = "Run a particle simulation. Input messages are read from STDIN and frames and \
                  events are written to STDOUT, one JSON message per line."
)]
#[non_exhaustive]
pub struct CliArgs {
    /// Path to a config file. Defaults to `constellation.toml` in the user's config directory.
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Seed for the random source, making the simulation reproducible.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Run this many ticks as fast as possible, then exit. STDIN is ignored.
    #[arg(short, long)]
    pub ticks: Option<u64>,

    /// Ticks per second when running interactively.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Override the log level from the config file.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Override the log path from the config file.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,
}
