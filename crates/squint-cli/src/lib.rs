//! CLI argument parsing for squint.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "squint")]
#[command(version)]
#[command(about = "Watch and manage SLURM jobs, locally or over SSH")]
pub struct Args {
    /// Remote destination ([user@]host[:port]); local scheduler if omitted
    #[arg(long, value_name = "TARGET")]
    pub ssh: Option<String>,

    /// Seconds between queue refreshes
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_interval: u64,

    /// Write logs to this file (filter with SQUINT_LOG)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<Utf8PathBuf>,

    /// Color theme
    #[arg(long, value_enum, default_value_t = ThemeChoice::Dark)]
    pub theme: ThemeChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeChoice {
    Dark,
    Light,
}
