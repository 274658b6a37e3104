//! Command line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::{exit_code, run_evaluate, run_init_config, run_synth, run_train};
pub use output::OutputMode;

#[derive(Parser, Debug)]
#[command(name = "execrl")]
#[command(version)]
#[command(about = "Train and evaluate order execution agents on replayed market data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Train an agent with the given configuration
    Train {
        /// Configuration file (TOML)
        #[arg(short, long, env = "EXECRL_CONFIG")]
        config: Option<PathBuf>,
        /// Override training.episodes
        #[arg(long)]
        episodes: Option<usize>,
        /// Override training.checkpoint_dir
        #[arg(long)]
        checkpoint_dir: Option<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate a saved agent against the slicing baseline
    Evaluate {
        /// Checkpoint file written by `train`
        #[arg(long)]
        checkpoint: PathBuf,
        /// Data window, `path` or `path@start_ns..end_ns` (repeatable)
        #[arg(long)]
        data: Vec<String>,
        /// Configuration file (TOML)
        #[arg(short, long, env = "EXECRL_CONFIG")]
        config: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a synthetic tick file (.csv, .jsonl, optionally .zst)
    Synth {
        #[arg(short, long)]
        output: PathBuf,
        /// Number of tick records
        #[arg(long, default_value = "10000")]
        ticks: usize,
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Configuration file whose `data.synthetic` section shapes the market
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(short, long, default_value = "execrl.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
