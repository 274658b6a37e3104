use clap::Parser;
use execrl::cli::{self, Cli, Commands, OutputMode};
use execrl::config::{AppConfig, LoggingConfig};
use std::path::Path;
use tracing::error;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli.command).await {
        let code = cli::exit_code(&e);
        error!(error = %e, code, "Command failed");
        cli::output::print_error(&format!("Error: {e:#}"));
        std::process::exit(code);
    }
}

/// Logging section of the config file, or defaults when it cannot be read.
/// The command itself reports the load failure.
fn logging_config(path: Option<&Path>) -> LoggingConfig {
    AppConfig::load_from(path)
        .map(|c| c.logging)
        .unwrap_or_default()
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Train {
            config,
            episodes,
            checkpoint_dir,
            json,
        } => {
            init_logging(&logging_config(config.as_deref()));
            let mode = OutputMode::from_json_flag(json);
            tokio::task::spawn_blocking(move || {
                cli::run_train(config.as_deref(), episodes, checkpoint_dir, mode)
            })
            .await??;
        }
        Commands::Evaluate {
            checkpoint,
            data,
            config,
            json,
        } => {
            init_logging(&logging_config(config.as_deref()));
            let mode = OutputMode::from_json_flag(json);
            tokio::task::spawn_blocking(move || {
                cli::run_evaluate(&checkpoint, &data, config.as_deref(), mode)
            })
            .await??;
        }
        Commands::Synth {
            output,
            ticks,
            seed,
            config,
        } => {
            init_logging_simple();
            cli::run_synth(&output, ticks, seed, config.as_deref())?;
        }
        Commands::InitConfig { output, force } => {
            init_logging_simple();
            cli::run_init_config(&output, force)?;
        }
    }
    Ok(())
}
