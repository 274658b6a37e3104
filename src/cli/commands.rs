//! Command handlers. These block; the binary runs them on the blocking pool.

use anyhow::Context;
use std::path::Path;
use tracing::info;

use super::output::{self, OutputMode};
use crate::config::{parse_window, AppConfig};
use crate::error::{Component, ErrorContext, ExecError};
use crate::market::{generate_ticks, write_tick_file, DataWindow, SyntheticConfig};
use crate::rl::training::load_checkpoint;
use crate::rl::{Agent, EvaluationReport, Evaluator, LinearParameters, TrainingLoop, TrainingSummary};

fn load_config(path: Option<&Path>) -> Result<AppConfig, ExecError> {
    let config = AppConfig::load_from(path)?;
    config.ensure_valid()?;
    Ok(config)
}

pub fn run_train(
    config_path: Option<&Path>,
    episodes: Option<usize>,
    checkpoint_dir: Option<String>,
    mode: OutputMode,
) -> anyhow::Result<TrainingSummary> {
    let mut config = AppConfig::load_from(config_path)?;
    if let Some(episodes) = episodes {
        config.training.episodes = episodes;
    }
    if checkpoint_dir.is_some() {
        config.training.checkpoint_dir = checkpoint_dir;
    }
    config.ensure_valid()?;

    let windows = config.data.train_windows()?;
    let rl = config.rl();
    info!(
        episodes = rl.training.episodes,
        windows = windows.len(),
        state_dim = rl.environment.state_dim(),
        "Starting training"
    );

    let agent = Agent::linear(&rl)?;
    let mut trainer = TrainingLoop::new(rl, agent)?;
    let mut context = trainer.new_context();
    let summary = trainer.train(&mut context, &windows)?;

    match mode {
        OutputMode::Table => output::print_items(&output::training_rows(&summary), mode)?,
        OutputMode::Json => output::print_json(&summary)?,
    }
    Ok(summary)
}

pub fn run_evaluate(
    checkpoint_path: &Path,
    data: &[String],
    config_path: Option<&Path>,
    mode: OutputMode,
) -> anyhow::Result<EvaluationReport> {
    let config = load_config(config_path)?;
    let checkpoint = load_checkpoint::<LinearParameters>(checkpoint_path)?;
    info!(
        run_id = %checkpoint.run_id,
        episodes = checkpoint.episode_count,
        path = %checkpoint_path.display(),
        "Loaded checkpoint"
    );

    // The agent only understands the state layout it was trained on
    let mut rl = config.rl();
    rl.environment = checkpoint.environment.clone();
    rl.agent = checkpoint.agent.clone();
    let errors = rl.validate();
    if !errors.is_empty() {
        return Err(ExecError::config(
            ErrorContext::new(Component::Evaluator),
            format!("checkpoint configuration is invalid: {}", errors.join("; ")),
        )
        .into());
    }
    let agent = checkpoint.into_linear_agent()?;

    let windows: Vec<DataWindow> = if data.is_empty() {
        config.data.eval_windows()?
    } else {
        data.iter().map(|d| parse_window(d)).collect::<Result<Vec<_>, _>>()?
    };

    let report = Evaluator::new(&rl, rl.training.seed).evaluate(&agent, &windows)?;
    match mode {
        OutputMode::Table => {
            output::print_items(&output::evaluation_rows(&report), mode)?;
            if let Some(improvement) = report.improvement_bps {
                println!("Price improvement over baseline: {improvement:.2} bps");
            }
        }
        OutputMode::Json => output::print_json(&report)?,
    }
    Ok(report)
}

/// Write at least `ticks` synthetic records, truncated to exactly `ticks`
pub fn run_synth(
    output_path: &Path,
    ticks: usize,
    seed: u64,
    config_path: Option<&Path>,
) -> anyhow::Result<usize> {
    let base = match config_path {
        Some(path) => load_config(Some(path))?.data.synthetic,
        None => SyntheticConfig::default(),
    };
    let per_interval = (2 * base.levels.max(1) + base.trades_per_interval) as usize;
    let config = SyntheticConfig {
        seed,
        intervals: ticks.div_ceil(per_interval.max(1)).max(1),
        ..base
    };

    let mut generated = generate_ticks(&config);
    generated.truncate(ticks);
    write_tick_file(output_path, &generated)?;
    output::print_success(&format!(
        "Wrote {} ticks to {}",
        generated.len(),
        output_path.display()
    ));
    Ok(generated.len())
}

pub fn run_init_config(output_path: &Path, force: bool) -> anyhow::Result<()> {
    if output_path.exists() && !force {
        return Err(ExecError::config(
            ErrorContext::new(Component::Config),
            format!("{} exists; pass --force to overwrite", output_path.display()),
        )
        .into());
    }
    let toml = AppConfig::default().to_toml()?;
    std::fs::write(output_path, toml)
        .with_context(|| format!("writing {}", output_path.display()))?;
    output::print_success(&format!("Wrote default configuration to {}", output_path.display()));
    Ok(())
}

/// 2 for configuration errors, 3 for data and I/O errors, 1 otherwise
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<ExecError>() {
        if e.is_config_error() {
            return 2;
        }
        if e.is_data_error() {
            return 3;
        }
        return 1;
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return 3;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_exit_codes() {
        let ctx = ErrorContext::new(Component::Config);
        assert_eq!(exit_code(&ExecError::config(ctx, "bad").into()), 2);
        assert_eq!(exit_code(&ExecError::data(ctx, "empty window").into()), 3);
        assert_eq!(exit_code(&ExecError::state(ctx, "oops").into()), 1);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(exit_code(&anyhow::Error::from(io).context("reading")), 3);
    }

    #[test]
    fn test_synth_writes_exact_count() {
        let path = temp_dir().join(format!("execrl-synth-{}.csv", uuid::Uuid::new_v4()));
        let written = run_synth(&path, 250, 7, None).unwrap();
        assert_eq!(written, 250);

        let mut stream = DataWindow::whole(crate::market::TickSource::file(&path)).open().unwrap();
        let mut count = 0;
        while stream.next_tick().is_some() {
            count += 1;
        }
        assert_eq!(count, 250);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_evaluate_rejects_invalid_checkpoint_environment() {
        use crate::rl::training::{Checkpoint, Checkpointer, EpsilonSchedule, TrainingContext};

        let dir = temp_dir().join(format!("execrl-eval-{}", uuid::Uuid::new_v4()));
        let rl = AppConfig::default().rl();
        let agent = Agent::linear(&rl).unwrap();
        let context = TrainingContext::new(&EpsilonSchedule::from_config(&rl.training));
        let mut environment = rl.environment.clone();
        environment.tick_size = 0.0;

        let checkpoint = Checkpoint::capture(&context, &agent, &environment, &rl.agent);
        let path = Checkpointer::new(&dir, 1).save(&checkpoint, "broken").unwrap();

        let err = run_evaluate(&path, &[], None, OutputMode::Json).unwrap_err();
        assert_eq!(exit_code(&err), 2);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let path = temp_dir().join(format!("execrl-init-{}.toml", uuid::Uuid::new_v4()));
        run_init_config(&path, false).unwrap();
        let err = run_init_config(&path, false).unwrap_err();
        assert_eq!(exit_code(&err), 2);
        run_init_config(&path, true).unwrap();

        let loaded = AppConfig::load_from(Some(&path)).unwrap();
        assert!(loaded.validate().is_ok());
        std::fs::remove_file(path).ok();
    }
}
