//! Output formatting for command results.
//!
//! Human-readable tables by default, JSON with `--json`.

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::rl::{EvaluationReport, PolicyReport, TrainingSummary};

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
    }
    Ok(())
}

/// Print a single item as pretty JSON.
pub fn print_json<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m{msg}\x1b[0m");
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Serialize, Tabled)]
pub struct MetricRow {
    pub metric: String,
    pub value: String,
}

impl MetricRow {
    fn new(metric: &str, value: impl ToString) -> Self {
        Self {
            metric: metric.to_string(),
            value: value.to_string(),
        }
    }
}

pub fn training_rows(summary: &TrainingSummary) -> Vec<MetricRow> {
    vec![
        MetricRow::new(
            "run_id",
            summary.run_id.map(|id| id.to_string()).unwrap_or_default(),
        ),
        MetricRow::new("episodes", summary.episodes),
        MetricRow::new("global_steps", summary.global_steps),
        MetricRow::new("learn_steps", summary.learn_steps),
        MetricRow::new("target_syncs", summary.target_syncs),
        MetricRow::new("mean_reward", format!("{:.4}", summary.mean_reward)),
        MetricRow::new("best_reward", fmt_opt(summary.best_reward, 4)),
        MetricRow::new("mean_fill_rate", format!("{:.2}%", summary.mean_fill_rate * 100.0)),
        MetricRow::new("mean_loss", fmt_opt(summary.mean_loss, 6)),
        MetricRow::new("final_epsilon", format!("{:.4}", summary.final_epsilon)),
        MetricRow::new("checkpoints_written", summary.checkpoints_written),
    ]
}

#[derive(Debug, Serialize, Tabled)]
pub struct PolicyRow {
    pub policy: String,
    pub episodes: usize,
    pub fill_rate: String,
    pub vwap: String,
    pub slippage_bps: String,
    pub reward: String,
}

impl From<&PolicyReport> for PolicyRow {
    fn from(report: &PolicyReport) -> Self {
        Self {
            policy: report.policy.clone(),
            episodes: report.episodes,
            fill_rate: format!("{:.2}%", report.mean_fill_rate * 100.0),
            vwap: fmt_opt(report.vwap, 4),
            slippage_bps: fmt_opt(report.mean_slippage_bps, 2),
            reward: format!("{:.4}", report.mean_reward),
        }
    }
}

pub fn evaluation_rows(report: &EvaluationReport) -> Vec<PolicyRow> {
    vec![PolicyRow::from(&report.agent), PolicyRow::from(&report.baseline)]
}
