//! Policy Evaluation
//!
//! Replays a frozen agent (epsilon = 0) and a deterministic slicing
//! baseline over the same held-out windows and reports execution quality.
//! Evaluation owns its own environment and never touches training state.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::market::{DataWindow, Side};
use crate::rl::agent::Agent;
use crate::rl::approximator::ValueApproximator;
use crate::rl::config::{EnvConfig, EvalConfig, RLConfig, SizingBasis};
use crate::rl::core::{Action, RewardWeights, StateVector};
use crate::rl::environment::ExecutionEnvironment;

/// Equal limit slices at regular step intervals, no-op in between
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselinePolicy {
    slices: u32,
    price_offset: i64,
    deadline_steps: u32,
    sizing_basis: SizingBasis,
}

impl BaselinePolicy {
    pub fn new(slices: u32, price_offset: i64, deadline_steps: u32, sizing_basis: SizingBasis) -> Self {
        let deadline_steps = deadline_steps.max(1);
        Self {
            slices: slices.clamp(1, deadline_steps),
            price_offset,
            deadline_steps,
            sizing_basis,
        }
    }

    pub fn from_config(eval: &EvalConfig, env: &EnvConfig) -> Self {
        Self::new(
            eval.baseline_slices,
            eval.baseline_price_offset,
            env.deadline_steps,
            env.sizing_basis,
        )
    }

    pub fn slices(&self) -> u32 {
        self.slices
    }

    /// Slice k is submitted at step `floor(k * deadline / slices)`
    fn slice_at(&self, step: u32) -> Option<u32> {
        let (s, d) = (u64::from(self.slices), u64::from(self.deadline_steps));
        let k = (u64::from(step) * s).div_ceil(d);
        (k < s && k * d / s == u64::from(step)).then_some(k as u32)
    }

    /// Action for a 0-based step index
    pub fn action_for_step(&self, step: u32) -> Action {
        let Some(k) = self.slice_at(step) else {
            return Action::NoOp;
        };
        let size_fraction = match self.sizing_basis {
            SizingBasis::Initial => 1.0 / f64::from(self.slices),
            SizingBasis::Remaining => 1.0 / f64::from(self.slices - k),
        };
        Action::LimitOrder {
            size_fraction,
            price_offset: self.price_offset,
        }
    }
}

/// Execution quality of one episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub window: String,
    pub steps: u32,
    pub filled_volume: f64,
    pub total_volume: f64,
    pub fill_rate: f64,
    pub vwap: Option<f64>,
    pub arrival_mid: Option<f64>,
    /// Cost against arrival mid; positive is worse
    pub slippage_bps: Option<f64>,
    pub total_reward: f64,
}

/// Aggregate over all evaluation windows for one policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyReport {
    pub policy: String,
    pub episodes: usize,
    pub mean_fill_rate: f64,
    /// Volume-weighted across episodes
    pub vwap: Option<f64>,
    pub mean_slippage_bps: Option<f64>,
    pub mean_reward: f64,
    pub per_episode: Vec<ExecutionStats>,
}

impl PolicyReport {
    fn from_stats(policy: &str, per_episode: Vec<ExecutionStats>) -> Self {
        let n = per_episode.len().max(1) as f64;
        let filled: f64 = per_episode.iter().map(|s| s.filled_volume).sum();
        let notional: f64 = per_episode
            .iter()
            .filter_map(|s| s.vwap.map(|v| v * s.filled_volume))
            .sum();
        let slippages: Vec<f64> = per_episode.iter().filter_map(|s| s.slippage_bps).collect();

        Self {
            policy: policy.to_string(),
            episodes: per_episode.len(),
            mean_fill_rate: per_episode.iter().map(|s| s.fill_rate).sum::<f64>() / n,
            vwap: (filled > 0.0).then(|| notional / filled),
            mean_slippage_bps: (!slippages.is_empty())
                .then(|| slippages.iter().sum::<f64>() / slippages.len() as f64),
            mean_reward: per_episode.iter().map(|s| s.total_reward).sum::<f64>() / n,
            per_episode,
        }
    }
}

/// Agent versus baseline on the same windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub windows: usize,
    pub agent: PolicyReport,
    pub baseline: PolicyReport,
    /// Baseline slippage minus agent slippage; positive favours the agent
    pub improvement_bps: Option<f64>,
}

pub struct Evaluator {
    env_config: EnvConfig,
    weights: RewardWeights,
    baseline: BaselinePolicy,
    seed: u64,
}

impl Evaluator {
    pub fn new(config: &RLConfig, seed: u64) -> Self {
        Self {
            env_config: config.environment.clone(),
            weights: config.reward,
            baseline: BaselinePolicy::from_config(&config.evaluation, &config.environment),
            seed,
        }
    }

    pub fn baseline(&self) -> &BaselinePolicy {
        &self.baseline
    }

    /// Run `policy` over every window; the policy sees the state and the
    /// 0-based step index
    pub fn run_policy<F>(&self, label: &str, windows: &[DataWindow], mut policy: F) -> Result<PolicyReport>
    where
        F: FnMut(&StateVector, u32) -> Result<Action>,
    {
        let mut env = ExecutionEnvironment::new(self.env_config.clone(), self.weights);
        let buying = self.env_config.side == Side::Buy;
        let mut per_episode = Vec::with_capacity(windows.len());

        for (i, window) in windows.iter().enumerate() {
            let mut state = env.reset_with_defaults(window, self.seed.wrapping_add(i as u64))?;
            let mut step = 0u32;
            loop {
                let action = policy(&state, step)?;
                let result = env.step(action)?;
                step += 1;
                state = result.next_state;
                if result.done {
                    break;
                }
            }

            let episode = env.episode().ok_or_else(|| {
                ExecError::state(ErrorContext::new(Component::Evaluator), "no episode after run")
            })?;
            per_episode.push(ExecutionStats {
                window: episode.window.clone(),
                steps: episode.steps_taken,
                filled_volume: episode.filled_volume,
                total_volume: episode.total_volume,
                fill_rate: episode.fill_rate(),
                vwap: episode.vwap(),
                arrival_mid: episode.arrival_mid,
                slippage_bps: episode.slippage_bps(buying),
                total_reward: episode.total_reward,
            });
        }

        Ok(PolicyReport::from_stats(label, per_episode))
    }

    /// Greedy agent against the baseline
    pub fn evaluate<A: ValueApproximator>(
        &self,
        agent: &Agent<A>,
        windows: &[DataWindow],
    ) -> Result<EvaluationReport> {
        if windows.is_empty() {
            return Err(ExecError::config(
                ErrorContext::new(Component::Evaluator),
                "no evaluation windows",
            ));
        }
        let expected = self.env_config.state_dim();
        if agent.live().state_dim() != expected {
            return Err(ExecError::config(
                ErrorContext::new(Component::Evaluator),
                format!(
                    "agent expects {} state features, environment produces {expected}",
                    agent.live().state_dim()
                ),
            ));
        }

        let agent_report = self.run_policy("agent", windows, |state, _| {
            let index = agent.greedy_index(state)?;
            agent.action_space().get(index).ok_or_else(|| {
                ExecError::state(
                    ErrorContext::new(Component::Evaluator),
                    format!("action index {index} out of range"),
                )
            })
        })?;
        let baseline = self.baseline;
        let baseline_report =
            self.run_policy("baseline", windows, |_, step| Ok(baseline.action_for_step(step)))?;

        let improvement_bps = match (baseline_report.mean_slippage_bps, agent_report.mean_slippage_bps) {
            (Some(b), Some(a)) => Some(b - a),
            _ => None,
        };

        info!(
            windows = windows.len(),
            agent_fill_rate = agent_report.mean_fill_rate,
            baseline_fill_rate = baseline_report.mean_fill_rate,
            agent_vwap = ?agent_report.vwap,
            baseline_vwap = ?baseline_report.vwap,
            improvement_bps = ?improvement_bps,
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            windows: windows.len(),
            agent: agent_report,
            baseline: baseline_report,
            improvement_bps,
        })
    }
}
