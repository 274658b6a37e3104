//! RL Configuration
//!
//! Configuration structs for the execution environment, agent, training
//! loop and evaluator.

use serde::{Deserialize, Serialize};

use crate::market::Side;

/// Main RL configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RLConfig {
    /// Execution environment configuration
    pub environment: EnvConfig,
    /// Reward weights
    pub reward: RewardWeights,
    /// Agent and approximator configuration
    pub agent: AgentConfig,
    /// Training loop configuration
    pub training: TrainingConfig,
    /// Evaluation configuration
    pub evaluation: EvalConfig,
}

impl RLConfig {
    /// Collect every invalid value across all sections
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.environment.validate());
        errors.extend(self.reward.validate());
        errors.extend(self.agent.validate());
        errors.extend(self.training.validate());
        errors.extend(self.evaluation.validate());
        errors
    }
}

/// What `size_fraction` is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingBasis {
    /// Fraction of the episode's total volume, capped at what remains
    Initial,
    /// Fraction of the volume still remaining
    Remaining,
}

/// Execution environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Parent order size
    pub total_volume: f64,
    /// Decisions available before the deadline
    pub deadline_steps: u32,
    /// Market time between decisions, in nanoseconds
    pub decision_interval_ns: u64,
    /// Direction of the parent order
    pub side: Side,
    pub sizing_basis: SizingBasis,
    /// Price grid of the instrument
    pub tick_size: f64,
    /// Depth buckets per side (N)
    pub book_buckets: usize,
    /// Price ticks per depth bucket
    pub bucket_ticks: u32,
    /// Rolling window length for volatility and volume trend (W)
    pub feature_window_size: usize,
    /// Volatility (bps) that maps to ~0.76 after tanh squashing
    pub volatility_scale_bps: f64,
    /// Random extra warm-up intervals at reset, drawn from the episode seed
    pub start_jitter_steps: u32,
    /// Background read-ahead depth for tick streams; 0 reads inline
    pub prefetch_depth: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            total_volume: 10_000.0,
            deadline_steps: 50,
            decision_interval_ns: 1_000_000_000,
            side: Side::Buy,
            sizing_basis: SizingBasis::Initial,
            tick_size: 0.01,
            book_buckets: 5,
            bucket_ticks: 1,
            feature_window_size: 100,
            volatility_scale_bps: 5.0,
            start_jitter_steps: 0,
            prefetch_depth: 0,
        }
    }
}

impl EnvConfig {
    /// Length of the state vector produced for this configuration
    pub fn state_dim(&self) -> usize {
        crate::rl::core::state::BASE_FEATURES + 2 * self.book_buckets
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.total_volume.is_finite() && self.total_volume > 0.0) {
            errors.push("environment.total_volume must be positive".to_string());
        }
        if self.deadline_steps == 0 {
            errors.push("environment.deadline_steps must be positive".to_string());
        }
        if self.decision_interval_ns == 0 {
            errors.push("environment.decision_interval_ns must be positive".to_string());
        }
        if !(self.tick_size.is_finite() && self.tick_size > 0.0) {
            errors.push("environment.tick_size must be positive".to_string());
        }
        if self.book_buckets == 0 {
            errors.push("environment.book_buckets must be positive".to_string());
        }
        if self.feature_window_size == 0 {
            errors.push("environment.feature_window_size must be positive".to_string());
        }
        if !(self.volatility_scale_bps.is_finite() && self.volatility_scale_bps > 0.0) {
            errors.push("environment.volatility_scale_bps must be positive".to_string());
        }
        errors
    }
}

/// Reward weights; all non-negative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Reward per unit of executed volume
    pub w_fill: f64,
    /// Penalty per unit volume per unit price of slippage against mid
    pub w_slip: f64,
    /// One-off penalty when the deadline hits with volume left
    pub w_time_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            w_fill: 0.001,
            w_slip: 0.1,
            w_time_penalty: 10.0,
        }
    }
}

impl RewardWeights {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("w_fill", self.w_fill),
            ("w_slip", self.w_slip),
            ("w_time_penalty", self.w_time_penalty),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(format!("reward.{name} must be finite and non-negative"));
            }
        }
        errors
    }
}

/// Discrete action set offered to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpaceConfig {
    /// Size fractions for market orders
    pub market_fractions: Vec<f64>,
    /// Size fractions for limit orders
    pub limit_fractions: Vec<f64>,
    /// Limit price offsets in ticks from the opposite touch
    pub limit_offsets: Vec<i64>,
}

impl Default for ActionSpaceConfig {
    fn default() -> Self {
        Self {
            market_fractions: vec![0.02, 0.05, 0.1, 0.25],
            limit_fractions: vec![0.05, 0.1],
            limit_offsets: vec![-1, 0, 1],
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Discount factor (gamma)
    pub discount_factor: f64,
    /// SGD step size of the reference approximator
    pub learning_rate: f64,
    /// TD errors are clipped to +/- this value before the update
    pub max_td_error: f64,
    /// Seed for approximator initialisation
    pub seed: u64,
    pub actions: ActionSpaceConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            discount_factor: 0.99,
            learning_rate: 0.01,
            max_td_error: 10.0,
            seed: 7,
            actions: ActionSpaceConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.discount_factor) {
            errors.push("agent.discount_factor must be within [0, 1]".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            errors.push("agent.learning_rate must be positive".to_string());
        }
        if !(self.max_td_error.is_finite() && self.max_td_error > 0.0) {
            errors.push("agent.max_td_error must be positive".to_string());
        }
        let fractions = self
            .actions
            .market_fractions
            .iter()
            .chain(self.actions.limit_fractions.iter());
        for fraction in fractions {
            if !(*fraction > 0.0 && *fraction <= 1.0) {
                errors.push(format!("agent.actions fraction {fraction} must be within (0, 1]"));
            }
        }
        if !self.actions.limit_fractions.is_empty() && self.actions.limit_offsets.is_empty() {
            errors.push("agent.actions.limit_offsets must not be empty when limit_fractions is set".to_string());
        }
        errors
    }
}

/// Training loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Episodes per training run
    pub episodes: usize,
    /// Exploration rate at the first episode
    pub epsilon_initial: f64,
    /// Exploration rate never decays below this
    pub epsilon_floor: f64,
    /// Multiplicative decay per episode, in (0, 1]
    pub epsilon_decay: f64,
    /// Replay buffer capacity
    pub replay_capacity: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Minimum stored transitions before learning starts
    pub min_replay_size: usize,
    /// Learning calls between target synchronisations
    pub target_sync_interval: usize,
    /// Directory for checkpoints; none disables checkpointing
    pub checkpoint_dir: Option<String>,
    /// Checkpoint frequency in episodes (0 = only at the end)
    pub checkpoint_every: usize,
    /// Older checkpoints beyond this count are removed
    pub keep_checkpoints: usize,
    /// Seed for exploration, episode jitter and replay sampling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 200,
            epsilon_initial: 1.0,
            epsilon_floor: 0.05,
            epsilon_decay: 0.98,
            replay_capacity: 50_000,
            batch_size: 32,
            min_replay_size: 256,
            target_sync_interval: 200,
            checkpoint_dir: None,
            checkpoint_every: 0,
            keep_checkpoints: 5,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.epsilon_initial) {
            errors.push("training.epsilon_initial must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.epsilon_floor) {
            errors.push("training.epsilon_floor must be within [0, 1]".to_string());
        }
        if self.epsilon_floor > self.epsilon_initial {
            errors.push("training.epsilon_floor must not exceed epsilon_initial".to_string());
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            errors.push("training.epsilon_decay must be within (0, 1]".to_string());
        }
        if self.replay_capacity == 0 {
            errors.push("training.replay_capacity must be positive".to_string());
        }
        if self.batch_size == 0 {
            errors.push("training.batch_size must be positive".to_string());
        }
        if self.batch_size > self.replay_capacity {
            errors.push("training.batch_size must not exceed replay_capacity".to_string());
        }
        if self.min_replay_size > self.replay_capacity {
            errors.push("training.min_replay_size must not exceed replay_capacity".to_string());
        }
        if self.target_sync_interval == 0 {
            errors.push("training.target_sync_interval must be positive".to_string());
        }
        errors
    }
}

/// Evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Equal child slices submitted by the baseline across the deadline
    pub baseline_slices: u32,
    /// Baseline limit offset in ticks from the opposite touch
    pub baseline_price_offset: i64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            baseline_slices: 10,
            baseline_price_offset: 0,
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.baseline_slices == 0 {
            errors.push("evaluation.baseline_slices must be positive".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RLConfig::default().validate().is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RLConfig::default();
        config.environment.deadline_steps = 0;
        config.reward.w_slip = -1.0;
        config.training.epsilon_decay = 1.5;

        let errors = config.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("deadline_steps")));
        assert!(errors.iter().any(|e| e.contains("w_slip")));
        assert!(errors.iter().any(|e| e.contains("epsilon_decay")));
    }

    #[test]
    fn test_state_dim_tracks_buckets() {
        let config = EnvConfig {
            book_buckets: 3,
            ..Default::default()
        };
        assert_eq!(config.state_dim(), 4 + 6);
    }
}
