//! Reward Function
//!
//! ```text
//! reward = w_fill * executed_volume
//!        - w_slip * executed_volume * |executed_price_avg - mid_at_decision|
//!        - w_time_penalty * (done && volume_remaining > 0 ? 1 : 0)
//! ```
//!
//! Pure function of the weights and the resulting fill; no randomness.

use serde::{Deserialize, Serialize};

pub use crate::rl::config::RewardWeights;

/// Reward split into its weighted terms
///
/// Keeping the terms separate shows which component drives behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// `w_fill * executed_volume`
    pub fill_term: f64,
    /// `w_slip * executed_volume * |avg - mid|`, subtracted
    pub slippage_term: f64,
    /// `w_time_penalty` when the deadline hits with residual volume, subtracted
    pub time_penalty_term: f64,
    /// fill - slippage - time penalty
    pub total: f64,
}

/// Fill result of one step as seen by the reward function
#[derive(Debug, Clone, Copy)]
pub struct RewardInput {
    pub executed_volume: f64,
    pub executed_price_avg: Option<f64>,
    pub mid_at_decision: Option<f64>,
    pub done: bool,
    pub volume_remaining: f64,
}

impl RewardWeights {
    pub fn compute(&self, input: &RewardInput) -> RewardBreakdown {
        let fill_term = self.w_fill * input.executed_volume;

        let slippage_term = match (input.executed_price_avg, input.mid_at_decision) {
            (Some(avg), Some(mid)) if input.executed_volume > 0.0 => {
                self.w_slip * input.executed_volume * (avg - mid).abs()
            }
            _ => 0.0,
        };

        let time_penalty_term = if input.done && input.volume_remaining > 0.0 {
            self.w_time_penalty
        } else {
            0.0
        };

        RewardBreakdown {
            fill_term,
            slippage_term,
            time_penalty_term,
            total: fill_term - slippage_term - time_penalty_term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> RewardWeights {
        RewardWeights {
            w_fill: 0.01,
            w_slip: 2.0,
            w_time_penalty: 5.0,
        }
    }

    #[test]
    fn test_fill_and_slippage() {
        let r = weights().compute(&RewardInput {
            executed_volume: 100.0,
            executed_price_avg: Some(100.02),
            mid_at_decision: Some(100.0),
            done: false,
            volume_remaining: 900.0,
        });
        assert!((r.fill_term - 1.0).abs() < 1e-12);
        assert!((r.slippage_term - 4.0).abs() < 1e-9);
        assert_eq!(r.time_penalty_term, 0.0);
        assert!((r.total - (1.0 - 4.0)).abs() < 1e-9);
    }

    #[test]
    fn test_time_penalty_only_with_residual() {
        let base = RewardInput {
            executed_volume: 0.0,
            executed_price_avg: None,
            mid_at_decision: Some(100.0),
            done: true,
            volume_remaining: 10.0,
        };
        assert_eq!(weights().compute(&base).time_penalty_term, 5.0);
        assert_eq!(weights().compute(&base).total, -5.0);

        let finished = RewardInput {
            volume_remaining: 0.0,
            ..base
        };
        assert_eq!(weights().compute(&finished).time_penalty_term, 0.0);

        let running = RewardInput { done: false, ..base };
        assert_eq!(weights().compute(&running).total, 0.0);
    }

    #[test]
    fn test_deterministic() {
        let input = RewardInput {
            executed_volume: 37.0,
            executed_price_avg: Some(99.97),
            mid_at_decision: Some(100.0),
            done: false,
            volume_remaining: 1.0,
        };
        assert_eq!(weights().compute(&input), weights().compute(&input));
    }
}
