//! Episode bookkeeping
//!
//! Volumes, counters and running execution cost for one attempt at working
//! a parent order. No market state lives here.

use serde::{Deserialize, Serialize};

use crate::market::FillOutcome;

/// Residual volume below this snaps to zero
pub const VOLUME_EPSILON: f64 = 1e-9;

/// One attempt to execute `total_volume` within `deadline_steps`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    pub window: String,
    pub seed: u64,
    pub total_volume: f64,
    pub deadline_steps: u32,
    pub steps_taken: u32,
    pub volume_remaining: f64,
    /// Executed volume so far
    pub filled_volume: f64,
    /// Child order volume submitted so far
    pub requested_volume: f64,
    /// Submitted volume that did not execute
    pub residual_volume: f64,
    /// Sum of executed volume times price
    pub notional: f64,
    /// Sum of executed volume times |price - mid at decision|
    pub slippage_cost: f64,
    /// Mid after warm-up, before the first decision
    pub arrival_mid: Option<f64>,
    pub total_reward: f64,
    pub done: bool,
}

impl Episode {
    pub fn new(id: u64, window: String, seed: u64, total_volume: f64, deadline_steps: u32) -> Self {
        Self {
            id,
            window,
            seed,
            total_volume,
            deadline_steps,
            steps_taken: 0,
            volume_remaining: total_volume,
            filled_volume: 0.0,
            requested_volume: 0.0,
            residual_volume: 0.0,
            notional: 0.0,
            slippage_cost: 0.0,
            arrival_mid: None,
            total_reward: 0.0,
            done: false,
        }
    }

    pub fn steps_remaining(&self) -> u32 {
        self.deadline_steps.saturating_sub(self.steps_taken)
    }

    /// Book one child order's outcome and advance the step counter.
    /// Returns true when the episode has reached a terminal state.
    pub fn record(&mut self, fill: &FillOutcome, mid_at_decision: Option<f64>) -> bool {
        let executed = fill.executed_volume.min(self.volume_remaining).max(0.0);

        self.requested_volume += fill.requested_volume;
        self.residual_volume += fill.requested_volume - executed;
        self.filled_volume += executed;

        if let Some(avg) = fill.executed_price_avg {
            self.notional += executed * avg;
            if let Some(mid) = mid_at_decision {
                self.slippage_cost += executed * (avg - mid).abs();
            }
        }

        let before = self.volume_remaining;
        self.volume_remaining -= executed;
        if self.volume_remaining < VOLUME_EPSILON {
            self.volume_remaining = 0.0;
        }
        debug_assert!(self.volume_remaining <= before);

        self.steps_taken += 1;
        self.done = self.volume_remaining <= 0.0 || self.steps_remaining() == 0;
        self.done
    }

    pub fn fill_rate(&self) -> f64 {
        if self.total_volume > 0.0 {
            self.filled_volume / self.total_volume
        } else {
            0.0
        }
    }

    /// Volume-weighted average execution price
    pub fn vwap(&self) -> Option<f64> {
        (self.filled_volume > VOLUME_EPSILON).then(|| self.notional / self.filled_volume)
    }

    /// Signed cost of the executed volume against the arrival mid, in bps.
    /// Positive means worse than arrival for the given direction.
    pub fn slippage_bps(&self, buying: bool) -> Option<f64> {
        let vwap = self.vwap()?;
        let mid = self.arrival_mid.filter(|m| *m > 0.0)?;
        let signed = if buying { vwap - mid } else { mid - vwap };
        Some(signed / mid * 10_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(requested: f64, executed: f64, avg: Option<f64>) -> FillOutcome {
        FillOutcome {
            requested_volume: requested,
            executed_volume: executed,
            executed_price_avg: avg,
            residual_unfilled: requested - executed,
            levels_consumed: usize::from(executed > 0.0),
        }
    }

    #[test]
    fn test_volume_accounting() {
        let mut episode = Episode::new(1, "w".into(), 0, 1_000.0, 5);
        assert!(!episode.record(&fill(400.0, 300.0, Some(100.02)), Some(100.0)));
        assert!(!episode.record(&fill(0.0, 0.0, None), Some(100.0)));

        assert_eq!(episode.volume_remaining, 700.0);
        assert_eq!(episode.filled_volume, 300.0);
        assert_eq!(
            episode.filled_volume + episode.residual_volume,
            episode.requested_volume
        );
        assert!((episode.slippage_cost - 6.0).abs() < 1e-9);
        assert_eq!(episode.steps_remaining(), 3);
    }

    #[test]
    fn test_terminal_on_full_execution() {
        let mut episode = Episode::new(1, "w".into(), 0, 100.0, 5);
        assert!(episode.record(&fill(100.0, 100.0 - 1e-12, Some(10.0)), Some(10.0)));
        assert_eq!(episode.volume_remaining, 0.0);
        assert!((episode.fill_rate() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_on_deadline() {
        let mut episode = Episode::new(1, "w".into(), 0, 100.0, 2);
        assert!(!episode.record(&FillOutcome::default(), None));
        assert!(episode.record(&FillOutcome::default(), None));
        assert_eq!(episode.steps_remaining(), 0);
        assert_eq!(episode.vwap(), None);
    }

    #[test]
    fn test_slippage_bps_direction() {
        let mut episode = Episode::new(1, "w".into(), 0, 100.0, 2);
        episode.arrival_mid = Some(100.0);
        episode.record(&fill(100.0, 100.0, Some(100.01)), Some(100.0));
        let buy = episode.slippage_bps(true).unwrap();
        let sell = episode.slippage_bps(false).unwrap();
        assert!((buy - 1.0).abs() < 1e-6);
        assert!((sell + 1.0).abs() < 1e-6);
    }
}
