//! Training run state
//!
//! Counters and the exploration rate live in an explicit [`TrainingContext`]
//! handed to every training call, so independent runs never share state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rl::config::TrainingConfig;

/// Multiplicative per-episode epsilon decay toward a floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    pub initial: f64,
    pub floor: f64,
    /// In (0, 1]
    pub decay: f64,
}

impl EpsilonSchedule {
    pub fn new(initial: f64, floor: f64, decay: f64) -> Self {
        let floor = floor.clamp(0.0, 1.0);
        Self {
            initial: initial.clamp(floor, 1.0),
            floor,
            decay: decay.clamp(f64::MIN_POSITIVE, 1.0),
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.epsilon_initial, config.epsilon_floor, config.epsilon_decay)
    }

    /// Epsilon after `episodes` completed episodes
    pub fn value_after(&self, episodes: u64) -> f64 {
        let exponent = i32::try_from(episodes).unwrap_or(i32::MAX);
        (self.initial * self.decay.powi(exponent)).max(self.floor)
    }

    /// Next value; never above `current`, never below the floor
    pub fn next(&self, current: f64) -> f64 {
        (current * self.decay).max(self.floor).min(current.max(self.floor))
    }
}

/// Process-scoped state of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Completed episodes
    pub episode_count: u64,
    /// Environment steps across all episodes
    pub global_step: u64,
    pub epsilon: f64,
    /// Learning calls since the last target synchronisation
    pub target_sync_counter: usize,
    /// Learning calls across the run
    pub learn_steps: u64,
    pub target_syncs: u64,
}

impl TrainingContext {
    pub fn new(schedule: &EpsilonSchedule) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            episode_count: 0,
            global_step: 0,
            epsilon: schedule.initial,
            target_sync_counter: 0,
            learn_steps: 0,
            target_syncs: 0,
        }
    }

    /// Count one learning call. Returns true when the target is due for
    /// synchronisation; the counter is reset in that case.
    pub fn record_learn(&mut self, target_sync_interval: usize) -> bool {
        self.learn_steps += 1;
        self.target_sync_counter += 1;
        if self.target_sync_counter >= target_sync_interval.max(1) {
            self.target_sync_counter = 0;
            self.target_syncs += 1;
            true
        } else {
            false
        }
    }

    /// Close an episode and decay epsilon
    pub fn finish_episode(&mut self, schedule: &EpsilonSchedule) {
        self.episode_count += 1;
        self.epsilon = schedule.next(self.epsilon);
    }
}
