#![allow(dead_code)]

use execrl::market::{generate_ticks, DataWindow, SyntheticConfig, TickSource};
use execrl::rl::{EnvConfig, RLConfig, RewardWeights};

/// Two-sided market, every level republished each second, ask depth
/// well above 1000 at all times
pub fn deep_market(intervals: usize, seed: u64) -> DataWindow {
    let config = SyntheticConfig {
        intervals,
        seed,
        level_volume: 800.0,
        levels: 10,
        trades_per_interval: 2,
        trade_volume: 20.0,
        ..SyntheticConfig::default()
    };
    DataWindow::whole(TickSource::memory(generate_ticks(&config)))
}

pub fn env_config() -> EnvConfig {
    EnvConfig {
        total_volume: 10_000.0,
        deadline_steps: 50,
        decision_interval_ns: 1_000_000_000,
        ..EnvConfig::default()
    }
}

pub fn weights() -> RewardWeights {
    RewardWeights {
        w_fill: 0.001,
        w_slip: 0.01,
        w_time_penalty: 5.0,
    }
}

/// Small, fast run on synthetic data
pub fn quick_rl_config(episodes: usize) -> RLConfig {
    let mut config = RLConfig {
        environment: EnvConfig {
            deadline_steps: 20,
            ..env_config()
        },
        reward: weights(),
        ..RLConfig::default()
    };
    config.training.episodes = episodes;
    config.training.batch_size = 8;
    config.training.min_replay_size = 16;
    config.training.replay_capacity = 500;
    config.training.target_sync_interval = 4;
    config.training.checkpoint_dir = None;
    config
}
