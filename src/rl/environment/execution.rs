//! Execution Environment
//!
//! Episodic decision process over a tick stream. Each `step` submits one
//! child order against the simulated book, then replays market ticks up to
//! the next decision boundary.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::episode::Episode;
use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::market::{
    DataWindow, FeatureAggregator, FillOutcome, OrderBookModel, Tick, TickStream,
};
use crate::rl::config::{EnvConfig, SizingBasis};
use crate::rl::core::{
    Action, EpisodeProgress, RewardBreakdown, RewardInput, RewardWeights, StateEncoder,
    StateVector,
};

/// Outcome of one `step`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub next_state: StateVector,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Diagnostics for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    pub episode_id: u64,
    /// 1-based index of this step within the episode
    pub step: u32,
    pub action: Action,
    pub requested_volume: f64,
    pub executed_volume: f64,
    pub executed_price_avg: Option<f64>,
    pub residual_unfilled: f64,
    pub mid_at_decision: Option<f64>,
    pub volume_remaining: f64,
    pub cumulative_filled: f64,
    pub cumulative_requested: f64,
    pub cumulative_residual: f64,
    /// executed_volume * |avg - mid| for this step
    pub slippage_cost: f64,
    pub reward: RewardBreakdown,
    /// Ticks replayed after the fill, up to the next decision
    pub ticks_replayed: usize,
}

/// Gym-style environment for optimal execution
pub struct ExecutionEnvironment {
    config: EnvConfig,
    weights: RewardWeights,
    encoder: StateEncoder,
    book: OrderBookModel,
    features: FeatureAggregator,
    stream: Option<TickStream>,
    /// First tick at or past the current decision boundary
    pending: Option<Tick>,
    next_boundary: u64,
    episode: Option<Episode>,
    episodes_started: u64,
}

impl ExecutionEnvironment {
    pub fn new(config: EnvConfig, weights: RewardWeights) -> Self {
        Self {
            encoder: StateEncoder::new(config.book_buckets, config.volatility_scale_bps),
            book: OrderBookModel::new(config.tick_size, config.book_buckets, config.bucket_ticks),
            features: FeatureAggregator::new(config.feature_window_size),
            config,
            weights,
            stream: None,
            pending: None,
            next_boundary: 0,
            episode: None,
            episodes_started: 0,
        }
    }

    /// Bind a fresh episode to `window`.
    ///
    /// Warms up by replaying the first decision interval, plus a seeded
    /// number of extra intervals, so the first state sees a populated book.
    pub fn reset(
        &mut self,
        window: &DataWindow,
        total_volume: f64,
        deadline_steps: u32,
        seed: u64,
    ) -> Result<StateVector> {
        let episode_id = self.episodes_started + 1;
        let ctx = ErrorContext::new(Component::Environment).episode(episode_id);

        if !(total_volume.is_finite() && total_volume > 0.0) {
            return Err(ExecError::config(
                ctx,
                format!("total_volume must be positive, got {total_volume}"),
            ));
        }
        if deadline_steps == 0 {
            return Err(ExecError::config(ctx, "deadline_steps must be positive"));
        }

        let mut stream = if self.config.prefetch_depth > 0 {
            window.open_prefetched(self.config.prefetch_depth)?
        } else {
            window.open()?
        };
        let first = stream.next_tick().ok_or_else(|| {
            ExecError::data(
                ctx,
                format!("data window {} contains no valid ticks", window.label()),
            )
        })?;

        self.episodes_started = episode_id;
        self.book.clear();
        self.features.reset();
        self.stream = Some(stream);
        self.pending = Some(first);

        let mut rng = StdRng::seed_from_u64(seed);
        let jitter = if self.config.start_jitter_steps > 0 {
            rng.gen_range(0..=self.config.start_jitter_steps)
        } else {
            0
        };
        let warmup = u64::from(jitter) + 1;
        self.next_boundary = first
            .timestamp
            .saturating_add(warmup.saturating_mul(self.config.decision_interval_ns));
        let warmup_ticks = self.replay_until(self.next_boundary);

        let mut episode = Episode::new(
            episode_id,
            window.label(),
            seed,
            total_volume,
            deadline_steps,
        );
        episode.arrival_mid = self.book.mid_price();

        let state = self.encode(&episode, ctx.step(0))?;
        debug!(
            episode_id,
            window = %episode.window,
            total_volume,
            deadline_steps,
            warmup_intervals = warmup,
            warmup_ticks,
            arrival_mid = ?episode.arrival_mid,
            "Episode reset"
        );
        self.episode = Some(episode);
        Ok(state)
    }

    /// Reset with the configured volume and deadline
    pub fn reset_with_defaults(&mut self, window: &DataWindow, seed: u64) -> Result<StateVector> {
        let (total_volume, deadline_steps) = (self.config.total_volume, self.config.deadline_steps);
        self.reset(window, total_volume, deadline_steps, seed)
    }

    /// Advance the episode by one decision interval
    pub fn step(&mut self, action: Action) -> Result<StepResult> {
        let (episode_id, step, basis, remaining) = {
            let episode = self.episode.as_ref().ok_or_else(|| {
                ExecError::state(
                    ErrorContext::new(Component::Environment),
                    "step called before reset",
                )
            })?;
            if episode.done {
                return Err(ExecError::state(
                    ErrorContext::new(Component::Environment)
                        .episode(episode.id)
                        .step(u64::from(episode.steps_taken)),
                    "step called on terminated episode",
                ));
            }
            let basis = match self.config.sizing_basis {
                SizingBasis::Initial => episode.total_volume,
                SizingBasis::Remaining => episode.volume_remaining,
            };
            (
                episode.id,
                episode.steps_taken + 1,
                basis,
                episode.volume_remaining,
            )
        };
        let ctx = ErrorContext::new(Component::Environment)
            .episode(episode_id)
            .step(u64::from(step));

        if !action.is_valid() {
            return Err(ExecError::config(
                ctx,
                format!("invalid action {}", action.label()),
            ));
        }

        let mid_at_decision = self.book.mid_price();
        let fill = match action.to_child_order(self.config.side, basis, remaining) {
            Some(order) if mid_at_decision.is_some() => self.book.apply_fill(&order),
            Some(order) => FillOutcome {
                requested_volume: order.size,
                residual_unfilled: order.size,
                ..FillOutcome::default()
            },
            None => FillOutcome::default(),
        };

        let done = self
            .episode
            .as_mut()
            .ok_or_else(|| ExecError::state(ctx, "episode vanished during step"))?
            .record(&fill, mid_at_decision);

        self.next_boundary = self
            .next_boundary
            .saturating_add(self.config.decision_interval_ns);
        let ticks_replayed = self.replay_until(self.next_boundary);

        let episode = self
            .episode
            .as_ref()
            .ok_or_else(|| ExecError::state(ctx, "episode vanished during step"))?;

        let reward = self.weights.compute(&RewardInput {
            executed_volume: fill.executed_volume,
            executed_price_avg: fill.executed_price_avg,
            mid_at_decision,
            done,
            volume_remaining: episode.volume_remaining,
        });
        let next_state = self.encode(episode, ctx)?;

        let slippage_cost = match (fill.executed_price_avg, mid_at_decision) {
            (Some(avg), Some(mid)) => fill.executed_volume * (avg - mid).abs(),
            _ => 0.0,
        };
        let info = StepInfo {
            episode_id,
            step,
            action,
            requested_volume: fill.requested_volume,
            executed_volume: fill.executed_volume,
            executed_price_avg: fill.executed_price_avg,
            residual_unfilled: fill.residual_unfilled,
            mid_at_decision,
            volume_remaining: episode.volume_remaining,
            cumulative_filled: episode.filled_volume,
            cumulative_requested: episode.requested_volume,
            cumulative_residual: episode.residual_volume,
            slippage_cost,
            reward,
            ticks_replayed,
        };

        if let Some(episode) = self.episode.as_mut() {
            episode.total_reward += reward.total;
            if done {
                info!(
                    episode_id,
                    steps = episode.steps_taken,
                    filled = episode.filled_volume,
                    total_volume = episode.total_volume,
                    fill_rate = episode.fill_rate(),
                    vwap = ?episode.vwap(),
                    total_reward = episode.total_reward,
                    "Episode finished"
                );
            }
        }

        Ok(StepResult {
            next_state,
            reward: reward.total,
            done,
            info,
        })
    }

    /// Feed ticks strictly before `boundary` into the book and features
    fn replay_until(&mut self, boundary: u64) -> usize {
        let mut replayed = 0;
        loop {
            let tick = match self.pending.take() {
                Some(tick) => tick,
                None => match self.stream.as_mut().and_then(|s| s.next_tick()) {
                    Some(tick) => tick,
                    None => break,
                },
            };
            if tick.timestamp >= boundary {
                self.pending = Some(tick);
                break;
            }
            self.book.apply_tick(&tick);
            self.features.observe(&tick);
            replayed += 1;
        }
        replayed
    }

    fn encode(&self, episode: &Episode, ctx: ErrorContext) -> Result<StateVector> {
        let progress = EpisodeProgress {
            steps_remaining: episode.steps_remaining(),
            deadline_steps: episode.deadline_steps,
            volume_remaining: episode.volume_remaining,
            total_volume: episode.total_volume,
        };
        self.encoder.encode(
            &progress,
            &self.features.features(),
            &self.book.snapshot(),
            ctx,
        )
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn reward_weights(&self) -> &RewardWeights {
        &self.weights
    }

    pub fn state_dim(&self) -> usize {
        self.encoder.output_dim()
    }

    /// Current or most recently finished episode
    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.episode.as_ref().map_or(true, |e| e.done)
    }

    pub fn book(&self) -> &OrderBookModel {
        &self.book
    }

    pub fn features(&self) -> &FeatureAggregator {
        &self.features
    }

    pub fn episodes_started(&self) -> u64 {
        self.episodes_started
    }

    /// True once every tick of the bound window has been replayed
    pub fn market_exhausted(&self) -> bool {
        self.pending.is_none() && self.stream.as_ref().map_or(true, |s| s.is_finished())
    }
}
