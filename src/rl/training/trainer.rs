//! Training Loop
//!
//! Runs episodes against the execution environment, stores transitions in
//! the replay buffer and performs one learning call per environment step
//! once the buffer holds enough experience.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checkpointing::{episode_name, Checkpoint, Checkpointer};
use super::context::{EpsilonSchedule, TrainingContext};
use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::market::DataWindow;
use crate::rl::agent::Agent;
use crate::rl::approximator::ValueApproximator;
use crate::rl::config::RLConfig;
use crate::rl::environment::ExecutionEnvironment;
use crate::rl::memory::{Experience, ReplayBuffer};

/// Outcome of one training episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub episode_id: u64,
    /// Position within the run, 1-based
    pub episode_index: u64,
    pub window: String,
    pub steps: u32,
    pub filled_volume: f64,
    pub total_volume: f64,
    pub fill_rate: f64,
    pub vwap: Option<f64>,
    pub total_reward: f64,
    /// Mean loss over this episode's learning calls
    pub mean_loss: Option<f64>,
    pub learn_calls: u64,
    /// Exploration rate the episode ran with
    pub epsilon: f64,
}

/// Aggregate statistics of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub run_id: Option<Uuid>,
    pub episodes: u64,
    pub global_steps: u64,
    pub learn_steps: u64,
    pub target_syncs: u64,
    pub mean_reward: f64,
    pub best_reward: Option<f64>,
    pub mean_fill_rate: f64,
    pub mean_loss: Option<f64>,
    pub final_epsilon: f64,
    pub checkpoints_written: usize,
}

/// Summarize episode reports into run statistics
pub fn summarize_results(context: &TrainingContext, reports: &[EpisodeReport]) -> TrainingSummary {
    let n = reports.len().max(1) as f64;
    let losses: Vec<f64> = reports.iter().filter_map(|r| r.mean_loss).collect();

    TrainingSummary {
        run_id: Some(context.run_id),
        episodes: reports.len() as u64,
        global_steps: context.global_step,
        learn_steps: context.learn_steps,
        target_syncs: context.target_syncs,
        mean_reward: reports.iter().map(|r| r.total_reward).sum::<f64>() / n,
        best_reward: reports.iter().map(|r| r.total_reward).reduce(f64::max),
        mean_fill_rate: reports.iter().map(|r| r.fill_rate).sum::<f64>() / n,
        mean_loss: (!losses.is_empty()).then(|| losses.iter().sum::<f64>() / losses.len() as f64),
        final_epsilon: context.epsilon,
        checkpoints_written: 0,
    }
}

/// Training loop for a DQN-style execution agent
pub struct TrainingLoop<A: ValueApproximator> {
    config: RLConfig,
    env: ExecutionEnvironment,
    agent: Agent<A>,
    buffer: ReplayBuffer,
    schedule: EpsilonSchedule,
    rng: StdRng,
    checkpointer: Option<Checkpointer>,
}

impl<A: ValueApproximator> TrainingLoop<A> {
    pub fn new(config: RLConfig, agent: Agent<A>) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ExecError::config(
                ErrorContext::new(Component::TrainingLoop),
                errors.join("; "),
            ));
        }

        let env = ExecutionEnvironment::new(config.environment.clone(), config.reward);
        if agent.live().state_dim() != env.state_dim() {
            return Err(ExecError::config(
                ErrorContext::new(Component::TrainingLoop),
                format!(
                    "approximator expects {} state features, environment produces {}",
                    agent.live().state_dim(),
                    env.state_dim()
                ),
            ));
        }

        let training = &config.training;
        let checkpointer = training
            .checkpoint_dir
            .as_ref()
            .map(|dir| Checkpointer::new(dir, training.keep_checkpoints));

        Ok(Self {
            buffer: ReplayBuffer::new(training.replay_capacity, training.seed.wrapping_add(1)),
            schedule: EpsilonSchedule::from_config(training),
            rng: StdRng::seed_from_u64(training.seed),
            checkpointer,
            env,
            agent,
            config,
        })
    }

    /// Fresh context for a run using this loop's epsilon schedule
    pub fn new_context(&self) -> TrainingContext {
        TrainingContext::new(&self.schedule)
    }

    /// Run one episode to completion
    pub fn run_episode(
        &mut self,
        context: &mut TrainingContext,
        window: &DataWindow,
    ) -> Result<EpisodeReport> {
        let env_config = &self.config.environment;
        let (total_volume, deadline_steps) = (env_config.total_volume, env_config.deadline_steps);
        let episode_seed = self.rng.gen::<u64>();
        let epsilon = context.epsilon;

        let mut state = self
            .env
            .reset(window, total_volume, deadline_steps, episode_seed)?;
        let episode_id = self.env.episodes_started();

        let training = &self.config.training;
        let learn_threshold = training.min_replay_size.max(training.batch_size);
        let mut loss_sum = 0.0;
        let mut learn_calls = 0u64;

        loop {
            let (action_index, action) = self.agent.act(&state, epsilon, &mut self.rng)?;
            let result = self.env.step(action)?;
            context.global_step += 1;

            self.buffer.push(Experience {
                state: state.clone(),
                action_index,
                action,
                reward: result.reward,
                next_state: result.next_state.clone(),
                done: result.done,
            });

            if self.buffer.len() >= learn_threshold {
                let ctx = ErrorContext::new(Component::TrainingLoop)
                    .episode(episode_id)
                    .step(context.global_step);
                match self.buffer.sample(training.batch_size) {
                    Ok(batch) => {
                        let loss = self
                            .agent
                            .learn(&batch, self.config.agent.discount_factor, ctx)?;
                        loss_sum += loss;
                        learn_calls += 1;
                        if context.record_learn(training.target_sync_interval) {
                            self.agent.sync_target();
                        }
                    }
                    Err(e) if e.is_recoverable() => {
                        debug!(error = %e, "Skipping learning call");
                    }
                    Err(e) => return Err(e),
                }
            }

            state = result.next_state;
            if result.done {
                break;
            }
        }

        context.finish_episode(&self.schedule);

        let episode = self.env.episode().ok_or_else(|| {
            ExecError::state(
                ErrorContext::new(Component::TrainingLoop).episode(episode_id),
                "environment lost its episode",
            )
        })?;

        Ok(EpisodeReport {
            episode_id,
            episode_index: context.episode_count,
            window: episode.window.clone(),
            steps: episode.steps_taken,
            filled_volume: episode.filled_volume,
            total_volume: episode.total_volume,
            fill_rate: episode.fill_rate(),
            vwap: episode.vwap(),
            total_reward: episode.total_reward,
            mean_loss: (learn_calls > 0).then(|| loss_sum / learn_calls as f64),
            learn_calls,
            epsilon,
        })
    }

    pub fn agent(&self) -> &Agent<A> {
        &self.agent
    }

    pub fn into_agent(self) -> Agent<A> {
        self.agent
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn schedule(&self) -> &EpsilonSchedule {
        &self.schedule
    }

    pub fn config(&self) -> &RLConfig {
        &self.config
    }
}

impl<A> TrainingLoop<A>
where
    A: ValueApproximator,
    A::Snapshot: Serialize,
{
    /// Run the configured number of episodes, cycling through `windows`
    pub fn train(
        &mut self,
        context: &mut TrainingContext,
        windows: &[DataWindow],
    ) -> Result<TrainingSummary> {
        if windows.is_empty() {
            return Err(ExecError::config(
                ErrorContext::new(Component::TrainingLoop),
                "no training data windows configured",
            ));
        }

        let episodes = self.config.training.episodes;
        let checkpoint_every = self.config.training.checkpoint_every as u64;
        let mut reports = Vec::with_capacity(episodes);
        let mut checkpoints_written = 0;

        info!(
            run_id = %context.run_id,
            episodes,
            windows = windows.len(),
            epsilon = context.epsilon,
            "Starting training run"
        );

        for _ in 0..episodes {
            let window = &windows[(context.episode_count % windows.len() as u64) as usize];
            let report = self.run_episode(context, window)?;

            info!(
                episode = report.episode_index,
                steps = report.steps,
                fill_rate = report.fill_rate,
                reward = report.total_reward,
                loss = ?report.mean_loss,
                epsilon = report.epsilon,
                "Episode complete"
            );

            if checkpoint_every > 0 && context.episode_count % checkpoint_every == 0 {
                self.save_checkpoint(context, &episode_name("agent", context.episode_count))?;
                checkpoints_written += 1;
            }
            reports.push(report);
        }

        if self.save_checkpoint(context, "agent_final")?.is_some() {
            checkpoints_written += 1;
        }

        let mut summary = summarize_results(context, &reports);
        summary.checkpoints_written = checkpoints_written;
        info!(
            run_id = %context.run_id,
            episodes = summary.episodes,
            mean_reward = summary.mean_reward,
            mean_fill_rate = summary.mean_fill_rate,
            final_epsilon = summary.final_epsilon,
            target_syncs = summary.target_syncs,
            "Training run finished"
        );
        Ok(summary)
    }

    /// Write a checkpoint when a checkpoint directory is configured
    pub fn save_checkpoint(
        &self,
        context: &TrainingContext,
        name: &str,
    ) -> Result<Option<std::path::PathBuf>> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(None);
        };
        let checkpoint = Checkpoint::capture(
            context,
            &self.agent,
            &self.config.environment,
            &self.config.agent,
        );
        match checkpointer.save(&checkpoint, name) {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                warn!(error = %e, name, "Checkpoint failed");
                Err(e)
            }
        }
    }
}
