//! Model Checkpointing
//!
//! Save and load approximator parameters plus run counters as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::context::TrainingContext;
use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::rl::agent::Agent;
use crate::rl::approximator::{LinearParameters, LinearQ, ValueApproximator};
use crate::rl::config::{AgentConfig, EnvConfig};
use crate::rl::core::ActionSpace;

const EXTENSION: &str = "json";

/// Everything needed to rebuild a frozen agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<S> {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub episode_count: u64,
    pub global_step: u64,
    pub learn_steps: u64,
    pub epsilon: f64,
    pub environment: EnvConfig,
    pub agent: AgentConfig,
    pub action_space: ActionSpace,
    pub parameters: S,
}

impl<S> Checkpoint<S> {
    pub fn capture<A>(
        context: &TrainingContext,
        agent: &Agent<A>,
        environment: &EnvConfig,
        agent_config: &AgentConfig,
    ) -> Self
    where
        A: ValueApproximator<Snapshot = S>,
    {
        Self {
            run_id: context.run_id,
            created_at: Utc::now(),
            episode_count: context.episode_count,
            global_step: context.global_step,
            learn_steps: context.learn_steps,
            epsilon: context.epsilon,
            environment: environment.clone(),
            agent: agent_config.clone(),
            action_space: agent.action_space().clone(),
            parameters: agent.live().clone_parameters(),
        }
    }
}

impl Checkpoint<LinearParameters> {
    /// Rebuild a frozen linear agent; live and target share the saved weights
    pub fn into_linear_agent(self) -> Result<Agent<LinearQ>> {
        let (rows, cols) = self.parameters.weights.dim();
        let state_dim = self.environment.state_dim();
        if cols != state_dim || rows != self.parameters.bias.len() {
            return Err(ExecError::config(
                ErrorContext::new(Component::TrainingLoop),
                format!(
                    "checkpoint weights are {rows}x{cols} with {} biases, environment needs {state_dim} state features",
                    self.parameters.bias.len()
                ),
            ));
        }
        let live = LinearQ::from_parameters(
            self.parameters,
            self.agent.learning_rate,
            self.agent.max_td_error,
        );
        let target = live.clone();
        Agent::new(live, target, self.action_space)
    }
}

/// Read a checkpoint file
pub fn load_checkpoint<S: DeserializeOwned>(path: &Path) -> Result<Checkpoint<S>> {
    let ctx = ErrorContext::new(Component::TrainingLoop);
    let raw = fs::read_to_string(path)
        .map_err(|e| ExecError::io(ctx, format!("cannot read checkpoint {}", path.display()), e))?;
    serde_json::from_str(&raw).map_err(|e| {
        ExecError::data(
            ctx,
            format!("checkpoint {} is not valid: {e}", path.display()),
        )
    })
}

/// Checkpointer for saving and loading models
pub struct Checkpointer {
    /// Directory for checkpoints
    checkpoint_dir: PathBuf,
    /// Maximum checkpoints to keep
    max_checkpoints: usize,
}

impl Checkpointer {
    /// Create a new checkpointer
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!(dir = %checkpoint_dir.display(), error = %e, "Failed to create checkpoint directory");
            }
        }

        Self {
            checkpoint_dir,
            max_checkpoints: max_checkpoints.max(1),
        }
    }

    /// Get checkpoint path for a given name
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{name}.{EXTENSION}"))
    }

    pub fn dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Write a checkpoint, then prune the oldest beyond the retention count
    pub fn save<S: Serialize>(&self, checkpoint: &Checkpoint<S>, name: &str) -> Result<PathBuf> {
        let ctx = ErrorContext::new(Component::TrainingLoop);
        let path = self.checkpoint_path(name);
        let json = serde_json::to_string_pretty(checkpoint)?;

        // Replace atomically through a temp file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| ExecError::io(ctx, format!("cannot write {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .map_err(|e| ExecError::io(ctx, format!("cannot move checkpoint to {}", path.display()), e))?;

        info!(
            path = %path.display(),
            episode = checkpoint.episode_count,
            global_step = checkpoint.global_step,
            "Saved checkpoint"
        );

        self.cleanup_old_checkpoints();
        Ok(path)
    }

    /// Load a checkpoint by name
    pub fn load<S: DeserializeOwned>(&self, name: &str) -> Result<Checkpoint<S>> {
        load_checkpoint(&self.checkpoint_path(name))
    }

    /// List available checkpoints, oldest name first
    pub fn list_checkpoints(&self) -> Vec<String> {
        let mut checkpoints = Vec::new();
        let suffix = format!(".{EXTENSION}");

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(stem) = name.strip_suffix(&suffix) {
                        checkpoints.push(stem.to_string());
                    }
                }
            }
        }

        checkpoints.sort();
        checkpoints
    }

    /// Get latest checkpoint name
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints().into_iter().last()
    }

    /// Cleanup old checkpoints keeping only max_checkpoints
    fn cleanup_old_checkpoints(&self) {
        let checkpoints = self.list_checkpoints();

        if checkpoints.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = checkpoints.len() - self.max_checkpoints;
        for name in checkpoints.into_iter().take(to_remove) {
            let path = self.checkpoint_path(&name);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove old checkpoint");
            } else {
                info!(name = %name, "Removed old checkpoint");
            }
        }
    }
}

/// Generate a checkpoint name with episode number
pub fn episode_name(prefix: &str, episode: u64) -> String {
    format!("{prefix}_ep{episode:06}")
}
