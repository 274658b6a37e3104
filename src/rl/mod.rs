//! Reinforcement Learning Module
//!
//! Optimal execution as an episodic decision process.
//!
//! # Components
//!
//! - **Environment**: replays ticks into a simplified book, simulates child
//!   order fills and shapes rewards
//! - **Agent**: epsilon-greedy policy over a pluggable value approximator
//!   with a periodically synchronised target copy
//! - **Memory**: fixed-capacity replay buffer
//! - **Training**: episode loop, epsilon schedule, checkpoints
//! - **Evaluation**: frozen agent versus a slicing baseline

pub mod agent;
pub mod approximator;
pub mod config;
pub mod core;
pub mod environment;
pub mod evaluation;
pub mod memory;
pub mod training;

// Config exports
pub use config::{
    ActionSpaceConfig, AgentConfig, EnvConfig, EvalConfig, RLConfig, SizingBasis, TrainingConfig,
};

// Core exports
pub use core::{
    Action, ActionSpace, EpisodeProgress, RewardBreakdown, RewardWeights, StateEncoder,
    StateVector, BASE_FEATURES,
};

pub use agent::Agent;
pub use approximator::{LinearParameters, LinearQ, TdTarget, ValueApproximator};
pub use environment::{Episode, ExecutionEnvironment, StepInfo, StepResult};
pub use evaluation::{BaselinePolicy, EvaluationReport, Evaluator, ExecutionStats, PolicyReport};
pub use memory::{Experience, ReplayBuffer, SharedReplayBuffer};
pub use training::{
    Checkpoint, Checkpointer, EpisodeReport, EpsilonSchedule, TrainingContext, TrainingLoop,
    TrainingSummary,
};
