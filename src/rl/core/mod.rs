//! Core RL abstractions
//!
//! Fundamental types for state representation, actions, and rewards.

pub mod action;
pub mod reward;
pub mod state;

pub use action::{Action, ActionSpace};
pub use reward::{RewardBreakdown, RewardInput, RewardWeights};
pub use state::{EpisodeProgress, StateEncoder, StateVector, BASE_FEATURES};
