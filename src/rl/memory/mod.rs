//! Experience Memory
//!
//! Bounded replay memory sampled by the training loop.

pub mod replay_buffer;

pub use replay_buffer::{Experience, ReplayBuffer, SharedReplayBuffer};
