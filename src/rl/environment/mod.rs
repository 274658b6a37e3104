//! Execution Environment for RL Training
//!
//! Gym-like `reset`/`step` interface over replayed market data and a
//! simplified order book.

mod episode;
mod execution;

pub use episode::{Episode, VOLUME_EPSILON};
pub use execution::{ExecutionEnvironment, StepInfo, StepResult};
