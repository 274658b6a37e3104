//! Value-function approximators
//!
//! The agent only depends on the [`ValueApproximator`] capability; any
//! model that can predict per-action values, take a regression step toward
//! TD targets and snapshot its parameters can drive it.

mod linear;

pub use linear::{LinearParameters, LinearQ};

use serde::{Deserialize, Serialize};

use crate::rl::core::StateVector;

/// Regression target for one (state, action) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdTarget {
    pub state: StateVector,
    pub action: usize,
    pub target: f64,
}

/// Capability interface of a Q-value model
#[cfg_attr(test, mockall::automock(type Snapshot = Vec<f64>;))]
pub trait ValueApproximator: Send {
    /// Frozen copy of the model parameters
    type Snapshot: Clone + Send + 'static;

    fn num_actions(&self) -> usize;

    fn state_dim(&self) -> usize;

    /// One row of `num_actions` values per input state
    fn predict(&self, states: &[StateVector]) -> Vec<Vec<f64>>;

    /// Move predictions toward the targets; returns the batch loss
    fn update(&mut self, targets: &[TdTarget]) -> f64;

    fn clone_parameters(&self) -> Self::Snapshot;

    /// Replace all parameters with the snapshot
    fn load_parameters(&mut self, snapshot: Self::Snapshot);
}
