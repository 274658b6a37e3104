//! Linear Q approximator
//!
//! One linear head per action over the state vector plus a bias, trained
//! by SGD on the squared TD error.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::{TdTarget, ValueApproximator};
use crate::rl::core::StateVector;

/// Weights `[num_actions x state_dim]` and per-action bias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParameters {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Reference approximator used by the CLI and tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearQ {
    params: LinearParameters,
    learning_rate: f64,
    /// TD errors are clipped to +/- this before the gradient step
    max_td_error: f64,
}

impl LinearQ {
    /// Small seeded Gaussian weights, zero bias
    pub fn new(
        state_dim: usize,
        num_actions: usize,
        learning_rate: f64,
        max_td_error: f64,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 0.01;
        let weights = Array2::from_shape_fn((num_actions, state_dim), |_| {
            let z: f64 = StandardNormal.sample(&mut rng);
            z * scale
        });

        Self {
            params: LinearParameters {
                weights,
                bias: Array1::zeros(num_actions),
            },
            learning_rate,
            max_td_error,
        }
    }

    /// Rebuild from saved parameters
    pub fn from_parameters(params: LinearParameters, learning_rate: f64, max_td_error: f64) -> Self {
        Self {
            params,
            learning_rate,
            max_td_error,
        }
    }

    pub fn parameters(&self) -> &LinearParameters {
        &self.params
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn q_values(&self, state: &StateVector) -> Array1<f64> {
        let x = ArrayView1::from(state.as_slice());
        self.params.weights.dot(&x) + &self.params.bias
    }
}

impl ValueApproximator for LinearQ {
    type Snapshot = LinearParameters;

    fn num_actions(&self) -> usize {
        self.params.bias.len()
    }

    fn state_dim(&self) -> usize {
        self.params.weights.ncols()
    }

    fn predict(&self, states: &[StateVector]) -> Vec<Vec<f64>> {
        states.iter().map(|s| self.q_values(s).to_vec()).collect()
    }

    fn update(&mut self, targets: &[TdTarget]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        let n = targets.len() as f64;
        let mut loss = 0.0;

        // Errors come from the pre-update parameters, then the step is applied
        let errors: Vec<f64> = targets
            .iter()
            .map(|t| {
                let q = self.q_values(&t.state);
                t.target - q.get(t.action).copied().unwrap_or(0.0)
            })
            .collect();

        for (target, error) in targets.iter().zip(errors) {
            if target.action >= self.num_actions() {
                continue;
            }
            loss += error * error;
            let clipped = error.clamp(-self.max_td_error, self.max_td_error);
            let step = self.learning_rate * clipped / n;

            let x = ArrayView1::from(target.state.as_slice());
            self.params.weights.row_mut(target.action).scaled_add(step, &x);
            self.params.bias[target.action] += step;
        }

        loss / n
    }

    fn clone_parameters(&self) -> LinearParameters {
        self.params.clone()
    }

    fn load_parameters(&mut self, snapshot: LinearParameters) {
        self.params = snapshot;
    }
}
