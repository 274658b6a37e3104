//! Replay Buffer
//!
//! Fixed-capacity experience store for off-policy learning. Oldest
//! transitions are overwritten once full; sampling is uniform with
//! replacement and never removes entries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::rl::core::{Action, StateVector};

/// A single transition in the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: StateVector,
    /// Index into the agent's action space
    pub action_index: usize,
    pub action: Action,
    pub reward: f64,
    pub next_state: StateVector,
    pub done: bool,
}

/// Replay buffer for experience storage
#[derive(Debug)]
pub struct ReplayBuffer {
    /// Storage for transitions, oldest first
    buffer: VecDeque<Experience>,
    /// Maximum capacity
    capacity: usize,
    /// Total pushes over the buffer's lifetime
    pushed: u64,
    rng: StdRng,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity and sampling seed
    pub fn new(capacity: usize, seed: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            pushed: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Add a transition, evicting the oldest once at capacity
    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
        self.pushed += 1;
    }

    /// Draw `batch_size` transitions uniformly, with replacement
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<Experience>> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return Err(ExecError::InsufficientData {
                context: ErrorContext::new(Component::ReplayBuffer),
                requested: batch_size,
                available: self.buffer.len(),
            });
        }

        let len = self.buffer.len();
        Ok((0..batch_size)
            .map(|_| self.buffer[self.rng.gen_range(0..len)].clone())
            .collect())
    }

    /// Clear all transitions
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get current number of transitions
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer has enough samples for training
    pub fn has_enough_samples(&self, min_samples: usize) -> bool {
        self.buffer.len() >= min_samples
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.buffer.len() as f64 / self.capacity as f64
    }

    /// Stored transitions, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }
}

/// Replay buffer shared between training workers.
///
/// `push` and `sample` run under the same lock, so the ring is never
/// observed half-written.
#[derive(Debug, Clone)]
pub struct SharedReplayBuffer {
    inner: Arc<Mutex<ReplayBuffer>>,
}

impl SharedReplayBuffer {
    pub fn new(buffer: ReplayBuffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplayBuffer>> {
        self.inner.lock().map_err(|_| {
            ExecError::state(
                ErrorContext::new(Component::ReplayBuffer),
                "replay buffer lock poisoned",
            )
        })
    }

    pub fn push(&self, experience: Experience) -> Result<()> {
        self.lock()?.push(experience);
        Ok(())
    }

    pub fn sample(&self, batch_size: usize) -> Result<Vec<Experience>> {
        self.lock()?.sample(batch_size)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
