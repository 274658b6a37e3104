//! Epsilon-greedy agent with a target approximator
//!
//! The live approximator is trained every learning call; TD targets come
//! from a frozen copy that is replaced wholesale by [`Agent::sync_target`].

use rand::Rng;
use tracing::debug;

use crate::error::{Component, ErrorContext, ExecError, Result};
use crate::rl::approximator::{LinearQ, TdTarget, ValueApproximator};
use crate::rl::config::RLConfig;
use crate::rl::core::{Action, ActionSpace, StateVector};
use crate::rl::memory::Experience;

#[derive(Debug)]
pub struct Agent<A: ValueApproximator> {
    live: A,
    target: A,
    actions: ActionSpace,
    syncs: u64,
}

impl<A: ValueApproximator> Agent<A> {
    /// Pair a live and a target approximator; the target starts as a copy
    /// of the live parameters
    pub fn new(live: A, mut target: A, actions: ActionSpace) -> Result<Self> {
        let ctx = ErrorContext::new(Component::Agent);
        if live.num_actions() != actions.len() || target.num_actions() != actions.len() {
            return Err(ExecError::config(
                ctx,
                format!(
                    "approximator outputs {} values but the action space has {} actions",
                    live.num_actions(),
                    actions.len()
                ),
            ));
        }
        if live.state_dim() != target.state_dim() {
            return Err(ExecError::config(
                ctx,
                "live and target approximators disagree on state dimension",
            ));
        }

        target.load_parameters(live.clone_parameters());
        Ok(Self {
            live,
            target,
            actions,
            syncs: 0,
        })
    }

    /// Epsilon-greedy selection. Returns the action index and the action.
    pub fn act<R: Rng + ?Sized>(
        &self,
        state: &StateVector,
        epsilon: f64,
        rng: &mut R,
    ) -> Result<(usize, Action)> {
        let index = if rng.gen::<f64>() < epsilon {
            rng.gen_range(0..self.actions.len())
        } else {
            self.greedy_index(state)?
        };
        self.action_at(index)
    }

    /// Highest predicted value; ties go to the earliest action
    pub fn greedy_index(&self, state: &StateVector) -> Result<usize> {
        let values = self
            .live
            .predict(std::slice::from_ref(state))
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut best: Option<(usize, f64)> = None;
        for (idx, value) in values.iter().copied().enumerate().take(self.actions.len()) {
            if !value.is_finite() {
                return Err(ExecError::numeric(
                    ErrorContext::new(Component::Agent),
                    format!("predicted value for action {idx} is {value}"),
                ));
            }
            if best.map_or(true, |(_, b)| value > b) {
                best = Some((idx, value));
            }
        }

        best.map(|(idx, _)| idx).ok_or_else(|| {
            ExecError::state(
                ErrorContext::new(Component::Agent),
                "approximator returned no action values",
            )
        })
    }

    fn action_at(&self, index: usize) -> Result<(usize, Action)> {
        self.actions
            .get(index)
            .map(|action| (index, action))
            .ok_or_else(|| {
                ExecError::state(
                    ErrorContext::new(Component::Agent),
                    format!("action index {index} out of range"),
                )
            })
    }

    /// One learning update on a sampled batch.
    ///
    /// `target = reward + discount * max_a target(next_state) * (1 - done)`
    pub fn learn(
        &mut self,
        batch: &[Experience],
        discount_factor: f64,
        context: ErrorContext,
    ) -> Result<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }

        let next_states: Vec<StateVector> = batch.iter().map(|e| e.next_state.clone()).collect();
        let next_values = self.target.predict(&next_states);

        let mut targets = Vec::with_capacity(batch.len());
        for (experience, values) in batch.iter().zip(next_values) {
            let bootstrap = if experience.done {
                0.0
            } else {
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            };
            let target = experience.reward + discount_factor * bootstrap;
            if !target.is_finite() {
                return Err(ExecError::numeric(
                    context,
                    format!("non-finite TD target {target}"),
                ));
            }
            targets.push(TdTarget {
                state: experience.state.clone(),
                action: experience.action_index,
                target,
            });
        }

        let loss = self.live.update(&targets);
        if !loss.is_finite() {
            return Err(ExecError::numeric(context, format!("loss is {loss}")));
        }
        Ok(loss)
    }

    /// Replace the target parameters with a copy of the live ones
    pub fn sync_target(&mut self) {
        self.target.load_parameters(self.live.clone_parameters());
        self.syncs += 1;
        debug!(syncs = self.syncs, "Synchronized target approximator");
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.actions
    }

    pub fn live(&self) -> &A {
        &self.live
    }

    pub fn target(&self) -> &A {
        &self.target
    }

    pub fn target_syncs(&self) -> u64 {
        self.syncs
    }
}

impl Agent<LinearQ> {
    /// Fresh linear agent sized for the configured environment and actions
    pub fn linear(config: &RLConfig) -> Result<Self> {
        let actions = ActionSpace::from_config(&config.agent.actions);
        let live = LinearQ::new(
            config.environment.state_dim(),
            actions.len(),
            config.agent.learning_rate,
            config.agent.max_td_error,
            config.agent.seed,
        );
        let target = live.clone();
        Self::new(live, target, actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::approximator::MockValueApproximator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn space() -> ActionSpace {
        ActionSpace::new([
            Action::MarketOrder { size_fraction: 0.1 },
            Action::MarketOrder { size_fraction: 0.5 },
        ])
    }

    fn mock() -> MockValueApproximator {
        let mut m = MockValueApproximator::new();
        m.expect_num_actions().return_const(3usize);
        m.expect_state_dim().return_const(4usize);
        m.expect_clone_parameters().returning(Vec::new);
        m.expect_load_parameters().return_const(());
        m
    }

    fn experience(reward: f64, done: bool) -> Experience {
        Experience {
            state: StateVector::zeros(4),
            action_index: 2,
            action: Action::MarketOrder { size_fraction: 0.5 },
            reward,
            next_state: StateVector::zeros(4),
            done,
        }
    }

    #[test]
    fn test_greedy_tie_breaks_to_first() {
        let mut live = mock();
        live.expect_predict()
            .returning(|_| vec![vec![1.0, 3.0, 3.0]]);
        let agent = Agent::new(live, mock(), space()).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let (idx, action) = agent.act(&StateVector::zeros(4), 0.0, &mut rng).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(action, Action::MarketOrder { size_fraction: 0.1 });
    }

    #[test]
    fn test_full_exploration_never_predicts() {
        let mut live = mock();
        live.expect_predict().never();
        let agent = Agent::new(live, mock(), space()).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let (idx, _) = agent.act(&StateVector::zeros(4), 1.0, &mut rng).unwrap();
            assert!(idx < 3);
        }
    }

    #[test]
    fn test_nan_prediction_is_numeric_error() {
        let mut live = mock();
        live.expect_predict()
            .returning(|_| vec![vec![0.0, f64::NAN, 1.0]]);
        let agent = Agent::new(live, mock(), space()).unwrap();
        let err = agent.greedy_index(&StateVector::zeros(4)).unwrap_err();
        assert!(err.is_fatal_to_run());
    }

    #[test]
    fn test_targets_use_target_approximator() {
        let mut target = mock();
        target
            .expect_predict()
            .returning(|states| states.iter().map(|_| vec![1.0, 5.0, 2.0]).collect());

        let mut live = mock();
        live.expect_predict().never();
        live.expect_update()
            .withf(|targets| {
                targets.len() == 2
                    && (targets[0].target - (1.0 + 0.5 * 5.0)).abs() < 1e-12
                    && (targets[1].target - 2.0).abs() < 1e-12
                    && targets.iter().all(|t| t.action == 2)
            })
            .times(1)
            .return_const(0.25);

        let mut agent = Agent::new(live, target, space()).unwrap();
        let loss = agent
            .learn(
                &[experience(1.0, false), experience(2.0, true)],
                0.5,
                ErrorContext::new(Component::TrainingLoop),
            )
            .unwrap();
        assert_eq!(loss, 0.25);
    }

    #[test]
    fn test_non_finite_loss_is_fatal() {
        let mut target = mock();
        target
            .expect_predict()
            .returning(|states| states.iter().map(|_| vec![0.0; 3]).collect());
        let mut live = mock();
        live.expect_update().return_const(f64::INFINITY);

        let mut agent = Agent::new(live, target, space()).unwrap();
        let err = agent
            .learn(
                &[experience(1.0, false)],
                0.9,
                ErrorContext::new(Component::TrainingLoop).step(17),
            )
            .unwrap_err();
        assert!(err.is_fatal_to_run());
        assert_eq!(err.context().and_then(|c| c.step), Some(17));
    }

    #[test]
    fn test_sync_copies_live_parameters() {
        let mut live = MockValueApproximator::new();
        live.expect_num_actions().return_const(3usize);
        live.expect_state_dim().return_const(4usize);
        live.expect_clone_parameters().returning(|| vec![1.0, 2.0]);

        let mut target = MockValueApproximator::new();
        target.expect_num_actions().return_const(3usize);
        target.expect_state_dim().return_const(4usize);
        target
            .expect_load_parameters()
            .withf(|snapshot: &Vec<f64>| snapshot == &vec![1.0, 2.0])
            .times(2)
            .return_const(());

        let mut agent = Agent::new(live, target, space()).unwrap();
        agent.sync_target();
        assert_eq!(agent.target_syncs(), 1);
    }

    #[test]
    fn test_mismatched_action_count() {
        let mut live = MockValueApproximator::new();
        live.expect_num_actions().return_const(7usize);
        live.expect_state_dim().return_const(4usize);
        assert!(Agent::new(live, mock(), space()).err().unwrap().is_config_error());
    }
}
