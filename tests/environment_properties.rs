mod common;

use common::{deep_market, env_config, weights};
use execrl::market::{DataWindow, TickSource};
use execrl::rl::{Action, EnvConfig, ExecutionEnvironment, SizingBasis, StepResult};

fn run(env: &mut ExecutionEnvironment, actions: impl Fn(u32) -> Action) -> Vec<StepResult> {
    let mut results = Vec::new();
    let mut step = 0;
    loop {
        let result = env.step(actions(step)).unwrap();
        step += 1;
        let done = result.done;
        results.push(result);
        if done {
            break;
        }
    }
    results
}

#[test]
fn market_slices_complete_before_deadline() {
    let mut env = ExecutionEnvironment::new(env_config(), weights());
    env.reset(&deep_market(80, 1), 10_000.0, 50, 0).unwrap();

    let results = run(&mut env, |_| Action::MarketOrder { size_fraction: 0.1 });

    assert_eq!(results.len(), 10);
    for (i, result) in results.iter().enumerate() {
        assert!(
            (result.info.executed_volume - 1_000.0).abs() < 1e-6,
            "step {} executed {}",
            i + 1,
            result.info.executed_volume
        );
        assert_eq!(result.done, i == 9);
        assert_eq!(result.info.reward.time_penalty_term, 0.0);
    }

    let episode = env.episode().unwrap();
    assert!((episode.filled_volume - 10_000.0).abs() < 1e-6);
    assert_eq!(episode.volume_remaining, 0.0);
    assert!(env.is_done());
}

#[test]
fn idle_agent_pays_penalty_once_at_deadline() {
    let mut env = ExecutionEnvironment::new(env_config(), weights());
    env.reset(&deep_market(80, 2), 10_000.0, 50, 0).unwrap();

    let results = run(&mut env, |_| Action::NoOp);

    assert_eq!(results.len(), 50);
    assert!(results.iter().all(|r| r.info.executed_volume == 0.0));

    let penalised: Vec<_> = results
        .iter()
        .filter(|r| r.info.reward.time_penalty_term > 0.0)
        .collect();
    assert_eq!(penalised.len(), 1);
    assert!(penalised[0].done);
    assert_eq!(penalised[0].reward, -weights().w_time_penalty);

    let episode = env.episode().unwrap();
    assert_eq!(episode.filled_volume, 0.0);
    assert_eq!(episode.volume_remaining, 10_000.0);
}

#[test]
fn volume_accounting_holds_every_step() {
    let mut env = ExecutionEnvironment::new(env_config(), weights());
    let mut state = env.reset(&deep_market(80, 3), 10_000.0, 50, 0).unwrap();
    assert!(state.as_slice().iter().all(|v| (-1.0..=1.0).contains(v)));

    let cycle = [
        Action::MarketOrder { size_fraction: 0.05 },
        Action::LimitOrder {
            size_fraction: 0.05,
            price_offset: 0,
        },
        Action::LimitOrder {
            size_fraction: 0.05,
            price_offset: -2,
        },
        Action::NoOp,
    ];

    let mut previous_remaining = 10_000.0;
    loop {
        let step = env.episode().unwrap().steps_taken as usize;
        let result = env.step(cycle[step % cycle.len()]).unwrap();
        let info = &result.info;

        assert!(info.volume_remaining >= 0.0);
        assert!(info.volume_remaining <= previous_remaining);
        assert!(
            (info.executed_volume + info.residual_unfilled - info.requested_volume).abs() < 1e-9
        );
        assert!(
            (info.cumulative_filled + info.cumulative_residual - info.cumulative_requested).abs()
                < 1e-6
        );
        assert!(
            (info.cumulative_filled + info.volume_remaining - 10_000.0).abs() < 1e-6
        );
        if let Action::LimitOrder { price_offset, .. } = info.action {
            if price_offset < 0 {
                assert_eq!(info.executed_volume, 0.0);
                assert_eq!(info.residual_unfilled, info.requested_volume);
            }
        }

        state = result.next_state;
        assert!(state.as_slice().iter().all(|v| (-1.0..=1.0).contains(v)));
        previous_remaining = info.volume_remaining;
        if result.done {
            break;
        }
    }
    assert_eq!(env.episode().unwrap().steps_taken, 50);
}

#[test]
fn same_seed_same_trajectory() {
    let config = EnvConfig {
        start_jitter_steps: 3,
        ..env_config()
    };
    let window = deep_market(80, 4);
    let actions = |step: u32| match step % 3 {
        0 => Action::MarketOrder { size_fraction: 0.02 },
        1 => Action::LimitOrder {
            size_fraction: 0.03,
            price_offset: 1,
        },
        _ => Action::NoOp,
    };

    let mut first = ExecutionEnvironment::new(config.clone(), weights());
    let mut second = ExecutionEnvironment::new(config, weights());
    let s1 = first.reset(&window, 10_000.0, 50, 99).unwrap();
    let s2 = second.reset(&window, 10_000.0, 50, 99).unwrap();
    assert_eq!(s1, s2);

    let a = run(&mut first, actions);
    let b = run(&mut second, actions);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(
            serde_json::to_string(&x.info).unwrap(),
            serde_json::to_string(&y.info).unwrap()
        );
        assert_eq!(x.next_state, y.next_state);
    }
}

#[test]
fn remaining_basis_sizes_from_what_is_left() {
    let config = EnvConfig {
        sizing_basis: SizingBasis::Remaining,
        ..env_config()
    };
    let mut env = ExecutionEnvironment::new(config, weights());
    env.reset(&deep_market(80, 5), 10_000.0, 50, 0).unwrap();

    let first = env.step(Action::MarketOrder { size_fraction: 0.5 }).unwrap();
    let second = env.step(Action::MarketOrder { size_fraction: 0.5 }).unwrap();
    assert!((first.info.requested_volume - 5_000.0).abs() < 1e-6);
    assert!((second.info.requested_volume - 2_500.0).abs() < 1e-6);
}

#[test]
fn lifecycle_errors() {
    let mut env = ExecutionEnvironment::new(env_config(), weights());

    let err = env.step(Action::NoOp).unwrap_err();
    assert!(!err.is_config_error());

    let empty = DataWindow::whole(TickSource::memory(Vec::new()));
    assert!(env.reset(&empty, 10_000.0, 50, 0).unwrap_err().is_data_error());

    env.reset(&deep_market(20, 6), 10_000.0, 1, 0).unwrap();
    let invalid = env.step(Action::MarketOrder { size_fraction: 1.5 }).unwrap_err();
    assert!(invalid.is_config_error());

    let last = env.step(Action::NoOp).unwrap();
    assert!(last.done);
    assert!(env.step(Action::NoOp).is_err());

    assert!(env.reset(&deep_market(20, 6), 0.0, 10, 0).unwrap_err().is_config_error());
    assert!(env.reset(&deep_market(20, 6), 100.0, 0, 0).unwrap_err().is_config_error());
}
