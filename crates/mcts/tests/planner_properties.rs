//! End-to-end planner tests.
//!
//! - Root visit count equals the simulation budget
//! - Node ids are unique and statistics stay consistent with visit counts
//! - The visited state set does not depend on the worker count
//! - The tree is cleared between planning calls
//! - A two-agent game with a known optimum is solved by both strategies

use fvmcts::games::{CoopMatrixGame, MatrixState, SysAdmin};
use fvmcts::{
    CoordinationStrategy, FvMcts, FvMctsConfig, MaxPlusConfig, NodeId, RolloutEvaluator,
    ZeroEvaluator,
};
use fvmcts_core::{FvMctsError, MultiAgentModel};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::hash::Hash;

/// Payoff matrix with a unique optimum at (0, 0) guarded by heavy
/// miscoordination penalties.
fn climbing_game() -> CoopMatrixGame {
    CoopMatrixGame::two_agent(vec![
        vec![11.0, -30.0, 0.0],
        vec![-30.0, 7.0, 6.0],
        vec![0.0, 0.0, 5.0],
    ])
    .unwrap()
}

fn strategies() -> Vec<CoordinationStrategy> {
    vec![
        CoordinationStrategy::VarEl,
        CoordinationStrategy::MaxPlus(MaxPlusConfig::default()),
    ]
}

fn config(iterations: usize, strategy: CoordinationStrategy, threads: usize) -> FvMctsConfig {
    FvMctsConfig {
        n_iterations: iterations,
        num_threads: Some(threads),
        strategy,
        ..Default::default()
    }
}

/// Every stored state maps back to its own id exactly once.
fn assert_ids_unique<M, E>(planner: &FvMcts<M, E, ChaCha8Rng>)
where
    M: MultiAgentModel,
    M::State: Hash + Eq + std::fmt::Debug,
    E: fvmcts::Evaluator<M>,
{
    let tree = planner.tree();
    let states = tree.states().unwrap();
    let distinct: HashSet<_> = states.iter().collect();
    assert_eq!(distinct.len(), states.len(), "duplicate node labels");

    for (i, state) in states.iter().enumerate() {
        let id = tree.lookup(state).unwrap().unwrap();
        assert_eq!(id.index(), i, "state {:?} maps to the wrong id", state);
    }
    assert_eq!(tree.stats_len().unwrap(), states.len());
}

// =============================================================================
// Visit accounting
// =============================================================================

#[test]
fn test_root_visits_equal_budget() {
    for strategy in strategies() {
        for threads in [1, 4] {
            let game = climbing_game().with_rounds(3);
            let mut planner = FvMcts::new(
                config(250, strategy.clone(), threads),
                game,
                RolloutEvaluator::new(),
                ChaCha8Rng::seed_from_u64(7),
            )
            .unwrap();

            let (_, info) = planner.plan_action_with_info(&MatrixState::new()).unwrap();
            assert_eq!(info.simulations, 250);
            assert_eq!(info.root_visits, 250, "{} with {} threads", strategy.name(), threads);
            assert_ids_unique(&planner);
        }
    }
}

#[test]
fn test_component_sums_equal_visits_under_concurrency() {
    let game = SysAdmin::ring(4);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let state = game.initial_state(&mut rng);

    let mut planner = FvMcts::new(
        FvMctsConfig {
            depth: 4,
            ..config(400, CoordinationStrategy::VarEl, 4)
        },
        game,
        RolloutEvaluator::new(),
        rng,
    )
    .unwrap();
    let (_, info) = planner.plan_action_with_info(&state).unwrap();
    assert!(info.root_visits >= 400);
    assert_ids_unique(&planner);

    let tree = planner.tree();
    for state in tree.states().unwrap() {
        let id = tree.lookup(&state).unwrap().unwrap();
        let visits = tree.visits(id).unwrap() as u64;
        let sums = tree.component_visit_sums(id).unwrap().unwrap();
        // Four ring edges, four two-agent cliques
        assert_eq!(sums.len(), 4);
        assert!(sums.iter().all(|&s| s == visits), "{} sums {:?} != {}", state, sums, visits);
    }
}

#[test]
fn test_max_plus_on_cyclic_graph() {
    let game = SysAdmin::ring(5);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let state = game.initial_state(&mut rng);

    let strategy = CoordinationStrategy::MaxPlus(MaxPlusConfig {
        message_iters: 4,
        use_agent_utils: true,
        ..Default::default()
    });
    let mut planner = FvMcts::new(
        FvMctsConfig {
            depth: 3,
            ..config(200, strategy, 4)
        },
        game,
        RolloutEvaluator::new(),
        rng,
    )
    .unwrap();

    let actions = planner.plan_action(&state).unwrap();
    assert_eq!(actions.len(), 5);
    assert!(planner.tree().visits(NodeId::ROOT).unwrap() >= 200);
    assert_eq!(planner.tree().component_visit_sums(NodeId::ROOT).unwrap(), None);

    // Two directed messages per ring edge, one entry per receiver action
    let messages = planner.tree().last_messages(NodeId::ROOT).unwrap().unwrap();
    assert_eq!(messages.len(), 10);
    assert!(messages.iter().all(|m| m.len() == 2));
    assert_ids_unique(&planner);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_visited_states_independent_of_threads() {
    let visited = |threads: usize| {
        let mut planner = FvMcts::new(
            config(100, CoordinationStrategy::VarEl, threads),
            climbing_game().with_rounds(4),
            RolloutEvaluator::new(),
            ChaCha8Rng::seed_from_u64(21),
        )
        .unwrap();
        planner.plan_action(&MatrixState::new()).unwrap();
        let states: HashSet<MatrixState> = planner.tree().states().unwrap().into_iter().collect();
        (states, planner.tree().visits(NodeId::ROOT).unwrap())
    };

    let (single, single_root) = visited(1);
    let (many, many_root) = visited(8);
    assert_eq!(single, many);
    assert_eq!(single.len(), 5);
    assert_eq!(single_root, many_root);
}

#[test]
fn test_single_thread_is_reproducible() {
    let run = || {
        let game = SysAdmin::ring(3);
        let state = game.initial_state(&mut ChaCha8Rng::seed_from_u64(0));
        let mut planner = FvMcts::new(
            FvMctsConfig {
                depth: 3,
                ..config(150, CoordinationStrategy::VarEl, 1)
            },
            game,
            RolloutEvaluator::new(),
            ChaCha8Rng::seed_from_u64(99),
        )
        .unwrap();
        let actions = planner.plan_action(&state).unwrap();
        (actions, planner.tree().states().unwrap())
    };

    assert_eq!(run(), run());
}

// =============================================================================
// Tree reset
// =============================================================================

#[test]
fn test_no_residual_entries_between_calls() {
    for strategy in strategies() {
        let game = climbing_game().with_rounds(3);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let start = game.initial_state(&mut rng);
        let (later, _) = game.generate(&start, &[0, 0], &mut rng);

        let mut planner =
            FvMcts::new(config(80, strategy, 2), game, ZeroEvaluator, rng).unwrap();
        planner.plan_action(&start).unwrap();
        let first_size = planner.tree().len().unwrap();

        planner.plan_action(&later).unwrap();
        let tree = planner.tree();
        assert_eq!(tree.lookup(&later).unwrap(), Some(NodeId::ROOT));
        assert_eq!(tree.lookup(&start).unwrap(), None);
        assert!(tree.len().unwrap() < first_size);
        assert_eq!(tree.stats_len().unwrap(), tree.len().unwrap());
        assert_eq!(tree.visits(NodeId::ROOT).unwrap(), 80);
    }
}

// =============================================================================
// Known optimum
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Both strategies find the (0, 0) optimum of the climbing game for any
    /// seed and worker count.
    #[test]
    fn prop_finds_known_optimum(seed in any::<u64>(), threads in 1usize..5, max_plus in any::<bool>()) {
        let game = climbing_game();
        let (optimum, value) = game.optimum();
        prop_assert_eq!(&optimum, &vec![0, 0]);
        prop_assert_eq!(value, 11.0);

        let strategy = if max_plus {
            CoordinationStrategy::MaxPlus(MaxPlusConfig::default())
        } else {
            CoordinationStrategy::VarEl
        };
        let mut planner = FvMcts::new(
            config(300, strategy, threads),
            game,
            RolloutEvaluator::new(),
            ChaCha8Rng::seed_from_u64(seed),
        )
        .unwrap();

        let (actions, info) = planner.plan_action_with_info(&MatrixState::new()).unwrap();
        prop_assert_eq!(actions, optimum);
        prop_assert_eq!(info.root_visits, 300);
    }
}

#[test]
fn test_noisy_optimum_on_path() {
    // 0 - 1 - 2; agreeing on action 1 everywhere is best
    let agree = vec![2.0, -1.0, -1.0, 3.0];
    let game = CoopMatrixGame::new(3, 2, vec![((0, 1), agree.clone()), ((1, 2), agree)])
        .unwrap()
        .with_noise(0.5);
    assert_eq!(game.optimum(), (vec![1, 1, 1], 6.0));

    for strategy in strategies() {
        let mut planner = FvMcts::new(
            config(1500, strategy.clone(), 4),
            game.clone(),
            RolloutEvaluator::new(),
            ChaCha8Rng::seed_from_u64(17),
        )
        .unwrap();
        let actions = planner.plan_action(&MatrixState::new()).unwrap();
        assert_eq!(actions, vec![1, 1, 1], "{}", strategy.name());
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_from_json() {
    let config: FvMctsConfig = serde_json::from_str(
        r#"{
            "n_iterations": 120,
            "num_threads": 2,
            "strategy": { "kind": "maxplus", "message_iters": 3 }
        }"#,
    )
    .unwrap();

    let mut planner = FvMcts::new(
        config,
        climbing_game(),
        RolloutEvaluator::new(),
        ChaCha8Rng::seed_from_u64(1),
    )
    .unwrap();
    assert_eq!(planner.strategy().name(), "maxplus");

    let (_, info) = planner.plan_action_with_info(&MatrixState::new()).unwrap();
    assert_eq!(info.root_visits, 120);
}

#[test]
fn test_configuration_errors() {
    let build = |config: FvMctsConfig| {
        FvMcts::new(
            config,
            climbing_game(),
            ZeroEvaluator,
            ChaCha8Rng::seed_from_u64(0),
        )
        .map(|_| ())
    };

    let silent = MaxPlusConfig {
        node_exploration: false,
        edge_exploration: false,
        ..Default::default()
    };
    assert_eq!(
        build(FvMctsConfig::max_plus(10, silent)),
        Err(FvMctsError::NoExploration)
    );
    assert_eq!(
        build(FvMctsConfig {
            reuse_tree: true,
            ..Default::default()
        }),
        Err(FvMctsError::TreeReuseUnsupported)
    );
    assert!(matches!(
        build(FvMctsConfig::with_iterations(0)),
        Err(FvMctsError::InvalidConfig(_))
    ));
    assert!(matches!(
        "sparse_cooperative".parse::<CoordinationStrategy>(),
        Err(FvMctsError::UnknownStrategy(_))
    ));
}
