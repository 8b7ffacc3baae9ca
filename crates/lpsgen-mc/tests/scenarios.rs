//! End-to-end exploration scenarios: model -> Explorer -> sinks.

use lpsgen_eval::{BinOp, Expr, Sort, Value};
use lpsgen_mc::*;
use num_rational::Rational64;
use num_traits::One;
use std::io::Cursor;
use std::sync::Arc;

/// x in 0..n; one summand per edge `(from, label, to)`, `tau` for an empty label.
fn graph(n: i64, edges: &[(i64, &str, i64)]) -> Arc<Model> {
    let mut b = ModelBuilder::new();
    let x = b.param("x", Sort::range(0, n));
    for &(from, label, to) in edges {
        let s = Summand::new(Expr::eq(x.expr(), Expr::int(from)), vec![Expr::int(to)]);
        b.summand(if label.is_empty() { s } else { s.action(label, vec![]) });
    }
    b.initial(vec![Expr::int(0)]);
    Arc::new(b.build().unwrap())
}

/// Binary tree over 0..=14: x -l-> 2x+1 and x -r-> 2x+2 for x < 7.
fn tree() -> Arc<Model> {
    let mut b = ModelBuilder::new();
    let x = b.param("x", Sort::range(0, 14));
    let twice = Expr::binary(BinOp::Mul, Expr::int(2), x.expr());
    for (label, offset) in [("l", 1), ("r", 2)] {
        b.summand(
            Summand::new(
                Expr::lt(x.expr(), Expr::int(7)),
                vec![Expr::add(twice.clone(), Expr::int(offset))],
            )
            .action(label, vec![]),
        );
    }
    b.initial(vec![Expr::int(0)]);
    Arc::new(b.build().unwrap())
}

fn int_state(n: i64) -> State {
    State::new(vec![Value::int(n)])
}

fn explore(model: Arc<Model>, config: ExploreConfig) -> (ExploreReport, LtsCollector) {
    let mut lts = LtsCollector::new();
    let report = Explorer::new(model, config, &mut lts).run().unwrap();
    (report, lts)
}

#[test]
fn test_deadlock_scenario() {
    let config = ExploreConfig {
        detect_deadlock: true,
        ..ExploreConfig::default()
    };
    let (report, lts) = explore(graph(1, &[(0, "a", 1)]), config);
    assert_eq!(report.status, ExploreStatus::Completed);
    assert_eq!(report.states, 2);
    assert_eq!(report.transitions, 1);
    assert_eq!(report.deadlocks, 1);
    assert_eq!(lts.edges(), vec![(0, "a", 1)]);
}

#[test]
fn test_divergence_scenario() {
    let config = ExploreConfig {
        detect_divergence: true,
        ..ExploreConfig::default()
    };
    let (report, lts) = explore(graph(0, &[(0, "", 0)]), config);
    assert_eq!(report.divergences, 1);
    assert_eq!(report.states, 1);
    assert_eq!(lts.edges(), vec![(0, "tau", 0)]);
}

#[test]
fn test_divergence_through_shared_successor() {
    // 0 reaches the cycle 1 <-> 2 along both of its internal steps.
    let config = ExploreConfig {
        detect_divergence: true,
        ..ExploreConfig::default()
    };
    let model = graph(2, &[(0, "", 1), (0, "", 2), (1, "", 2), (2, "", 1)]);
    let (report, _) = explore(model, config);
    assert_eq!(report.states, 3);
    assert_eq!(report.divergences, 3);
}

#[test]
fn test_hidden_labels_count_as_internal() {
    let model = graph(1, &[(0, "a", 1), (1, "step", 1)]);
    let plain = ExploreConfig {
        detect_divergence: true,
        ..ExploreConfig::default()
    };
    assert_eq!(explore(Arc::clone(&model), plain).0.divergences, 0);

    let hiding = ExploreConfig {
        detect_divergence: true,
        hidden: vec!["step".to_string()],
        ..ExploreConfig::default()
    };
    assert_eq!(explore(model, hiding).0.divergences, 1);
}

#[test]
fn test_diamond_scenario() {
    let model = graph(3, &[(0, "a", 1), (0, "a", 2), (1, "b", 3), (2, "b", 3)]);
    let (report, lts) = explore(model, ExploreConfig::default());
    assert_eq!(report.states, 4);
    assert_eq!(report.transitions, 4);
    let into_three: Vec<usize> = lts
        .edges()
        .into_iter()
        .filter(|(_, label, _)| *label == "b")
        .map(|(_, _, target)| target)
        .collect();
    assert_eq!(into_three, vec![3, 3]);
    assert_eq!(lts.states.iter().filter(|(_, s)| *s == int_state(3)).count(), 1);
}

#[test]
fn test_probabilistic_scenario() {
    let mut b = ModelBuilder::new();
    let x = b.param("x", Sort::range(0, 2));
    let c = b.var("c", Sort::range(1, 2));
    b.summand(
        Summand::new(Expr::eq(x.expr(), Expr::int(0)), vec![c.expr()])
            .action("flip", vec![])
            .distribution(vec![c], Expr::binary(BinOp::Div, Expr::int(1), Expr::int(2))),
    );
    b.initial(vec![Expr::int(0)]);
    let model = Arc::new(b.build().unwrap());

    let (report, lts) = explore(model, ExploreConfig::default());
    assert_eq!(report.transitions, 1);
    assert_eq!(report.states, 3);

    let (source, label, targets) = &lts.transitions[0];
    assert_eq!((*source, label.as_str()), (0, "flip"));
    assert_eq!(targets.len(), 2);
    let mut indices: Vec<usize> = targets.iter().map(|(i, _)| *i).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 2]);
    let total: Rational64 = targets.iter().map(|(_, p)| *p).sum();
    assert_eq!(total, Rational64::one());
}

#[test]
fn test_confluence_collapses_cycle() {
    // A tau cycle 0 -> 1 -> 2 -> 0, each member able to do `a` into 3.
    let edges = [(0, "", 1), (1, "", 2), (2, "", 0), (0, "a", 3), (1, "a", 3), (2, "a", 3)];
    let (full, _) = explore(graph(3, &edges), ExploreConfig::default());
    assert_eq!((full.states, full.transitions), (4, 6));

    let config = ExploreConfig {
        confluence: Some(TAU.to_string()),
        ..ExploreConfig::default()
    };
    let (reduced, lts) = explore(graph(3, &edges), config);
    assert_eq!((reduced.states, reduced.transitions), (2, 1));
    assert_eq!(lts.states[0].1, int_state(0));
    assert_eq!(lts.edges(), vec![(0, "a", 1)]);
}

#[test]
fn test_confluence_diamond_converges() {
    let edges = [(0, "", 1), (0, "", 2), (1, "", 3), (2, "", 3), (3, "a", 4)];
    let config = ExploreConfig {
        confluence: Some(TAU.to_string()),
        ..ExploreConfig::default()
    };
    let (report, lts) = explore(graph(4, &edges), config);
    assert_eq!((report.states, report.transitions), (2, 1));
    assert_eq!(lts.states[0].1, int_state(3));
    assert_eq!(lts.states[1].1, int_state(4));
}

#[test]
fn test_confluence_on_visible_action() {
    // `c` is the prioritized action; 0 -c-> 1 collapses 0 onto 1.
    let edges = [(0, "c", 1), (1, "a", 2)];
    let config = ExploreConfig {
        confluence: Some("c".to_string()),
        ..ExploreConfig::default()
    };
    let (report, lts) = explore(graph(2, &edges), config);
    assert_eq!(report.states, 2);
    assert_eq!(lts.states[0].1, int_state(1));
}

#[test]
fn test_breadth_first_levels_are_monotone() {
    let (report, lts) = explore(tree(), ExploreConfig::default());
    assert_eq!(report.states, 15);
    assert_eq!(report.transitions, 14);
    assert_eq!(report.levels, 4);

    let depth = |s: &State| {
        let n = s.get(0).as_int().unwrap() + 1;
        63 - n.leading_zeros() as i64
    };
    let depths: Vec<i64> = lts.states.iter().map(|(_, s)| depth(s)).collect();
    assert!(depths.windows(2).all(|w| w[0] <= w[1]), "{:?}", depths);
    // Indices are handed out in discovery order.
    let indices: Vec<usize> = lts.states.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, (0..15).collect::<Vec<_>>());
}

#[test]
fn test_breadth_first_state_limit() {
    let config = ExploreConfig {
        max_states: 3,
        ..ExploreConfig::default()
    };
    let (report, _) = explore(tree(), config);
    assert_eq!(report.status, ExploreStatus::StateLimitReached);
    assert_eq!(report.transitions, 6);
    assert_eq!(report.states, 7);
}

#[test]
fn test_bounded_breadth_first_queue() {
    let config = ExploreConfig {
        todo_max: Some(2),
        seed: Some(3),
        ..ExploreConfig::default()
    };
    let (report, _) = explore(tree(), config);
    assert_eq!(report.status, ExploreStatus::Completed);
    // At most two states of every level are expanded.
    assert!(report.transitions <= 2 + 2 * 2 * 3);
    assert!(report.states < 15);
}

#[test]
fn test_depth_first_bound() {
    let config = ExploreConfig {
        strategy: Strategy::Depth,
        max_states: 3,
        ..ExploreConfig::default()
    };
    let (report, _) = explore(tree(), config);
    assert_eq!(report.status, ExploreStatus::Completed);
    assert_eq!(report.transitions, 6);
    assert_eq!(report.levels, 0);
}

#[test]
fn test_depth_first_full() {
    let config = ExploreConfig {
        strategy: Strategy::Depth,
        detect_deadlock: true,
        ..ExploreConfig::default()
    };
    let (report, _) = explore(tree(), config);
    assert_eq!(report.states, 15);
    assert_eq!(report.deadlocks, 8);
}

#[test]
fn test_random_walk_ends_in_deadlock() {
    for seed in 0..5 {
        let config = ExploreConfig {
            strategy: Strategy::Random,
            seed: Some(seed),
            ..ExploreConfig::default()
        };
        let (report, _) = explore(tree(), config);
        assert_eq!(report.status, ExploreStatus::Completed);
        // Three steps, each adding both outgoing transitions.
        assert_eq!(report.transitions, 6);
        assert_eq!(report.states, 7);
    }
}

#[test]
fn test_random_walk_step_bound_and_seed() {
    let run = || {
        let config = ExploreConfig {
            strategy: Strategy::Random,
            max_states: 2,
            seed: Some(11),
            ..ExploreConfig::default()
        };
        explore(tree(), config)
    };
    let (first, lts_first) = run();
    let (second, lts_second) = run();
    assert_eq!(first.status, ExploreStatus::StateLimitReached);
    assert_eq!(first.transitions, 4);
    assert_eq!(first, second);
    assert_eq!(lts_first.edges(), lts_second.edges());
}

#[test]
fn test_value_prioritized() {
    let mut b = ModelBuilder::new();
    let x = b.param("x", Sort::range(0, 3));
    let d = b.var("d", Sort::range(0, 2));
    b.summand(
        Summand::new(Expr::eq(x.expr(), Expr::int(0)), vec![Expr::add(d.expr(), Expr::int(1))])
            .sum(d.clone())
            .action("w", vec![d.expr()]),
    );
    b.initial(vec![Expr::int(0)]);
    let model = Arc::new(b.build().unwrap());

    let (all, _) = explore(Arc::clone(&model), ExploreConfig::default());
    assert_eq!(all.transitions, 3);

    for strategy in [Strategy::ValuePrioritized, Strategy::ValueRandomPrioritized] {
        let config = ExploreConfig {
            strategy,
            seed: Some(1),
            ..ExploreConfig::default()
        };
        let (report, lts) = explore(Arc::clone(&model), config);
        assert_eq!(report.transitions, 1, "{}", strategy);
        assert_eq!(lts.edges(), vec![(0, "w(0)", 1)]);
    }
}

#[test]
fn test_bounded_store_stays_within_capacity() {
    let config = ExploreConfig {
        bithash: Some(4),
        ..ExploreConfig::default()
    };
    let (report, lts) = explore(tree(), config);
    assert!(lts.states.iter().all(|(i, _)| *i < 4));
    assert!(report.states <= 4);
}

#[test]
fn test_bounded_store_with_bounded_queue_stays_within_capacity() {
    // Queue evictions free store slots; reused slots are not counted twice.
    for seed in 0..50 {
        let config = ExploreConfig {
            bithash: Some(8),
            todo_max: Some(2),
            seed: Some(seed),
            ..ExploreConfig::default()
        };
        let (report, lts) = explore(tree(), config);
        assert!(lts.states.iter().all(|(i, _)| *i < 8));
        assert!(report.states <= 8, "seed {}: {} states", seed, report.states);
    }
}

#[test]
fn test_caching_and_pruning_do_not_change_the_lts() {
    let (fast_report, fast) = explore(tree(), ExploreConfig::default());
    let config = ExploreConfig {
        caching: false,
        pruning: false,
        ..ExploreConfig::default()
    };
    let (plain_report, plain) = explore(tree(), config);
    assert_eq!(fast_report, plain_report);
    assert_eq!(fast.edges(), plain.edges());
}

#[test]
fn test_deadlock_trace_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut traces = DirTraceSink::new(dir.path());
    let mut sink = NullSink;
    let config = ExploreConfig {
        detect_deadlock: true,
        trace: true,
        trace_prefix: "chain".to_string(),
        ..ExploreConfig::default()
    };
    let report = {
        let mut explorer = Explorer::new(graph(2, &[(0, "a", 1), (1, "b", 2)]), config, &mut sink);
        explorer.set_trace_sink(&mut traces);
        explorer.run().unwrap()
    };
    assert_eq!(report.traces_saved, 1);

    let text = std::fs::read_to_string(dir.path().join("chain_dlk_0.trc")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["initial"], serde_json::json!([0]));
    let actions: Vec<&str> = json["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["a", "b"]);
}

#[test]
fn test_trace_through_confluence() {
    // 0 -a-> 1 -tau-> 2 -b-> 3: with confluence, 1 is represented by 2.
    let model = graph(3, &[(0, "a", 1), (1, "", 2), (2, "b", 3)]);
    let mut sink = NullSink;
    let mut traces = TraceCollector::default();
    let config = ExploreConfig {
        confluence: Some(TAU.to_string()),
        watched_actions: vec!["b".to_string()],
        trace: true,
        ..ExploreConfig::default()
    };
    let report = {
        let mut explorer = Explorer::new(model, config, &mut sink);
        explorer.set_trace_sink(&mut traces);
        explorer.run().unwrap()
    };
    assert_eq!(report.detected_actions, 1);
    let trace = &traces.traces[0].1;
    let steps: Vec<(&str, State)> = trace
        .steps
        .iter()
        .map(|s| (s.action.as_str(), s.state.clone()))
        .collect();
    assert_eq!(steps, vec![("a", int_state(2)), ("b", int_state(3))]);
}

#[test]
fn test_aut_output() {
    let model = graph(3, &[(0, "a", 1), (0, "a", 2), (1, "b", 3), (2, "b", 3)]);
    let mut aut = AutWriter::new(Cursor::new(Vec::new())).unwrap();
    let report = Explorer::new(model, ExploreConfig::default(), &mut aut)
        .run()
        .unwrap();
    assert_eq!(report.transitions, 4);

    let text = String::from_utf8(aut.into_inner().into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0].trim_end(), "des (0,4,4)");
    assert_eq!(&lines[1..], &["(0,\"a\",1)", "(0,\"a\",2)", "(1,\"b\",3)", "(2,\"b\",3)"]);
}

#[test]
fn test_loaded_model_explores() {
    let json = serde_json::json!({
        "params": [{ "name": "n", "sort": { "kind": "Range", "lo": 0, "hi": 4 } }],
        "summands": [{
            "condition": { "kind": "Binary", "op": "lt",
                           "left": { "kind": "Var", "name": "n" },
                           "right": { "kind": "Int", "value": 4 } },
            "actions": [{ "label": "inc" }],
            "assign": [{ "param": "n", "value": { "kind": "Binary", "op": "add",
                         "left": { "kind": "Var", "name": "n" },
                         "right": { "kind": "Int", "value": 1 } } }]
        }],
        "init": { "values": [{ "kind": "Int", "value": 0 }] }
    });
    let model = Arc::new(load::from_json(&json.to_string()).unwrap());
    let config = ExploreConfig {
        detect_deadlock: true,
        ..ExploreConfig::default()
    };
    let (report, _) = explore(model, config);
    assert_eq!((report.states, report.transitions, report.deadlocks), (5, 4, 1));
}
