//! Property-based tests for traces, subscriptions, analysis and execution.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use waypoint::analysis::TransitionGraph;
use waypoint::builder::{Declaration, StateDecl};
use waypoint::compiler::{compile, CompiledSpec};
use waypoint::core::{StateId, Subscriptions, Trace, TraceSegment};
use waypoint::engine::{run_async, run_blocking};

const NODES: [&str; 6] = ["start", "a", "b", "c", "d", "e"];
const TARGETS: [&str; 8] = ["start", "a", "b", "c", "d", "e", "end", "halt"];

prop_compose! {
    fn arbitrary_graph()(
        edges in prop::collection::vec(prop::collection::vec(0..TARGETS.len(), 0..4), NODES.len())
    ) -> TransitionGraph {
        edges.into_iter().enumerate().fold(TransitionGraph::new(), |graph, (i, targets)| {
            graph.state(NODES[i], targets.into_iter().map(|t| TARGETS[t]))
        })
    }
}

fn counter(threshold: i64) -> CompiledSpec<()> {
    compile(
        Declaration::new().state(
            "start",
            StateDecl::sync(|_, mut d| {
                let count = d["count"].as_i64().unwrap_or(0) + 1;
                d["count"] = json!(count);
                Ok(d)
            })
            .when("end", move |d| d["count"].as_i64().unwrap_or(0) > threshold)
            .always("start"),
        ),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn trace_keeps_the_most_recent_segments(max in 0usize..20, steps in 0usize..60) {
        let trace = (0..steps).fold(Trace::new(), |trace, i| {
            trace.record(TraceSegment::success(format!("s{i}"), Duration::ZERO), max)
        });

        let expected: Vec<String> = (steps.saturating_sub(max)..steps).map(|i| format!("s{i}")).collect();
        let actual: Vec<String> = trace.path().map(|id| id.name().to_string()).collect();

        prop_assert!(trace.len() <= max);
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn subscription_fires_once_per_change(values in prop::collection::vec(0i64..3, 1..20)) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let initial = json!({"v": values[0]});
        let subs = Subscriptions::new()
            .watch("v", move |_, old: &Value, new: &Value| {
                assert_ne!(old, new);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .arm(&initial);

        values.iter().fold(subs, |subs, v| subs.observe(&json!({"v": v})));

        let changes = values.windows(2).filter(|w| w[0] != w[1]).count();
        prop_assert_eq!(fired.load(Ordering::SeqCst), changes);
    }

    #[test]
    fn analysis_partitions_declared_states(graph in arbitrary_graph()) {
        let analysis = graph.analyze();
        let declared: BTreeSet<StateId> = graph.declared().cloned().collect();

        prop_assert!(analysis.reachable.is_disjoint(&analysis.unreachable));
        prop_assert!(analysis.no_path_to_end.is_subset(&analysis.reachable));

        let covered: BTreeSet<StateId> = analysis
            .reachable
            .union(&analysis.unreachable)
            .cloned()
            .collect();
        prop_assert_eq!(covered, declared);
    }

    #[test]
    fn cycles_are_canonical_and_elementary(graph in arbitrary_graph()) {
        let analysis = graph.analyze();

        for cycle in &analysis.cycles {
            prop_assert!(!cycle.is_empty());
            prop_assert_eq!(cycle.iter().min(), cycle.first());

            let distinct: BTreeSet<&StateId> = cycle.iter().collect();
            prop_assert_eq!(distinct.len(), cycle.len());

            for (i, node) in cycle.iter().enumerate() {
                let next = &cycle[(i + 1) % cycle.len()];
                prop_assert!(graph.targets(node.name()).contains(next));
            }
        }
    }

    #[test]
    fn ring_is_reported_once_whatever_the_entry(size in 1usize..6, entry in 0usize..6) {
        let ring: Vec<String> = (0..size).map(|i| format!("n{i}")).collect();
        let graph = ring.iter().enumerate().fold(
            TransitionGraph::new().state("start", [ring[entry % size].clone()]),
            |graph, (i, node)| graph.state(node.clone(), [ring[(i + 1) % size].clone(), "end".to_string()]),
        );

        let analysis = graph.analyze();
        let expected: Vec<StateId> = ring.iter().map(|n| StateId::from(n.as_str())).collect();

        prop_assert_eq!(analysis.cycles.len(), 1);
        prop_assert!(analysis.cycles.contains(&expected));
    }

    #[test]
    fn execution_modes_agree(threshold in 0i64..25) {
        let spec = counter(threshold);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let blocking = run_blocking(&spec, (), None).unwrap().completed();
        let deferred = runtime.block_on(run_async(&spec, (), None)).unwrap().completed();

        prop_assert_eq!(&blocking, &Some(json!({"count": threshold + 1})));
        prop_assert_eq!(blocking, deferred);
    }

    #[test]
    fn compilation_is_deterministic(threshold in 0i64..10, count in 0i64..20) {
        let first = counter(threshold);
        let second = counter(threshold);
        let data = json!({"count": count});

        prop_assert_eq!(first.resolve("start", &data), second.resolve("start", &data));
    }
}
