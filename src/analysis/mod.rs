//! Static analysis of a declaration's transition graph.
//!
//! Nodes are state identifiers and edges are dispatch targets. Nothing is
//! compiled and no handler runs. Four facts are derived:
//!
//! - `reachable`: declared states reachable from `start` (BFS)
//! - `unreachable`: declared states never reached, ignoring `end`, `halt`
//!   and `error`
//! - `no_path_to_end`: reachable states from which `end` cannot be reached
//!   (BFS over reversed edges from `end`), ignoring reserved states
//! - `cycles`: every elementary cycle reachable from `start` (DFS), each
//!   reported once, rotated to start at its smallest state

use crate::builder::{Declaration, TextualDeclaration};
use crate::core::StateId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// The facts derived from a transition graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub reachable: BTreeSet<StateId>,
    pub unreachable: BTreeSet<StateId>,
    pub no_path_to_end: BTreeSet<StateId>,
    pub cycles: BTreeSet<Vec<StateId>>,
}

impl Analysis {
    /// True when every declared state is reachable and can reach `end`.
    pub fn is_clean(&self) -> bool {
        self.unreachable.is_empty() && self.no_path_to_end.is_empty()
    }
}

/// Directed graph of declared states and their dispatch targets.
///
/// # Example
///
/// ```rust
/// use waypoint::analysis::TransitionGraph;
/// use waypoint::core::StateId;
///
/// let analysis = TransitionGraph::new()
///     .state("start", ["a"])
///     .state("a", ["b", "end"])
///     .state("b", ["a"])
///     .analyze();
///
/// assert_eq!(analysis.cycles.len(), 1);
/// assert!(analysis.cycles.contains(&vec![StateId::from("a"), StateId::from("b")]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionGraph {
    edges: BTreeMap<StateId, Vec<StateId>>,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a state and its dispatch targets, in evaluation order.
    pub fn state<I, T>(mut self, id: impl Into<StateId>, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StateId>,
    {
        self.edges
            .insert(id.into(), targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_declaration<R>(decl: &Declaration<R>) -> Self {
        decl.states().fold(Self::new(), |graph, (id, state)| {
            graph.state(
                id.clone(),
                state.dispatches().iter().map(|d| d.target.clone()),
            )
        })
    }

    pub fn from_textual(text: &TextualDeclaration) -> Self {
        text.states().fold(Self::new(), |graph, (id, state)| {
            graph.state(id.clone(), state.dispatches.iter().map(|(t, _)| t.clone()))
        })
    }

    pub fn declared(&self) -> impl Iterator<Item = &StateId> + '_ {
        self.edges.keys()
    }

    pub fn targets(&self, id: &str) -> &[StateId] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Derive the four facts.
    ///
    /// Reachability is linear in the size of the graph. Cycle enumeration
    /// only walks states that can lead back to the cycle being built, so
    /// acyclic regions stay linear too; a densely connected region can still
    /// hold exponentially many elementary cycles, and all of them are listed.
    pub fn analyze(&self) -> Analysis {
        let declared: BTreeSet<StateId> = self.edges.keys().cloned().collect();

        let visited = self.forward_from(&StateId::start());
        let reachable: BTreeSet<StateId> = visited.intersection(&declared).cloned().collect();

        let unreachable: BTreeSet<StateId> = declared
            .difference(&reachable)
            .filter(|id| !id.is_terminal())
            .cloned()
            .collect();

        let reaches_end = self.backward_from(&StateId::end());
        let no_path_to_end: BTreeSet<StateId> = reachable
            .iter()
            .filter(|id| !id.is_reserved() && !reaches_end.contains(*id))
            .cloned()
            .collect();

        let cycles = self.cycles_from(&StateId::start());

        debug!(
            reachable = reachable.len(),
            unreachable = unreachable.len(),
            no_path_to_end = no_path_to_end.len(),
            cycles = cycles.len(),
            "transition graph analyzed"
        );

        Analysis {
            reachable,
            unreachable,
            no_path_to_end,
            cycles,
        }
    }

    fn forward_from(&self, origin: &StateId) -> BTreeSet<StateId> {
        bfs(origin, |id| self.targets(id.name()).to_vec())
    }

    fn backward_from(&self, origin: &StateId) -> BTreeSet<StateId> {
        let reversed = self.reversed();
        bfs(origin, |id| reversed.get(id).cloned().unwrap_or_default())
    }

    // Reversed adjacency: target -> [sources]
    fn reversed(&self) -> BTreeMap<&StateId, Vec<StateId>> {
        let mut reversed: BTreeMap<&StateId, Vec<StateId>> = BTreeMap::new();
        for (source, targets) in &self.edges {
            for target in targets {
                reversed.entry(target).or_default().push(source.clone());
            }
        }
        reversed
    }

    /// Each cycle is found from its smallest state, walking only states that
    /// are not smaller and can still lead back to it.
    fn cycles_from(&self, origin: &StateId) -> BTreeSet<Vec<StateId>> {
        let reachable = self.forward_from(origin);
        let reversed = self.reversed();
        let mut cycles = BTreeSet::new();

        for root in &reachable {
            let returning = bfs(root, |id| {
                reversed
                    .get(id)
                    .into_iter()
                    .flatten()
                    .filter(|source| *source > root && reachable.contains(*source))
                    .cloned()
                    .collect()
            });
            let mut path = vec![root.clone()];
            self.walk(root, &returning, &mut path, &mut cycles);
        }
        cycles
    }

    fn walk(
        &self,
        root: &StateId,
        returning: &BTreeSet<StateId>,
        path: &mut Vec<StateId>,
        cycles: &mut BTreeSet<Vec<StateId>>,
    ) {
        let Some(node) = path.last().cloned() else {
            return;
        };

        for next in self.targets(node.name()) {
            if next == root {
                cycles.insert(path.clone());
            } else if returning.contains(next) && !path.contains(next) {
                path.push(next.clone());
                self.walk(root, returning, path, cycles);
                path.pop();
            }
        }
    }
}

fn bfs<F>(origin: &StateId, neighbors: F) -> BTreeSet<StateId>
where
    F: Fn(&StateId) -> Vec<StateId>,
{
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();

    visited.insert(origin.clone());
    queue.push_back(origin.clone());

    while let Some(node) = queue.pop_front() {
        for next in neighbors(&node) {
            if visited.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    visited
}

/// Analyze a builder declaration.
pub fn analyze<R>(decl: &Declaration<R>) -> Analysis {
    TransitionGraph::from_declaration(decl).analyze()
}

/// Analyze a textual declaration.
pub fn analyze_textual(text: &TextualDeclaration) -> Analysis {
    TransitionGraph::from_textual(text).analyze()
}
