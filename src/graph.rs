use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Debug;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} declared twice")]
    Duplicate(String),
    #[error("{node} depends on undeclared node {dep}")]
    UnknownDependency { node: String, dep: String },
    #[error("dependency cycle involving {0}")]
    Cycle(String),
}

/// Static dependency graph; edges point from a node to the nodes it reads.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    order: Vec<N>,
    rank: BTreeMap<N, usize>,
    deps: BTreeMap<N, Vec<N>>,
    dependents: BTreeMap<N, Vec<N>>,
}

#[derive(Debug, Clone)]
pub struct GraphBuilder<N> {
    nodes: Vec<(N, Vec<N>)>,
}

impl<N> Default for GraphBuilder<N> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<N: Copy + Ord + Debug> GraphBuilder<N> {
    pub fn node(mut self, node: N, deps: &[N]) -> Self {
        self.nodes.push((node, deps.to_vec()));
        self
    }

    pub fn build(self) -> Result<DependencyGraph<N>, GraphError> {
        let mut deps: BTreeMap<N, Vec<N>> = BTreeMap::new();
        for (node, node_deps) in self.nodes {
            if deps.insert(node, node_deps).is_some() {
                return Err(GraphError::Duplicate(format!("{node:?}")));
            }
        }

        let mut dependents: BTreeMap<N, Vec<N>> =
            deps.keys().map(|n| (*n, Vec::new())).collect();
        let mut indegree: BTreeMap<N, usize> = BTreeMap::new();
        for (node, node_deps) in &deps {
            let mut unique = BTreeSet::new();
            for dep in node_deps {
                if !unique.insert(*dep) {
                    continue;
                }
                let Some(list) = dependents.get_mut(dep) else {
                    return Err(GraphError::UnknownDependency {
                        node: format!("{node:?}"),
                        dep: format!("{dep:?}"),
                    });
                };
                list.push(*node);
            }
            indegree.insert(*node, unique.len());
        }

        // Kahn's algorithm; BTreeMap iteration keeps the order deterministic.
        let mut ready: VecDeque<N> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(deps.len());
        while let Some(node) = ready.pop_front() {
            order.push(node);
            for next in dependents.get(&node).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*next);
                    }
                }
            }
        }

        if order.len() != deps.len() {
            let stuck = indegree
                .iter()
                .find(|(_, d)| **d > 0)
                .map(|(n, _)| format!("{n:?}"))
                .unwrap_or_default();
            return Err(GraphError::Cycle(stuck));
        }

        let rank = order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        Ok(DependencyGraph {
            order,
            rank,
            deps,
            dependents,
        })
    }
}

impl<N: Copy + Ord + Debug> DependencyGraph<N> {
    pub fn builder() -> GraphBuilder<N> {
        GraphBuilder::default()
    }

    /// Every node, dependencies before dependents.
    pub fn topo_order(&self) -> &[N] {
        &self.order
    }

    pub fn deps(&self, node: N) -> &[N] {
        self.deps.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents(&self, node: N) -> &[N] {
        self.dependents.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, node: N) -> bool {
        self.deps.contains_key(&node)
    }

    /// Transitive dependents of `changed` (excluding it), in topological order.
    pub fn affected(&self, changed: N) -> Vec<N> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([changed]);
        while let Some(node) = queue.pop_front() {
            for next in self.dependents(node) {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        seen.remove(&changed);

        let mut out: Vec<N> = seen.into_iter().collect();
        out.sort_by_key(|n| self.rank.get(n).copied().unwrap_or(usize::MAX));
        out
    }
}
