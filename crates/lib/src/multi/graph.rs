//! Dependency graph between the children of a multi-configuration build.
//!
//! Nodes are child indices in configuration order. An edge `B -> A` means
//! child `B` declared `A` in its `dependencies` and may only run once `A`
//! has completed.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependencyGraphError {
  #[error("compiler '{compiler}' depends on unknown compiler '{dependency}'")]
  UnknownDependency { compiler: String, dependency: String },

  #[error("dependency '{0}' is ambiguous: several configurations are named '{0}'")]
  DuplicateName(String),

  #[error("dependency cycle detected involving compiler '{0}'")]
  Cycle(String),
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
  graph: DiGraph<usize, ()>,
  labels: Vec<String>,
}

/// Display label of a child: its name, or its position when unnamed.
pub(crate) fn label(index: usize, name: Option<&str>) -> String {
  name.map_or_else(|| format!("configuration[{index}]"), str::to_string)
}

impl DependencyGraph {
  /// Build the graph from each child's name and declared dependencies.
  pub fn build<'a>(
    children: impl IntoIterator<Item = (Option<&'a str>, &'a [String])>,
  ) -> Result<Self, DependencyGraphError> {
    let children: Vec<_> = children.into_iter().collect();
    let mut graph = DiGraph::new();
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut labels = Vec::with_capacity(children.len());

    for (index, (name, _)) in children.iter().enumerate() {
      graph.add_node(index);
      labels.push(label(index, *name));
      if let Some(name) = name {
        by_name.entry(name).or_default().push(index);
      }
    }

    for (index, (_, dependencies)) in children.iter().enumerate() {
      for dependency in dependencies.iter() {
        let target = match by_name.get(dependency.as_str()).map(Vec::as_slice) {
          Some([target]) => *target,
          Some(_) => return Err(DependencyGraphError::DuplicateName(dependency.clone())),
          None => {
            return Err(DependencyGraphError::UnknownDependency {
              compiler: labels[index].clone(),
              dependency: dependency.clone(),
            });
          }
        };
        let (from, to) = (NodeIndex::new(index), NodeIndex::new(target));
        if graph.find_edge(from, to).is_none() {
          graph.add_edge(from, to, ());
        }
      }
    }

    toposort(&graph, None).map_err(|cycle| DependencyGraphError::Cycle(labels[graph[cycle.node_id()]].clone()))?;

    Ok(Self { graph, labels })
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn label(&self, index: usize) -> &str {
    &self.labels[index]
  }

  /// All edges as `(dependent, dependency)` pairs, sorted.
  pub fn edges(&self) -> Vec<(usize, usize)> {
    let mut edges: Vec<_> = self
      .graph
      .edge_indices()
      .filter_map(|edge| self.graph.edge_endpoints(edge))
      .map(|(from, to)| (self.graph[from], self.graph[to]))
      .collect();
    edges.sort_unstable();
    edges
  }

  /// Direct dependencies of a child.
  pub fn dependencies_of(&self, index: usize) -> Vec<usize> {
    let mut deps: Vec<_> = self
      .graph
      .neighbors_directed(NodeIndex::new(index), Direction::Outgoing)
      .map(|node| self.graph[node])
      .collect();
    deps.sort_unstable();
    deps
  }

  /// The given children plus everything that depends on them, directly or not.
  pub fn transitive_dependents(&self, seeds: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    let mut stack: Vec<usize> = seeds.into_iter().collect();
    while let Some(index) = stack.pop() {
      if !found.insert(index) {
        continue;
      }
      stack.extend(
        self
          .graph
          .neighbors_directed(NodeIndex::new(index), Direction::Incoming)
          .map(|node| self.graph[node]),
      );
    }
    found
  }

  /// Group the children into waves: every child's dependencies sit in
  /// earlier waves. Children keep configuration order within a wave.
  pub fn waves(&self) -> Vec<Vec<usize>> {
    let mut pending: Vec<usize> = (0..self.len())
      .map(|index| self.dependencies_of(index).len())
      .collect();
    let mut remaining: BTreeSet<usize> = (0..self.len()).collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let ready: Vec<usize> = remaining.iter().copied().filter(|&index| pending[index] == 0).collect();
      // Unreachable for a graph that passed the cycle check.
      if ready.is_empty() {
        break;
      }
      for &index in &ready {
        remaining.remove(&index);
        for dependent in self.graph.neighbors_directed(NodeIndex::new(index), Direction::Incoming) {
          let slot = &mut pending[self.graph[dependent]];
          *slot = slot.saturating_sub(1);
        }
      }
      waves.push(ready);
    }
    waves
  }
}
