//! Dependency graph over persisted build units.
//!
//! The build manager never needs a global graph; it discovers edges while
//! resolving. This view is built after the fact from the unit store for
//! reporting: listing units in dependency order and grouping them into levels.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::unit::BuildUnit;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error("persisted units form a cycle through {0}")]
  CycleDetected(String),
}

/// Units as nodes, "is required by" as edges.
pub struct UnitGraph {
  graph: DiGraph<BuildUnit, ()>,
}

impl UnitGraph {
  /// Build the graph from a set of units.
  ///
  /// Edges to units that are not in the set (never persisted, or removed) are
  /// dropped.
  pub fn from_units(units: Vec<BuildUnit>) -> Result<Self, GraphError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for unit in units {
      let key = unit.key.clone();
      let idx = graph.add_node(unit);
      nodes.insert(key, idx);
    }

    let edges: Vec<(NodeIndex, NodeIndex)> = graph
      .node_indices()
      .flat_map(|dependent| {
        graph[dependent]
          .required_builds
          .iter()
          .filter_map(|dep| nodes.get(&dep.key).map(|&dependency| (dependency, dependent)))
          .collect::<Vec<_>>()
      })
      .collect();
    for (dependency, dependent) in edges {
      graph.add_edge(dependency, dependent, ());
    }

    let unit_graph = Self { graph };
    unit_graph.topological()?;
    Ok(unit_graph)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Units with dependencies before dependents.
  pub fn topological(&self) -> Result<Vec<&BuildUnit>, GraphError> {
    let sorted = toposort(&self.graph, None)
      .map_err(|cycle| GraphError::CycleDetected(self.graph[cycle.node_id()].description.clone()))?;
    Ok(sorted.into_iter().map(|idx| &self.graph[idx]).collect())
  }

  /// Units grouped by depth: level 0 requires no other unit, level `n` only
  /// units from levels below `n`.
  pub fn levels(&self) -> Result<Vec<Vec<&BuildUnit>>, GraphError> {
    let sorted = toposort(&self.graph, None)
      .map_err(|cycle| GraphError::CycleDetected(self.graph[cycle.node_id()].description.clone()))?;

    let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
    for &idx in &sorted {
      let level = self
        .graph
        .neighbors_directed(idx, Direction::Incoming)
        .filter_map(|dep| depth.get(&dep))
        .map(|d| d + 1)
        .max()
        .unwrap_or(0);
      depth.insert(idx, level);
    }

    let max_level = depth.values().copied().max().unwrap_or(0);
    let mut levels: Vec<Vec<&BuildUnit>> = vec![Vec::new(); max_level + 1];
    for idx in sorted {
      levels[depth[&idx]].push(&self.graph[idx]);
    }
    levels.retain(|l| !l.is_empty());
    Ok(levels)
  }
}
