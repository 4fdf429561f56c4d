use std::collections::{HashMap, HashSet, VecDeque};

use crate::{Connection, Cube};

/// Graph structure for traversal and analysis of the declared connections.
///
/// Cube order is preserved from authoring order so that every traversal that
/// has a choice to make breaks ties the same way.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Cube ids in authoring order.
  order: Vec<String>,
  /// Adjacency list: cube_id -> list of downstream cube_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: cube_id -> list of upstream cube_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from cubes and connections.
  ///
  /// Connections that name unknown cubes still contribute edges; reporting
  /// them is the validator's job.
  pub fn new(cubes: &[Cube], connections: &[Connection]) -> Self {
    let mut order = Vec::with_capacity(cubes.len());
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for cube in cubes {
      if !adjacency.contains_key(&cube.id) {
        order.push(cube.id.clone());
      }
      adjacency.entry(cube.id.clone()).or_default();
      reverse_adjacency.entry(cube.id.clone()).or_default();
    }

    for conn in connections {
      adjacency
        .entry(conn.source_id.clone())
        .or_default()
        .push(conn.target_id.clone());
      reverse_adjacency
        .entry(conn.target_id.clone())
        .or_default()
        .push(conn.source_id.clone());
    }

    Self {
      order,
      adjacency,
      reverse_adjacency,
    }
  }

  /// Cubes with no incoming connections, in authoring order.
  pub fn entry_points(&self) -> Vec<&str> {
    self
      .order
      .iter()
      .filter(|id| self.in_degree(id) == 0)
      .map(String::as_str)
      .collect()
  }

  /// Number of declared connections targeting a cube.
  pub fn in_degree(&self, cube_id: &str) -> usize {
    self.upstream(cube_id).len()
  }

  /// Get downstream cubes for a given cube.
  pub fn downstream(&self, cube_id: &str) -> &[String] {
    self
      .adjacency
      .get(cube_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream cubes for a given cube.
  pub fn upstream(&self, cube_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(cube_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Depth-first search with a current-path set.
  ///
  /// Reaching a cube that is already on the current path means the declared
  /// connections loop back on themselves. The walk keeps an explicit stack of
  /// (cube, next child index) so path length is bounded by memory, not by the
  /// thread stack.
  pub fn has_cycle(&self) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_path: HashSet<&str> = HashSet::new();

    // Sources that are not cubes can still start a path.
    let known: HashSet<&str> = self.order.iter().map(String::as_str).collect();
    let mut roots: Vec<&str> = self.order.iter().map(String::as_str).collect();
    let mut extra: Vec<&str> = self
      .adjacency
      .keys()
      .map(String::as_str)
      .filter(|id| !known.contains(id))
      .collect();
    extra.sort_unstable();
    roots.extend(extra);

    let mut stack: Vec<(&str, usize)> = Vec::new();
    for root in roots {
      if !visited.insert(root) {
        continue;
      }
      on_path.insert(root);
      stack.push((root, 0));

      while let Some(top) = stack.last_mut() {
        let cube_id = top.0;
        let Some(next) = self.downstream(cube_id).get(top.1) else {
          on_path.remove(cube_id);
          stack.pop();
          continue;
        };
        top.1 += 1;

        let next = next.as_str();
        if on_path.contains(next) {
          return true;
        }
        if visited.insert(next) {
          on_path.insert(next);
          stack.push((next, 0));
        }
      }
    }

    false
  }

  /// Kahn's algorithm over the cubes of this graph.
  ///
  /// The FIFO queue is seeded with zero in-degree cubes in authoring order.
  /// Cubes caught in a cycle never reach zero in-degree and are left out.
  pub fn topological_order(&self) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> = self
      .order
      .iter()
      .map(|id| (id.as_str(), self.in_degree(id)))
      .collect();

    let mut queue: VecDeque<&str> = self
      .order
      .iter()
      .map(String::as_str)
      .filter(|id| in_degree.get(id) == Some(&0))
      .collect();

    let mut order = Vec::with_capacity(self.order.len());
    while let Some(cube_id) = queue.pop_front() {
      order.push(cube_id.to_string());

      for next in self.downstream(cube_id) {
        if let Some(degree) = in_degree.get_mut(next.as_str()) {
          *degree = degree.saturating_sub(1);
          if *degree == 0 {
            queue.push_back(next.as_str());
          }
        }
      }
    }

    order
  }
}
