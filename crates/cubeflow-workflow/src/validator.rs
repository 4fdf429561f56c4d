//! Structural validation and execution ordering.

use std::collections::HashSet;

use serde::Serialize;
use serde::ser::SerializeStruct;
use tracing::debug;

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::workflow::Workflow;
use crate::{Connection, Cube};

/// Outcome of [`WorkflowValidator::validate`]. Every applicable error is collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
  pub errors: Vec<WorkflowError>,
}

impl ValidationReport {
  pub fn is_valid(&self) -> bool {
    self.errors.is_empty()
  }

  /// Human-readable error messages.
  pub fn messages(&self) -> Vec<String> {
    self.errors.iter().map(ToString::to_string).collect()
  }

  /// Ids reported as duplicates.
  pub fn duplicate_ids(&self) -> Vec<&str> {
    self
      .errors
      .iter()
      .filter_map(|e| match e {
        WorkflowError::DuplicateCubeId(id) => Some(id.as_str()),
        _ => None,
      })
      .collect()
  }
}

impl Serialize for ValidationReport {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("ValidationReport", 2)?;
    state.serialize_field("valid", &self.is_valid())?;
    state.serialize_field("errors", &self.messages())?;
    state.end()
  }
}

/// Structural checks on a workflow graph.
pub struct WorkflowValidator;

impl WorkflowValidator {
  /// Validate a workflow.
  ///
  /// An empty workflow reports exactly one error. Otherwise duplicate ids,
  /// dangling connection endpoints, cycles, and a missing entry point are all
  /// reported together.
  pub fn validate(workflow: &Workflow) -> ValidationReport {
    let mut errors = Vec::new();

    if workflow.cubes.is_empty() {
      errors.push(WorkflowError::Empty);
      return ValidationReport { errors };
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for cube in &workflow.cubes {
      if !seen.insert(cube.id.as_str()) && reported.insert(cube.id.as_str()) {
        errors.push(WorkflowError::DuplicateCubeId(cube.id.clone()));
      }
    }

    for conn in &workflow.connections {
      if !seen.contains(conn.source_id.as_str()) {
        errors.push(WorkflowError::UnknownSource {
          connection_id: conn.id.clone(),
          cube_id: conn.source_id.clone(),
        });
      }
      if !seen.contains(conn.target_id.as_str()) {
        errors.push(WorkflowError::UnknownTarget {
          connection_id: conn.id.clone(),
          cube_id: conn.target_id.clone(),
        });
      }
    }

    let graph = workflow.graph();
    if graph.has_cycle() {
      errors.push(WorkflowError::Cycle);
    }

    if graph.entry_points().is_empty() {
      errors.push(WorkflowError::NoEntryPoints);
    }

    debug!(
      workflow_id = %workflow.workflow_id,
      cubes = workflow.cubes.len(),
      connections = workflow.connections.len(),
      errors = errors.len(),
      "workflow_validated"
    );

    ValidationReport { errors }
  }

  /// Execution order for a validated workflow.
  ///
  /// Callers must only pass cubes and connections that passed
  /// [`validate`](Self::validate); cubes on a cycle would be dropped.
  pub fn execution_order(cubes: &[Cube], connections: &[Connection]) -> Vec<String> {
    Graph::new(cubes, connections).topological_order()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::CubeType;

  fn workflow(ids: &[&str], edges: &[(&str, &str)]) -> Workflow {
    let mut wf = Workflow::new("wf", "owner", "test");
    for id in ids {
      wf = wf.with_cube(Cube::new(*id, CubeType::LoaderText));
    }
    for (i, (from, to)) in edges.iter().enumerate() {
      wf = wf.with_connection(Connection::new(format!("e{i}"), *from, *to));
    }
    wf
  }

  #[test]
  fn test_empty_workflow_has_exactly_one_error() {
    let report = WorkflowValidator::validate(&workflow(&[], &[("a", "b")]));
    assert!(!report.is_valid());
    assert_eq!(report.errors, vec![WorkflowError::Empty]);
  }

  #[test]
  fn test_linear_workflow_is_valid() {
    let report = WorkflowValidator::validate(&workflow(&["a", "b"], &[("a", "b")]));
    assert!(report.is_valid(), "{:?}", report.errors);
  }

  #[test]
  fn test_branching_workflow_is_valid() {
    let report = WorkflowValidator::validate(&workflow(
      &["1", "2", "3", "4"],
      &[("1", "2"), ("2", "3"), ("2", "4")],
    ));
    assert!(report.is_valid());
  }

  #[test]
  fn test_duplicate_ids_reported_once_each() {
    let report = WorkflowValidator::validate(&workflow(&["a", "b", "a", "a", "b", "c"], &[]));
    assert_eq!(report.duplicate_ids(), vec!["a", "b"]);
  }

  #[test]
  fn test_dangling_connections() {
    let report = WorkflowValidator::validate(&workflow(&["a"], &[("ghost", "a"), ("a", "void")]));
    assert!(report.errors.contains(&WorkflowError::UnknownSource {
      connection_id: "e0".to_string(),
      cube_id: "ghost".to_string(),
    }));
    assert!(report.errors.contains(&WorkflowError::UnknownTarget {
      connection_id: "e1".to_string(),
      cube_id: "void".to_string(),
    }));
  }

  #[test]
  fn test_cycle_reported_once_with_all_other_errors() {
    let report = WorkflowValidator::validate(&workflow(&["a", "b"], &[("a", "b"), ("b", "a")]));
    assert!(!report.is_valid());
    let cycles = report
      .errors
      .iter()
      .filter(|e| **e == WorkflowError::Cycle)
      .count();
    assert_eq!(cycles, 1);
    assert!(report.errors.contains(&WorkflowError::NoEntryPoints));
  }

  #[test]
  fn test_cycle_with_entry_point_still_invalid() {
    let report = WorkflowValidator::validate(&workflow(
      &["start", "a", "b"],
      &[("start", "a"), ("a", "b"), ("b", "a")],
    ));
    assert_eq!(report.errors, vec![WorkflowError::Cycle]);
  }

  #[test]
  fn test_report_serializes_as_valid_and_messages() {
    let report = WorkflowValidator::validate(&workflow(&[], &[]));
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(
      value,
      serde_json::json!({
        "valid": false,
        "errors": ["workflow must contain at least one cube"]
      })
    );
  }

  #[test]
  fn test_execution_order_respects_connections() {
    let wf = workflow(&["save", "load", "gen"], &[("load", "gen"), ("gen", "save")]);
    let order = WorkflowValidator::execution_order(&wf.cubes, &wf.connections);
    assert_eq!(order, vec!["load", "gen", "save"]);
  }
}
