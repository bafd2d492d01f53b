//! Static validation of workflow definitions.
//!
//! Validation runs every check and reports the aggregated list of
//! violations, never just the first, so a definition can be fixed in one
//! pass. The input graph is never mutated.
//!
//! Check order: structural, step-level, flow-level, connectivity,
//! variables.

use std::collections::HashSet;

use crate::definition::graph::{
    StepDef, StepType, WorkflowGraph, EVENT_KINDS, GATEWAY_KINDS, VARIABLE_TYPES,
};
use crate::error::{AppResult, ValidationErrors};
use crate::model::definition::parse_version;

/// Validate a workflow definition.
///
/// Returns `Ok(())` or an aggregated `AppError::Validation` listing every
/// violation found.
pub fn validate_graph(name: &str, version: &str, graph: &WorkflowGraph) -> AppResult<()> {
    collect_violations(name, version, graph).into_result()
}

/// Run all validation phases and collect every violation.
pub fn collect_violations(name: &str, version: &str, graph: &WorkflowGraph) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    check_structure(name, version, graph, &mut errors);
    check_steps(graph, &mut errors);
    check_flow(graph, &mut errors);
    check_connectivity(graph, &mut errors);
    check_variables(graph, &mut errors);

    errors
}

/// Structural checks: name, version shape, non-empty graph.
fn check_structure(name: &str, version: &str, graph: &WorkflowGraph, errors: &mut ValidationErrors) {
    if name.trim().is_empty() {
        errors.push("definition name must not be empty");
    }

    if parse_version(version).is_none() {
        errors.push(format!(
            "version '{}' does not match major.minor[.patch]",
            version
        ));
    }

    if graph.steps.is_empty() {
        errors.push("definition must declare at least one step");
    }
}

/// Step-level checks: identity, uniqueness, type-specific configuration.
fn check_steps(graph: &WorkflowGraph, errors: &mut ValidationErrors) {
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, step) in graph.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            errors.push(format!("steps[{}] has an empty id", index));
            continue;
        }

        if step.name.trim().is_empty() {
            errors.push(format!("step '{}' has an empty name", step.id));
        }

        if !seen.insert(step.id.as_str()) {
            errors.push(format!("duplicate step id '{}'", step.id));
        }

        check_step_config(step, errors);
    }
}

/// Type-specific required fields.
fn check_step_config(step: &StepDef, errors: &mut ValidationErrors) {
    match step.step_type {
        StepType::Script => {
            if step.config_str("script").map_or(true, |s| s.trim().is_empty()) {
                errors.push(format!("script step '{}' must declare a script body", step.id));
            }
            if step
                .config_str("script_format")
                .map_or(true, |s| s.trim().is_empty())
            {
                errors.push(format!(
                    "script step '{}' must declare a script format",
                    step.id
                ));
            }
        }
        StepType::Gateway => match step.config_str("gateway_kind") {
            Some(kind) if GATEWAY_KINDS.contains(&kind) => {}
            Some(kind) => errors.push(format!(
                "gateway step '{}' has unsupported gateway kind '{}' (expected one of {:?})",
                step.id, kind, GATEWAY_KINDS
            )),
            None => errors.push(format!(
                "gateway step '{}' must declare a gateway kind",
                step.id
            )),
        },
        StepType::Event => match step.config_str("event_kind") {
            Some(kind) if EVENT_KINDS.contains(&kind) => {}
            Some(kind) => errors.push(format!(
                "event step '{}' has unsupported event kind '{}' (expected one of {:?})",
                step.id, kind, EVENT_KINDS
            )),
            None => errors.push(format!("event step '{}' must declare an event kind", step.id)),
        },
        _ => {}
    }
}

/// Flow-level checks: start/end presence, connection endpoints, guard
/// expressions.
fn check_flow(graph: &WorkflowGraph, errors: &mut ValidationErrors) {
    if graph.steps.is_empty() {
        return;
    }

    if graph.start_steps().is_empty() {
        errors.push("definition must declare a start event step");
    }
    if graph.end_steps().is_empty() {
        errors.push("definition must declare an end event step");
    }

    let step_ids: HashSet<&str> = graph.steps.iter().map(|s| s.id.as_str()).collect();

    for (index, connection) in graph.connections.iter().enumerate() {
        if !step_ids.contains(connection.from.as_str()) {
            errors.push(format!(
                "connections[{}] references unknown step '{}' in from",
                index, connection.from
            ));
        }
        if !step_ids.contains(connection.to.as_str()) {
            errors.push(format!(
                "connections[{}] references unknown step '{}' in to",
                index, connection.to
            ));
        }

        if let Some(condition) = &connection.condition {
            if !is_valid_condition_expression(condition) {
                errors.push(format!(
                    "connections[{}] has invalid condition expression: {}",
                    index, condition
                ));
            }
        }
    }
}

/// Basic validation that a guard looks like a supported expression: not
/// empty, and either using `${...}` interpolation or free of stray braces.
fn is_valid_condition_expression(expr: &str) -> bool {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.contains("${") {
        return trimmed.contains('}');
    }
    !trimmed.contains('{')
}

/// Connectivity check: every step must be reachable from a start step.
///
/// The reachable set is computed by iterative closure over the connection
/// list until a fixed point; cycles are legal and terminate naturally.
fn check_connectivity(graph: &WorkflowGraph, errors: &mut ValidationErrors) {
    let start_steps = graph.start_steps();
    if start_steps.is_empty() {
        // Already reported as a missing start role.
        return;
    }

    let mut reachable: HashSet<&str> = start_steps.into_iter().collect();

    loop {
        let mut changed = false;
        for connection in &graph.connections {
            if reachable.contains(connection.from.as_str())
                && !reachable.contains(connection.to.as_str())
            {
                reachable.insert(connection.to.as_str());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for step in &graph.steps {
        if !reachable.contains(step.id.as_str()) {
            errors.push(format!(
                "step '{}' is not reachable from any start step",
                step.id
            ));
        }
    }
}

/// Variables schema checks: identifier shape and declared type.
fn check_variables(graph: &WorkflowGraph, errors: &mut ValidationErrors) {
    for variable in &graph.variables {
        if !is_valid_variable_name(&variable.name) {
            errors.push(format!(
                "variable name '{}' is not a valid identifier",
                variable.name
            ));
        }
        if !VARIABLE_TYPES.contains(&variable.var_type.as_str()) {
            errors.push(format!(
                "variable '{}' has unsupported type '{}' (expected one of {:?})",
                variable.name, variable.var_type, VARIABLE_TYPES
            ));
        }
    }
}

/// `^[A-Za-z][A-Za-z0-9_]*$`
fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::graph::{Connection, VariableDef};
    use std::collections::HashMap;

    fn step(id: &str, step_type: StepType, config: serde_json::Value) -> StepDef {
        let config: HashMap<String, serde_json::Value> = match config {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        StepDef {
            id: id.to_string(),
            name: format!("Step {}", id),
            step_type,
            config,
        }
    }

    fn connection(from: &str, to: &str) -> Connection {
        Connection {
            from: from.to_string(),
            to: to.to_string(),
            condition: None,
        }
    }

    fn valid_graph() -> WorkflowGraph {
        WorkflowGraph {
            steps: vec![
                step("start", StepType::Event, serde_json::json!({"event_kind": "start"})),
                step("work", StepType::Service, serde_json::json!({})),
                step("end", StepType::Event, serde_json::json!({"event_kind": "end"})),
            ],
            connections: vec![connection("start", "work"), connection("work", "end")],
            variables: vec![],
        }
    }

    #[test]
    fn test_valid_graph_passes() {
        assert!(validate_graph("lead_routing", "1.0", &valid_graph()).is_ok());
    }

    #[test]
    fn test_empty_name_and_bad_version() {
        let errors = collect_violations("  ", "1", &valid_graph());
        assert_eq!(errors.len(), 2);
        assert!(errors.violations()[0].contains("name"));
        assert!(errors.violations()[1].contains("major.minor"));
    }

    #[test]
    fn test_no_steps() {
        let errors = collect_violations("x", "1.0", &WorkflowGraph::default());
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("at least one step")));
    }

    #[test]
    fn test_duplicate_step_ids() {
        let mut graph = valid_graph();
        graph
            .steps
            .push(step("work", StepType::Service, serde_json::json!({})));
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("duplicate step id 'work'")));
    }

    #[test]
    fn test_script_step_requires_body_and_format() {
        let mut graph = valid_graph();
        graph
            .steps
            .push(step("calc", StepType::Script, serde_json::json!({})));
        graph.connections.push(connection("work", "calc"));
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors.violations().iter().any(|v| v.contains("script body")));
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("script format")));
    }

    #[test]
    fn test_gateway_kind_must_be_supported() {
        let mut graph = valid_graph();
        graph.steps.push(step(
            "branch",
            StepType::Gateway,
            serde_json::json!({"gateway_kind": "random"}),
        ));
        graph.connections.push(connection("work", "branch"));
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("unsupported gateway kind 'random'")));
    }

    #[test]
    fn test_missing_start_and_end_reported_by_role() {
        let graph = WorkflowGraph {
            steps: vec![step("only", StepType::Service, serde_json::json!({}))],
            connections: vec![],
            variables: vec![],
        };
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("start event step")));
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("end event step")));
    }

    #[test]
    fn test_connection_to_unknown_step() {
        let mut graph = valid_graph();
        graph.connections.push(connection("work", "nowhere"));
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("unknown step 'nowhere'")));
    }

    #[test]
    fn test_unreachable_step_named_in_error() {
        let mut graph = valid_graph();
        graph
            .steps
            .push(step("orphan", StepType::Service, serde_json::json!({})));
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("step 'orphan' is not reachable")));
    }

    #[test]
    fn test_cycles_are_legal() {
        let mut graph = valid_graph();
        // work -> work loop back edge
        graph.connections.push(connection("work", "work"));
        assert!(validate_graph("x", "1.0", &graph).is_ok());
    }

    #[test]
    fn test_condition_expression_shapes() {
        assert!(is_valid_condition_expression("${amount > 1000}"));
        assert!(is_valid_condition_expression("approved"));
        assert!(!is_valid_condition_expression(""));
        assert!(!is_valid_condition_expression("   "));
        assert!(!is_valid_condition_expression("{bad syntax"));
    }

    #[test]
    fn test_invalid_connection_condition() {
        let mut graph = valid_graph();
        graph.connections[0].condition = Some("".to_string());
        let errors = collect_violations("x", "1.0", &graph);
        assert!(errors
            .violations()
            .iter()
            .any(|v| v.contains("invalid condition expression")));
    }

    #[test]
    fn test_variable_checks() {
        let mut graph = valid_graph();
        graph.variables = vec![
            VariableDef {
                name: "amount".to_string(),
                var_type: "number".to_string(),
                default: None,
            },
            VariableDef {
                name: "2fast".to_string(),
                var_type: "string".to_string(),
                default: None,
            },
            VariableDef {
                name: "owner".to_string(),
                var_type: "uuid".to_string(),
                default: None,
            },
        ];
        let errors = collect_violations("x", "1.0", &graph);
        assert_eq!(errors.len(), 2);
        assert!(errors.violations()[0].contains("'2fast'"));
        assert!(errors.violations()[1].contains("unsupported type 'uuid'"));
    }

    #[test]
    fn test_all_violations_reported_together() {
        let graph = WorkflowGraph {
            steps: vec![
                step("start", StepType::Event, serde_json::json!({"event_kind": "start"})),
                step("loose", StepType::Script, serde_json::json!({})),
            ],
            connections: vec![connection("start", "ghost")],
            variables: vec![VariableDef {
                name: "bad name".to_string(),
                var_type: "string".to_string(),
                default: None,
            }],
        };
        let errors = collect_violations("", "x.y", &graph);
        // name, version, script body, script format, missing end,
        // unknown connection target, unreachable 'loose', variable name
        assert!(errors.len() >= 7);
    }
}
