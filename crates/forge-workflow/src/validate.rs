//! Parsing and validation of a [`WorkflowDefinition`] into a topological
//! plan, per the six-step procedure: unique ids, resolvable references,
//! cycle detection, registered agent types, a Kahn's-algorithm ordering,
//! and parse-time validation of every step's condition expression.

use std::collections::{HashMap, HashSet, VecDeque};

use forge_core::{ForgeError, ForgeResult, StepId};
use forge_runtime::AgentTypeRegistry;

use crate::definition::{Step, WorkflowDefinition};

/// Validate `def` against `agent_types` and the configured step-count cap,
/// returning the steps in topological execution order.
///
/// # Errors
///
/// Returns [`ForgeError::WorkflowInvalid`] for a duplicate id, an
/// unresolved `depends_on`/`parallel_with` reference, an unregistered
/// agent type, a malformed condition expression, or a step count above
/// `max_steps`. Returns [`ForgeError::WorkflowCycle`] when the dependency
/// graph is not acyclic, with the exact cycle path in the error.
pub fn validate(def: &WorkflowDefinition, agent_types: &AgentTypeRegistry, max_steps: usize) -> ForgeResult<Vec<StepId>> {
    if def.steps.is_empty() {
        return Err(ForgeError::WorkflowInvalid("a workflow must declare at least one step".to_string()));
    }
    if def.steps.len() > max_steps {
        return Err(ForgeError::WorkflowInvalid(format!(
            "workflow declares {} steps, exceeding the cap of {max_steps}",
            def.steps.len()
        )));
    }

    let mut seen = HashSet::new();
    for step in &def.steps {
        if !seen.insert(&step.id) {
            return Err(ForgeError::WorkflowInvalid(format!("duplicate step id: {}", step.id)));
        }
    }

    let ids: HashSet<&StepId> = def.steps.iter().map(|s| &s.id).collect();
    for step in &def.steps {
        for dep in step.depends_on.iter().chain(step.parallel_with.iter()) {
            if !ids.contains(dep) {
                return Err(ForgeError::WorkflowInvalid(format!(
                    "step '{}' references unknown step '{}'",
                    step.id, dep
                )));
            }
        }
        if dep_lists_self(step) {
            return Err(ForgeError::WorkflowInvalid(format!("step '{}' cannot depend on itself", step.id)));
        }
        if !agent_types.contains(&step.agent_type) {
            return Err(ForgeError::WorkflowInvalid(format!(
                "step '{}' references unregistered agent type '{}'",
                step.id, step.agent_type
            )));
        }
        if let Some(condition) = &step.condition {
            crate::condition::parse(condition).map_err(|e| {
                ForgeError::WorkflowInvalid(format!("step '{}' has an invalid condition: {e}", step.id))
            })?;
        }
    }

    if let Some(path) = detect_cycle(&def.steps) {
        return Err(ForgeError::WorkflowCycle { path });
    }

    Ok(topological_order(&def.steps))
}

fn dep_lists_self(step: &Step) -> bool {
    step.depends_on.contains(&step.id) || step.parallel_with.contains(&step.id)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InStack,
    Done,
}

/// DFS cycle detection over the `depends_on` graph (edges point from a
/// step to its prerequisites). Returns the cycle rendered as
/// `a -> b -> c -> a`, starting from the first repeated node.
fn detect_cycle(steps: &[Step]) -> Option<String> {
    let graph: HashMap<&str, &[StepId]> = steps.iter().map(|s| (s.id.as_str(), s.depends_on.as_slice())).collect();
    let mut marks: HashMap<&str, Mark> = steps.iter().map(|s| (s.id.as_str(), Mark::Unvisited)).collect();
    let mut stack: Vec<&str> = Vec::new();

    for step in steps {
        if marks[step.id.as_str()] == Mark::Unvisited {
            if let Some(cycle) = visit(step.id.as_str(), &graph, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a [StepId]>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<String> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::InStack) => {
            let start = stack.iter().position(|&n| n == node).unwrap_or(0);
            let mut path: Vec<&str> = stack[start..].to_vec();
            path.push(node);
            return Some(path.join(" -> "));
        }
        _ => {}
    }

    marks.insert(node, Mark::InStack);
    stack.push(node);
    if let Some(deps) = graph.get(node) {
        for dep in deps.iter() {
            if let Some(cycle) = visit(dep.as_str(), graph, marks, stack) {
                return Some(cycle);
            }
        }
    }
    stack.pop();
    marks.insert(node, Mark::Done);
    None
}

/// Kahn's algorithm over the `depends_on` graph, producing a deterministic
/// order (ties broken by declaration order) for planning.
fn topological_order(steps: &[Step]) -> Vec<StepId> {
    let mut in_degree: HashMap<StepId, usize> = steps.iter().map(|s| (s.id.clone(), s.depends_on.len())).collect();
    let mut dependents: HashMap<StepId, Vec<StepId>> = HashMap::new();
    for step in steps {
        for dep in &step.depends_on {
            dependents.entry(dep.clone()).or_default().push(step.id.clone());
        }
    }

    let mut queue: VecDeque<StepId> = steps.iter().filter(|s| s.depends_on.is_empty()).map(|s| s.id.clone()).collect();
    let mut order = Vec::with_capacity(steps.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        if let Some(deps) = dependents.get(&id) {
            for dependent in deps {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentTypeRegistry {
        let mut reg = AgentTypeRegistry::new();
        forge_runtime::register_builtin_presets(&mut reg).unwrap();
        reg
    }

    fn def(yaml: &str) -> WorkflowDefinition {
        WorkflowDefinition::from_yaml(yaml).unwrap()
    }

    #[test]
    fn validates_and_orders_a_simple_chain() {
        let d = def(
            r#"
name: chain
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
  - id: b
    agent_type: general-purpose
    task_template: t
    depends_on: [a]
  - id: c
    agent_type: general-purpose
    task_template: t
    depends_on: [b]
"#,
        );
        let order = validate(&d, &registry(), 20).unwrap();
        assert_eq!(order, vec![StepId::new("a"), StepId::new("b"), StepId::new("c")]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let d = def(
            r#"
name: dup
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
  - id: a
    agent_type: general-purpose
    task_template: t
"#,
        );
        let err = validate(&d, &registry(), 20).unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[test]
    fn rejects_unresolved_dependency() {
        let d = def(
            r#"
name: dangling
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
    depends_on: [ghost]
"#,
        );
        let err = validate(&d, &registry(), 20).unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[test]
    fn rejects_unregistered_agent_type() {
        let d = def(
            r#"
name: bad-agent
version: "1"
steps:
  - id: a
    agent_type: does-not-exist
    task_template: t
"#,
        );
        let err = validate(&d, &registry(), 20).unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[test]
    fn rejects_malformed_condition() {
        let d = def(
            r#"
name: bad-condition
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
    condition: "=="
"#,
        );
        let err = validate(&d, &registry(), 20).unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[test]
    fn detects_a_cycle_with_the_exact_path() {
        let d = def(
            r#"
name: cyclical
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
    depends_on: [c]
  - id: b
    agent_type: general-purpose
    task_template: t
    depends_on: [a]
  - id: c
    agent_type: general-purpose
    task_template: t
    depends_on: [b]
"#,
        );
        let err = validate(&d, &registry(), 20).unwrap_err();
        match err {
            ForgeError::WorkflowCycle { path } => {
                assert!(path.contains("->"));
                let first = path.split(" -> ").next().unwrap();
                let last = path.split(" -> ").last().unwrap();
                assert_eq!(first, last);
            }
            other => panic!("expected WorkflowCycle, got {other:?}"),
        }
    }

    #[test]
    fn rejects_self_dependency() {
        let d = def(
            r#"
name: self-dep
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
    depends_on: [a]
"#,
        );
        let err = validate(&d, &registry(), 20).unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[test]
    fn enforces_the_step_count_cap() {
        let mut yaml = String::from("name: many\nversion: \"1\"\nsteps:\n");
        for i in 0..25 {
            yaml.push_str(&format!("  - id: s{i}\n    agent_type: general-purpose\n    task_template: t\n"));
        }
        let d = def(&yaml);
        let err = validate(&d, &registry(), 20).unwrap_err();
        assert!(matches!(err, ForgeError::WorkflowInvalid(_)));
    }

    #[test]
    fn independent_steps_can_appear_in_either_order() {
        let d = def(
            r#"
name: fan-out
version: "1"
steps:
  - id: a
    agent_type: general-purpose
    task_template: t
  - id: b
    agent_type: general-purpose
    task_template: t
"#,
        );
        let order = validate(&d, &registry(), 20).unwrap();
        assert_eq!(order.len(), 2);
    }
}
