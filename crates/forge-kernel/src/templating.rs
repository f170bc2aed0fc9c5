//! Minimal `{{field}}` substitution for binding `runWorkflow`'s `inputs`
//! into a workflow definition's step task templates.
//!
//! `Step::task_template`'s own doc comment notes that substitution is the
//! caller's responsibility; the kernel is that caller. A step's own
//! `inputs` field takes precedence over the run-level `inputs` passed to
//! `runWorkflow`, so a step can pin a field a run-level input would
//! otherwise override.

use serde_json::Value;

/// Render `{{field}}` tokens in `template` against `inputs`, preferring
/// `step_inputs` when both define the same field. A token referencing a
/// missing field, or a non-scalar value, is left untouched.
#[must_use]
pub fn render(template: &str, run_inputs: &Value, step_inputs: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start..].find("}}") else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let field = rest[start + 2..start + end].trim();
        match lookup(field, run_inputs, step_inputs) {
            Some(rendered) => out.push_str(&rendered),
            None => out.push_str(&rest[start..start + end + 2]),
        }
        rest = &rest[start + end + 2..];
    }
    out.push_str(rest);
    out
}

fn lookup(field: &str, run_inputs: &Value, step_inputs: &Value) -> Option<String> {
    step_inputs.get(field).or_else(|| run_inputs.get(field)).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
