//! Load-time consistency checks for models and instances.
//!
//! A model can be edited incrementally, so construction does not enforce
//! these invariants; they are checked once, before the model is handed to
//! a validation run.

use std::collections::BTreeSet;

use super::types::{WorkflowInstance, WorkflowModel};
use crate::activity;
use crate::error::{Error, Result};

/// Validate a workflow model before use in a validation run.
///
/// Hard errors:
/// - empty model name
/// - `initial_step_name` missing or not keying into `steps`
/// - a required activity outside the activity registry
///
/// Dangling `next_steps` references are NOT errors: traversal degrades to
/// "no further branching" on them. They are returned as warnings so the
/// `check` command can surface them.
pub fn validate_model(model: &WorkflowModel) -> Result<Vec<String>> {
    if model.name.is_empty() {
        return Err(Error::Model("Workflow model name is required".into()));
    }

    if model.options.initial_step_name.is_empty() {
        return Err(Error::Model(
            "Workflow model has no initial step name".into(),
        ));
    }

    if !model.steps.contains_key(&model.options.initial_step_name) {
        return Err(Error::Model(format!(
            "Initial step '{}' is not a step of the model",
            model.options.initial_step_name
        )));
    }

    let mut warnings = Vec::new();
    // Deterministic warning order
    let names: BTreeSet<&String> = model.steps.keys().collect();

    for name in &names {
        let step = &model.steps[name.as_str()];

        for kind in &step.required_activities {
            activity::require_known(kind)?;
        }

        for next in &step.next_steps {
            if !model.steps.contains_key(next) {
                warnings.push(format!(
                    "Step '{}' lists unknown next step '{}' (branch will not be followed)",
                    name, next
                ));
            }
        }

        if !step.enabled {
            warnings.push(format!(
                "Step '{}' is disabled; the flag is descriptive and the step is still validated",
                name
            ));
        }
    }

    if has_cycle(model) {
        warnings.push(
            "Step graph contains a cycle; no cycle detection is performed during \
             traversal, so runs against it are only bounded by the run timeout"
                .to_string(),
        );
    }

    Ok(warnings)
}

/// Validate a workflow instance against its model.
pub fn validate_instance(model: &WorkflowModel, instance: &WorkflowInstance) -> Result<Vec<String>> {
    if instance.name.is_empty() {
        return Err(Error::Model("Workflow instance name is required".into()));
    }

    if instance.model_name != model.name {
        return Err(Error::Model(format!(
            "Instance '{}' references model '{}', but model '{}' was supplied",
            instance.name, instance.model_name, model.name
        )));
    }

    let mut warnings = Vec::new();
    let mut step_names: Vec<&String> = instance.step_assignments.keys().collect();
    step_names.sort();

    for step_name in step_names {
        if !model.steps.contains_key(step_name) {
            warnings.push(format!(
                "Assignment references unknown step '{}'",
                step_name
            ));
        }
    }

    Ok(warnings)
}

/// DFS cycle check over the step graph, following only resolvable
/// successors.
fn has_cycle(model: &WorkflowModel) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        model: &WorkflowModel,
        name: &str,
        marks: &mut std::collections::HashMap<String, Mark>,
    ) -> bool {
        match marks.get(name) {
            Some(Mark::Visiting) => return true,
            Some(Mark::Done) => return false,
            None => {}
        }
        marks.insert(name.to_string(), Mark::Visiting);
        if let Some(step) = model.steps.get(name) {
            for next in &step.next_steps {
                if model.steps.contains_key(next) && visit(model, next, marks) {
                    return true;
                }
            }
        }
        marks.insert(name.to_string(), Mark::Done);
        false
    }

    let mut marks = std::collections::HashMap::new();
    model
        .steps
        .keys()
        .any(|name| visit(model, name, &mut marks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_instance, parse_model};

    fn model_yaml(initial: &str) -> String {
        format!(
            r#"
name: m
options:
  initial_step_name: {initial}
steps:
  a:
    next_steps: [b]
  b: {{}}
"#
        )
    }

    #[test]
    fn test_valid_model_has_no_warnings() {
        let model = parse_model(&model_yaml("a")).unwrap();
        assert!(validate_model(&model).unwrap().is_empty());
    }

    #[test]
    fn test_initial_step_must_exist() {
        let model = parse_model(&model_yaml("missing")).unwrap();
        let err = validate_model(&model).unwrap_err();
        assert_eq!(err.code(), "MODEL_ERROR");
    }

    #[test]
    fn test_unknown_activity_is_hard_error() {
        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    required_activities: [Spectroscopy]
"#,
        )
        .unwrap();
        let err = validate_model(&model).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_ACTIVITY_KIND");
    }

    #[test]
    fn test_dangling_next_step_is_warning() {
        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [ghost]
"#,
        )
        .unwrap();
        let warnings = validate_model(&model).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ghost"));
    }

    #[test]
    fn test_cycle_is_warned_not_rejected() {
        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [b]
  b:
    next_steps: [a]
"#,
        )
        .unwrap();
        let warnings = validate_model(&model).unwrap();
        assert!(warnings.iter().any(|w| w.contains("cycle")));
    }

    #[test]
    fn test_instance_model_name_must_match() {
        let model = parse_model(&model_yaml("a")).unwrap();
        let instance = parse_instance(
            r#"
name: i
model_name: other
step_assignments: {}
"#,
        )
        .unwrap();
        assert!(validate_instance(&model, &instance).is_err());
    }

    #[test]
    fn test_instance_unknown_step_is_warning() {
        let model = parse_model(&model_yaml("a")).unwrap();
        let instance = parse_instance(
            r#"
name: i
model_name: m
step_assignments:
  ghost: [1]
"#,
        )
        .unwrap();
        let warnings = validate_instance(&model, &instance).unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
