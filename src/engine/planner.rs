//! Validation job planner.
//!
//! Walks the step graph of a workflow model together with the object
//! assignments of an instance and each object's recorded hand-off chain,
//! expanding the combination into a flat list of validation jobs: one per
//! reachable (step, object, chain position) triple.
//!
//! The traversal uses an explicit LIFO work stack instead of recursion so
//! that depth is bounded by heap and the frame order stays inspectable.
//! There is NO cycle detection: a cyclic step graph is only terminated by
//! the duplicate-frame guard on newly-introduced objects and, ultimately,
//! by the hard run deadline at the invocation boundary. `validate_model`
//! warns about cyclic models up front.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::{ObjectId, WorkflowInstance, WorkflowModel, WorkflowModelStep};
use crate::resolver::ChainResolver;
use crate::shape::ConstraintSpec;
use crate::store::ChainPosition;

/// One unit of validation work: check one step's constraints against one
/// chain position of one object. Ephemeral; identity is the
/// (step name, object, position) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationJob {
    /// The step being validated (carried for traceability).
    pub step: WorkflowModelStep,
    pub step_name: String,
    pub object: ObjectId,
    pub position: ChainPosition,
    pub spec: ConstraintSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Frame {
    step_name: String,
    object: ObjectId,
    position: ChainPosition,
}

/// Expand `(model, instance)` into the full validation job list.
///
/// Chain lookups go through the resolver and are memoized per object;
/// the traversal itself is sequential.
pub async fn plan_jobs(
    model: &WorkflowModel,
    instance: &WorkflowInstance,
    resolver: &ChainResolver<'_>,
) -> Result<Vec<ValidationJob>> {
    let (initial_name, _) = model.initial_step().ok_or_else(|| {
        Error::Model(format!(
            "Initial step '{}' is not a step of model '{}'",
            model.options.initial_step_name, model.name
        ))
    })?;

    let mut stack: Vec<Frame> = Vec::new();
    // Every frame ever pushed, stacked or already turned into a job. Only
    // consulted when a branch introduces a new object; an object
    // continuing its own chain always advances its position.
    let mut seen: HashSet<Frame> = HashSet::new();
    let mut jobs: Vec<ValidationJob> = Vec::new();

    // Seed: every object assigned to the initial step enters at the first
    // position of its own chain.
    for &object in instance.assigned(initial_name) {
        let position = resolver.first_position(object).await?;
        let frame = Frame {
            step_name: initial_name.to_string(),
            object,
            position,
        };
        seen.insert(frame.clone());
        stack.push(frame);
    }

    while let Some(frame) = stack.pop() {
        let step = match model.steps.get(&frame.step_name) {
            Some(step) => step,
            None => continue,
        };

        trace!(
            step = %frame.step_name,
            object = frame.object.0,
            position = %frame.position,
            "planning job"
        );

        jobs.push(ValidationJob {
            step: step.clone(),
            step_name: frame.step_name.clone(),
            object: frame.object,
            position: frame.position.clone(),
            spec: ConstraintSpec::build(step, &frame.position)?,
        });

        // Every successor step is an independent branch; all of them are
        // validated, not just the first.
        for next_name in &step.next_steps {
            if !model.steps.contains_key(next_name) {
                // Dangling reference degrades to "no further branching"
                continue;
            }

            let current_assigned = instance.assigned(&frame.step_name);

            for &candidate in instance.assigned(next_name) {
                if candidate == frame.object {
                    // The same object continues its own chain. If the
                    // chain ran out before the steps did, the branch
                    // terminates silently: an incomplete trace yields no
                    // further obligations.
                    let chain = resolver.successor_map(frame.object).await?;
                    match chain.next(&frame.position) {
                        Some(next_position) => {
                            let next = Frame {
                                step_name: next_name.clone(),
                                object: frame.object,
                                position: next_position.clone(),
                            };
                            seen.insert(next.clone());
                            stack.push(next);
                        }
                        None => {
                            debug!(
                                object = frame.object.0,
                                step = %next_name,
                                "chain exhausted before step graph; branch ends"
                            );
                        }
                    }
                } else if !current_assigned.contains(&candidate) {
                    // A genuinely new object introduced at the next step:
                    // it enters at its own first position. Guard against
                    // re-pushing a frame that is already stacked or was
                    // already turned into a job.
                    let position = resolver.first_position(candidate).await?;
                    let next = Frame {
                        step_name: next_name.clone(),
                        object: candidate,
                        position,
                    };
                    if seen.insert(next.clone()) {
                        stack.push(next);
                    }
                }
            }
        }
    }

    debug!(jobs = jobs.len(), "planning complete");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_instance, parse_model};
    use crate::store::MemoryStore;

    async fn plan(
        model_yaml: &str,
        instance_yaml: &str,
        store: &MemoryStore,
    ) -> Result<Vec<ValidationJob>> {
        let model = parse_model(model_yaml).unwrap();
        let instance = parse_instance(instance_yaml).unwrap();
        let resolver = ChainResolver::new(store);
        plan_jobs(&model, &instance, &resolver).await
    }

    fn keys(jobs: &[ValidationJob]) -> Vec<(String, u64, String)> {
        jobs.iter()
            .map(|j| (j.step_name.clone(), j.object.0, j.position.0.clone()))
            .collect()
    }

    const LINEAR_MODEL: &str = r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [b]
  b: {}
"#;

    #[tokio::test]
    async fn test_empty_assignments_yield_no_jobs() {
        let store = MemoryStore::new();
        let jobs = plan(
            LINEAR_MODEL,
            "name: i\nmodel_name: m\nstep_assignments: {}",
            &store,
        )
        .await
        .unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_same_object_walks_its_chain() {
        let store = MemoryStore::new().with_chain(ObjectId(1), ["p0", "p1"]);
        let jobs = plan(
            LINEAR_MODEL,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [1]",
            &store,
        )
        .await
        .unwrap();
        assert_eq!(
            keys(&jobs),
            vec![
                ("a".to_string(), 1, "p0".to_string()),
                ("b".to_string(), 1, "p1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_chain_exhaustion_terminates_branch_silently() {
        // One-position chain, two-step model: step b yields no job.
        let store = MemoryStore::new().with_chain(ObjectId(1), ["p0"]);
        let jobs = plan(
            LINEAR_MODEL,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [1]",
            &store,
        )
        .await
        .unwrap();
        assert_eq!(keys(&jobs), vec![("a".to_string(), 1, "p0".to_string())]);
    }

    #[tokio::test]
    async fn test_branch_fan_out_covers_all_successors() {
        // a has two successors, each with its own object: both branches
        // must produce jobs, not just the first successor.
        let model = r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [b, c]
  b: {}
  c: {}
"#;
        let store = MemoryStore::new()
            .with_chain(ObjectId(1), ["p0", "p1"])
            .with_chain(ObjectId(2), ["q0"])
            .with_chain(ObjectId(3), ["r0"]);
        let jobs = plan(
            model,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [2]\n  c: [3]",
            &store,
        )
        .await
        .unwrap();

        let keys = keys(&jobs);
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&("b".to_string(), 2, "q0".to_string())));
        assert!(keys.contains(&("c".to_string(), 3, "r0".to_string())));
    }

    #[tokio::test]
    async fn test_new_object_enters_at_first_position() {
        let store = MemoryStore::new()
            .with_chain(ObjectId(1), ["p0", "p1"])
            .with_chain(ObjectId(2), ["q0", "q1"]);
        let jobs = plan(
            LINEAR_MODEL,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [1, 2]",
            &store,
        )
        .await
        .unwrap();

        let keys = keys(&jobs);
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&("b".to_string(), 1, "p1".to_string())));
        assert!(keys.contains(&("b".to_string(), 2, "q0".to_string())));
    }

    #[tokio::test]
    async fn test_object_assigned_to_both_steps_is_not_treated_as_new() {
        // Object 2 sits on both a and b: from a's perspective it is not a
        // newly-introduced object for b, it continues its own chain.
        let store = MemoryStore::new()
            .with_chain(ObjectId(1), ["p0", "p1"])
            .with_chain(ObjectId(2), ["q0", "q1"]);
        let jobs = plan(
            LINEAR_MODEL,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1, 2]\n  b: [1, 2]",
            &store,
        )
        .await
        .unwrap();

        let keys = keys(&jobs);
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&("a".to_string(), 1, "p0".to_string())));
        assert!(keys.contains(&("a".to_string(), 2, "q0".to_string())));
        assert!(keys.contains(&("b".to_string(), 1, "p1".to_string())));
        assert!(keys.contains(&("b".to_string(), 2, "q1".to_string())));
    }

    #[tokio::test]
    async fn test_duplicate_frames_are_suppressed() {
        // Two branches reconverge on step d, which introduces object 2:
        // the (d, 2, q0) frame must be planned exactly once.
        let model = r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [b, c]
  b:
    next_steps: [d]
  c:
    next_steps: [d]
  d: {}
"#;
        let store = MemoryStore::new()
            .with_chain(ObjectId(1), ["p0", "p1", "p2"])
            .with_chain(ObjectId(2), ["q0"]);
        let jobs = plan(
            model,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [1]\n  c: [1]\n  d: [2]",
            &store,
        )
        .await
        .unwrap();

        let d_jobs: Vec<_> = keys(&jobs)
            .into_iter()
            .filter(|(step, _, _)| step == "d")
            .collect();
        assert_eq!(d_jobs, vec![("d".to_string(), 2, "q0".to_string())]);
    }

    #[tokio::test]
    async fn test_dangling_next_step_ends_branch() {
        let model = r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [ghost]
"#;
        let store = MemoryStore::new().with_chain(ObjectId(1), ["p0", "p1"]);
        let jobs = plan(
            model,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  ghost: [1]",
            &store,
        )
        .await
        .unwrap();
        assert_eq!(keys(&jobs), vec![("a".to_string(), 1, "p0".to_string())]);
    }

    #[tokio::test]
    async fn test_missing_initial_step_is_an_error() {
        let model = r#"
name: m
options:
  initial_step_name: zz
steps:
  a: {}
"#;
        let store = MemoryStore::new();
        let err = plan(model, "name: i\nmodel_name: m\nstep_assignments: {}", &store)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_ERROR");
    }

    #[tokio::test]
    async fn test_no_chain_for_seed_object_propagates() {
        let store = MemoryStore::new();
        let err = plan(
            LINEAR_MODEL,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [5]",
            &store,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "NO_CHAIN_FOUND");
    }

    #[tokio::test]
    async fn test_planning_is_idempotent() {
        let store = MemoryStore::new()
            .with_chain(ObjectId(1), ["p0", "p1"])
            .with_chain(ObjectId(2), ["q0"]);
        let instance = "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [1, 2]";

        let first = plan(LINEAR_MODEL, instance, &store).await.unwrap();
        let second = plan(LINEAR_MODEL, instance, &store).await.unwrap();
        assert_eq!(keys(&first), keys(&second));
    }

    #[tokio::test]
    async fn test_cyclic_model_with_finite_chain_terminates() {
        // a -> b -> a with one object: each revisit consumes a successor,
        // so the finite chain bounds the traversal.
        let model = r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    next_steps: [b]
  b:
    next_steps: [a]
"#;
        let store = MemoryStore::new().with_chain(ObjectId(1), ["p0", "p1", "p2"]);
        let jobs = plan(
            model,
            "name: i\nmodel_name: m\nstep_assignments:\n  a: [1]\n  b: [1]",
            &store,
        )
        .await
        .unwrap();
        assert_eq!(
            keys(&jobs),
            vec![
                ("a".to_string(), 1, "p0".to_string()),
                ("b".to_string(), 1, "p1".to_string()),
                ("a".to_string(), 1, "p2".to_string()),
            ]
        );
    }
}
