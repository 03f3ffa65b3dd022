//! Validation engine: planner, evaluator, and the orchestrating
//! [`Validator`].

mod evaluator;
mod planner;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::model::{validate_instance, validate_model, WorkflowInstance, WorkflowModel};
use crate::resolver::ChainResolver;
use crate::shape::{ConstraintEngine, ShapeEvaluator};
use crate::store::GraphStore;

pub use evaluator::{Evaluator, ValidationResult};
pub use planner::{plan_jobs, ValidationJob};

/// Full outcome of a validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// AND over every job's conformance; vacuously true with no jobs.
    pub valid: bool,
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    /// The non-conformant results, for operators locating which hand-off
    /// violated which rule.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.conforms)
    }
}

/// Validation orchestrator.
///
/// Composes the resolver, planner and evaluator into the single
/// `is_valid` / `validate` operations. The orchestrator itself has no
/// internal timeout; callers that need a hard deadline (the HTTP API, the
/// CLI) use [`Validator::validate_with_deadline`].
pub struct Validator {
    store: Arc<dyn GraphStore>,
    engine: Arc<dyn ConstraintEngine>,
    workers: Option<usize>,
}

impl Validator {
    /// Create a validator using the built-in shape evaluator.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            engine: Arc::new(ShapeEvaluator),
            workers: None,
        }
    }

    /// Swap in a different constraint engine.
    pub fn with_engine(mut self, engine: Arc<dyn ConstraintEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Override the evaluation worker count (default: CPU parallelism).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Plan the validation jobs without evaluating them.
    pub async fn plan(
        &self,
        model: &WorkflowModel,
        instance: &WorkflowInstance,
    ) -> Result<Vec<ValidationJob>> {
        self.check_inputs(model, instance)?;
        let resolver = ChainResolver::new(self.store.as_ref());
        plan_jobs(model, instance, &resolver).await
    }

    /// Run a full validation and return the per-job results.
    #[instrument(skip_all, fields(model = %model.name, instance = %instance.name))]
    pub async fn validate(
        &self,
        model: &WorkflowModel,
        instance: &WorkflowInstance,
    ) -> Result<ValidationReport> {
        let jobs = self.plan(model, instance).await?;

        let mut evaluator = Evaluator::new(self.store.clone(), self.engine.clone());
        if let Some(workers) = self.workers {
            evaluator = evaluator.with_workers(workers);
        }
        let results = evaluator.run(jobs).await?;

        let valid = results.iter().all(|r| r.conforms);
        info!(
            valid,
            jobs = results.len(),
            failures = results.iter().filter(|r| !r.conforms).count(),
            "validation run complete"
        );
        Ok(ValidationReport { valid, results })
    }

    /// Collapse a validation run to a single boolean.
    pub async fn is_valid(
        &self,
        model: &WorkflowModel,
        instance: &WorkflowInstance,
    ) -> Result<bool> {
        Ok(self.validate(model, instance).await?.valid)
    }

    /// Run a full validation under a hard wall-clock deadline.
    ///
    /// The traversal has no cycle detection, so a pathological model can
    /// run forever; this boundary drops the run when the deadline passes
    /// and reports a distinguishable `VALIDATION_TIMEOUT` instead of a
    /// false verdict.
    pub async fn validate_with_deadline(
        &self,
        model: &WorkflowModel,
        instance: &WorkflowInstance,
        deadline: Duration,
    ) -> Result<ValidationReport> {
        tokio::time::timeout(deadline, self.validate(model, instance))
            .await
            .map_err(|_| Error::ValidationTimedOut(deadline.as_secs()))?
    }

    /// Model/instance consistency checks; warnings are logged, hard
    /// violations abort the run.
    fn check_inputs(&self, model: &WorkflowModel, instance: &WorkflowInstance) -> Result<()> {
        for warning in validate_model(model)? {
            warn!(model = %model.name, "{}", warning);
        }
        for warning in validate_instance(model, instance)? {
            warn!(instance = %instance.name, "{}", warning);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_instance, parse_model, ObjectId};
    use crate::store::MemoryStore;

    fn validator(store: MemoryStore) -> Validator {
        Validator::new(Arc::new(store)).with_workers(2)
    }

    #[tokio::test]
    async fn test_empty_instance_is_vacuously_valid() {
        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: a
steps:
  a: {}
"#,
        )
        .unwrap();
        let instance =
            parse_instance("name: i\nmodel_name: m\nstep_assignments: {}").unwrap();

        let report = validator(MemoryStore::new())
            .validate(&model, &instance)
            .await
            .unwrap();
        assert!(report.valid);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_single_step_pass_and_fail_flips() {
        let model_yaml = |groups: &str, acts: &str, allow_other: bool| {
            format!(
                r#"
name: m
options:
  initial_step_name: a
steps:
  a:
    allowed_groups: {groups}
    required_activities: {acts}
    allow_other_activities: {allow_other}
"#
            )
        };
        let instance =
            parse_instance("name: i\nmodel_name: m\nstep_assignments:\n  a: [1]").unwrap();
        let store = || {
            MemoryStore::new()
                .with_chain(ObjectId(1), ["p0"])
                .with_data(ObjectId(1), "p0", ["A01"], ["EDX"])
        };

        // Satisfied on every axis
        let model = parse_model(&model_yaml("[A01]", "[EDX]", false)).unwrap();
        assert!(validator(store()).is_valid(&model, &instance).await.unwrap());

        // Group violated
        let model = parse_model(&model_yaml("[B02]", "[EDX]", false)).unwrap();
        assert!(!validator(store()).is_valid(&model, &instance).await.unwrap());

        // Required activity violated
        let model = parse_model(&model_yaml("[A01]", "[XRD]", true)).unwrap();
        assert!(!validator(store()).is_valid(&model, &instance).await.unwrap());

        // Activity count violated (EDX recorded, none required, closed)
        let model = parse_model(&model_yaml("[A01]", "[]", false)).unwrap();
        assert!(!validator(store()).is_valid(&model, &instance).await.unwrap());
    }

    #[tokio::test]
    async fn test_concrete_two_step_scenario() {
        // Model A -> B; obj1 assigned to both; chain p0 -> p1. Step A
        // requires EDX at p0 (recorded), step B allows only group X01 at
        // p1 (a different group acted). Two jobs, one failure, overall
        // false.
        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: A
steps:
  A:
    required_activities: [EDX]
    next_steps: [B]
  B:
    allowed_groups: [X01]
"#,
        )
        .unwrap();
        let instance = parse_instance(
            "name: i\nmodel_name: m\nstep_assignments:\n  A: [1]\n  B: [1]",
        )
        .unwrap();
        let store = MemoryStore::new()
            .with_chain(ObjectId(1), ["p0", "p1"])
            .with_data(ObjectId(1), "p0", ["A01"], ["EDX"])
            .with_data(ObjectId(1), "p1", ["B03"], []);

        let report = validator(store).validate(&model, &instance).await.unwrap();
        assert_eq!(report.results.len(), 2);
        assert!(!report.valid);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].job.step_name, "B");
        assert_eq!(failures[0].job.object, ObjectId(1));
        assert_eq!(failures[0].job.position.as_str(), "p1");
        assert!(failures[0].diagnostic.contains("B03"));
    }

    #[tokio::test]
    async fn test_deadline_reports_timeout() {
        struct StallingStore(MemoryStore);

        #[async_trait::async_trait]
        impl crate::store::GraphStore for StallingStore {
            async fn chain(
                &self,
                object: ObjectId,
            ) -> crate::error::Result<crate::store::ObjectChain> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                self.0.chain(object).await
            }

            async fn object_graph(
                &self,
                object: ObjectId,
            ) -> crate::error::Result<crate::store::ObjectGraph> {
                self.0.object_graph(object).await
            }
        }

        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: a
steps:
  a: {}
"#,
        )
        .unwrap();
        let instance =
            parse_instance("name: i\nmodel_name: m\nstep_assignments:\n  a: [1]").unwrap();

        let validator = Validator::new(Arc::new(StallingStore(
            MemoryStore::new().with_chain(ObjectId(1), ["p0"]),
        )));
        let err = validator
            .validate_with_deadline(&model, &instance, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_TIMEOUT");
    }

    #[tokio::test]
    async fn test_model_errors_abort_before_planning() {
        let model = parse_model(
            r#"
name: m
options:
  initial_step_name: ghost
steps:
  a: {}
"#,
        )
        .unwrap();
        let instance =
            parse_instance("name: i\nmodel_name: m\nstep_assignments: {}").unwrap();
        let err = validator(MemoryStore::new())
            .is_valid(&model, &instance)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_ERROR");
    }
}
