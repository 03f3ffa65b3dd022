//! Data fetch and constraint evaluation.
//!
//! Two phases. The fetch phase collects the distinct objects referenced by
//! the job list and pulls each object's data graph from the store, all
//! fetches in flight concurrently. The evaluation phase runs the
//! constraint engine over every job; evaluations are independent,
//! CPU-bound and side-effect-free, so they are distributed across a
//! worker pool sized to the available CPU parallelism.
//!
//! Result order is not guaranteed to match job order; the aggregate
//! verdict is an unordered AND.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::debug;

use super::planner::ValidationJob;
use crate::error::{Error, Result};
use crate::model::ObjectId;
use crate::shape::ConstraintEngine;
use crate::store::{GraphStore, ObjectGraph};

/// Outcome of one validation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(flatten)]
    pub job: ValidationJob,
    pub conforms: bool,
    pub diagnostic: String,
}

pub struct Evaluator {
    store: Arc<dyn GraphStore>,
    engine: Arc<dyn ConstraintEngine>,
    workers: usize,
}

impl Evaluator {
    pub fn new(store: Arc<dyn GraphStore>, engine: Arc<dyn ConstraintEngine>) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            store,
            engine,
            workers,
        }
    }

    /// Override the evaluation worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Fetch every referenced object's data graph, then evaluate all jobs.
    pub async fn run(&self, jobs: Vec<ValidationJob>) -> Result<Vec<ValidationResult>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let graphs = self.fetch_graphs(&jobs).await?;
        self.evaluate_jobs(jobs, graphs).await
    }

    /// Concurrent, deduplicated fetch: one in-flight request per distinct
    /// object. The phase completes when every fetch has returned.
    async fn fetch_graphs(
        &self,
        jobs: &[ValidationJob],
    ) -> Result<HashMap<ObjectId, Arc<ObjectGraph>>> {
        let objects: BTreeSet<ObjectId> = jobs.iter().map(|j| j.object).collect();
        debug!(objects = objects.len(), "fetching object data graphs");

        let mut join_set = JoinSet::new();
        for object in objects {
            let store = self.store.clone();
            join_set.spawn(async move { (object, store.object_graph(object).await) });
        }

        let mut graphs = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (object, graph) = joined
                .map_err(|e| Error::Internal(format!("fetch task panicked: {}", e)))?;
            graphs.insert(object, Arc::new(graph?));
        }
        Ok(graphs)
    }

    /// Bounded-parallel evaluation: at most `workers` jobs evaluating at a
    /// time, refilled as slots free up.
    async fn evaluate_jobs(
        &self,
        jobs: Vec<ValidationJob>,
        graphs: HashMap<ObjectId, Arc<ObjectGraph>>,
    ) -> Result<Vec<ValidationResult>> {
        debug!(jobs = jobs.len(), workers = self.workers, "evaluating jobs");

        let mut results = Vec::with_capacity(jobs.len());
        let mut pending = jobs.into_iter();
        let mut join_set: JoinSet<Result<ValidationResult>> = JoinSet::new();

        loop {
            while join_set.len() < self.workers {
                let Some(job) = pending.next() else { break };
                let graph = graphs
                    .get(&job.object)
                    .ok_or_else(|| {
                        Error::Internal(format!("no data graph fetched for object {}", job.object))
                    })?
                    .clone();
                let engine = self.engine.clone();

                // Constraint evaluation is CPU-bound; keep it off the
                // async workers.
                join_set.spawn_blocking(move || {
                    let verdict = engine.evaluate(&graph, &job.spec);
                    Ok(ValidationResult {
                        job,
                        conforms: verdict.conforms,
                        diagnostic: verdict.diagnostic,
                    })
                });
            }

            match join_set.join_next().await {
                Some(joined) => {
                    let result = joined
                        .map_err(|e| Error::Internal(format!("evaluation task panicked: {}", e)))??;
                    results.push(result);
                }
                None => break,
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::model::WorkflowModelStep;
    use crate::shape::{ConstraintSpec, ShapeEvaluator};
    use crate::store::{ChainPosition, MemoryStore, ObjectChain};

    fn job(step: WorkflowModelStep, object: u64, position: &str) -> ValidationJob {
        let position = ChainPosition::from(position);
        let spec = ConstraintSpec::build(&step, &position).unwrap();
        ValidationJob {
            step,
            step_name: "s".to_string(),
            object: ObjectId(object),
            position,
            spec,
        }
    }

    fn require_edx() -> WorkflowModelStep {
        WorkflowModelStep {
            required_activities: vec!["EDX".to_string()],
            ..Default::default()
        }
    }

    /// Store wrapper that counts data graph fetches.
    struct CountingStore {
        inner: MemoryStore,
        graph_calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for CountingStore {
        async fn chain(&self, object: ObjectId) -> Result<ObjectChain> {
            self.inner.chain(object).await
        }

        async fn object_graph(&self, object: ObjectId) -> Result<ObjectGraph> {
            self.graph_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.object_graph(object).await
        }
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
        let evaluator = Evaluator::new(store, Arc::new(ShapeEvaluator));
        assert!(evaluator.run(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetches_are_deduplicated() {
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new()
                .with_chain(ObjectId(1), ["p0", "p1"])
                .with_data(ObjectId(1), "p0", [], ["EDX"])
                .with_data(ObjectId(1), "p1", [], ["EDX"]),
            graph_calls: AtomicUsize::new(0),
        });

        let jobs = vec![
            job(require_edx(), 1, "p0"),
            job(require_edx(), 1, "p1"),
            job(require_edx(), 1, "p0"),
        ];

        let evaluator = Evaluator::new(store.clone(), Arc::new(ShapeEvaluator));
        let results = evaluator.run(jobs).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.conforms));
        assert_eq!(store.graph_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mixed_verdicts() {
        let store: Arc<dyn GraphStore> = Arc::new(
            MemoryStore::new()
                .with_chain(ObjectId(1), ["p0", "p1"])
                .with_data(ObjectId(1), "p0", [], ["EDX"])
                .with_data(ObjectId(1), "p1", [], ["XRD"]),
        );

        let jobs = vec![job(require_edx(), 1, "p0"), job(require_edx(), 1, "p1")];
        let evaluator = Evaluator::new(store, Arc::new(ShapeEvaluator)).with_workers(2);
        let results = evaluator.run(jobs).await.unwrap();

        assert_eq!(results.len(), 2);
        let by_position = |p: &str| {
            results
                .iter()
                .find(|r| r.job.position.as_str() == p)
                .unwrap()
        };
        assert!(by_position("p0").conforms);
        assert!(!by_position("p1").conforms);
        assert!(by_position("p1").diagnostic.contains("EDX"));
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_the_run() {
        // Object 2 has no data in the store at all
        let store: Arc<dyn GraphStore> = Arc::new(MemoryStore::new());
        let jobs = vec![job(require_edx(), 2, "p0")];
        let evaluator = Evaluator::new(store, Arc::new(ShapeEvaluator));
        assert!(evaluator.run(jobs).await.is_err());
    }
}
