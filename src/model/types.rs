//! Workflow model type definitions.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a tracked object (a materials library or sample).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete workflow model.
///
/// Models are identified by name, unique per creator. The step graph is a
/// name-keyed map; `options.initial_step_name` names the entry step.
///
/// # Example YAML
///
/// ```yaml
/// name: sputter-then-characterize
/// options:
///   initial_step_name: deposition
/// steps:
///   deposition:
///     description: Library created by the deposition group
///     allowed_groups: [A02]
///     next_steps: [characterization]
///   characterization:
///     required_activities: [EDX, XRD]
///     allow_other_activities: false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowModel {
    /// Unique model name (used as identifier)
    pub name: String,

    /// Options that apply to the whole model
    #[serde(default)]
    pub options: WorkflowModelOptions,

    /// Step name -> step definition
    #[serde(default)]
    pub steps: HashMap<String, WorkflowModelStep>,
}

impl WorkflowModel {
    /// Look up the initial step, if the options name one that exists.
    pub fn initial_step(&self) -> Option<(&str, &WorkflowModelStep)> {
        let name = self.options.initial_step_name.as_str();
        self.steps.get(name).map(|step| (name, step))
    }
}

/// General options for a workflow model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowModelOptions {
    /// Whether non-compliant intermediate hand-off groups are tolerated on
    /// an otherwise valid chain. Carried as declared model data; attaches
    /// no traversal semantics.
    #[serde(default = "default_true")]
    pub allow_intermediate_groups: bool,

    /// Step name validation begins from. Must key into `steps` by the time
    /// the model is used for a validation run.
    #[serde(default)]
    pub initial_step_name: String,
}

impl Default for WorkflowModelOptions {
    fn default() -> Self {
        Self {
            allow_intermediate_groups: true,
            initial_step_name: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A step of a workflow model: the restrictions one hand-off group in the
/// chain must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowModelStep {
    /// Descriptive only. A disabled step is still traversed and validated;
    /// no skip semantics are attached to this flag.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Names of the steps that follow this one. Every successor is an
    /// independent branch that is also validated. No loop checking.
    #[serde(default)]
    pub next_steps: BTreeSet<String>,

    #[serde(default)]
    pub description: String,

    /// Organizational groups allowed to act at this step ("A01", "B03",
    /// ...). Empty means unrestricted.
    #[serde(default)]
    pub allowed_groups: Vec<String>,

    /// Activity kinds that must be present at this step's chain position.
    /// Each tag must exist in the activity registry.
    #[serde(default)]
    pub required_activities: Vec<String>,

    /// Whether activities outside `required_activities` are tolerated at
    /// this step. If false, the distinct activity count must equal the
    /// required count exactly.
    #[serde(default = "default_true")]
    pub allow_other_activities: bool,
}

impl Default for WorkflowModelStep {
    fn default() -> Self {
        Self {
            enabled: true,
            next_steps: BTreeSet::new(),
            description: String::new(),
            allowed_groups: Vec::new(),
            required_activities: Vec::new(),
            allow_other_activities: true,
        }
    }
}

/// A workflow instance: the assignment of tracked objects to the steps of
/// one model.
///
/// # Example YAML
///
/// ```yaml
/// name: batch-2024-03
/// model_name: sputter-then-characterize
/// step_assignments:
///   deposition: [1201]
///   characterization: [1201, 1305]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique instance name
    pub name: String,

    /// Name of the model this instance assigns objects to. The caller must
    /// supply matching model/instance pairs; the reference is not resolved
    /// here.
    pub model_name: String,

    /// Step name -> objects assigned to that step. The same object may
    /// appear under several steps.
    #[serde(default)]
    pub step_assignments: HashMap<String, Vec<ObjectId>>,
}

impl WorkflowInstance {
    /// Objects assigned to a step, empty for unknown step names.
    pub fn assigned(&self, step_name: &str) -> &[ObjectId] {
        self.step_assignments
            .get(step_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
