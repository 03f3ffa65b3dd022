//! Constraint specs and their evaluation.
//!
//! A [`ConstraintSpec`] is the self-contained description of what one
//! workflow model step demands of one chain position: which groups may
//! appear, which activity kinds must appear, and whether activities
//! outside the required set are tolerated. Specs carry no references to
//! caches or network state, so they can be handed to any evaluation
//! worker. They also render to a SHACL-style shape document, which is the
//! serialized form carried on results for traceability.
//!
//! Evaluation itself goes through the [`ConstraintEngine`] trait: an
//! opaque, pure, possibly expensive function from (data graph, spec) to a
//! conformance verdict. [`ShapeEvaluator`] is the built-in engine.

use serde::{Deserialize, Serialize};

use crate::activity;
use crate::error::Result;
use crate::model::WorkflowModelStep;
use crate::store::{ChainPosition, ObjectGraph};

/// Self-contained constraint specification for one (step, position) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// The chain position the constraints target.
    pub target: ChainPosition,

    /// Group tags allowed at the target. Empty = unrestricted.
    pub allowed_groups: Vec<String>,

    /// Activity kinds that must each occur at least once at the target.
    pub required_activities: Vec<String>,

    /// When false, the distinct activity count at the target must equal
    /// `required_activities.len()` exactly.
    pub allow_other_activities: bool,
}

impl ConstraintSpec {
    /// Assemble the spec for a step at a chain position.
    ///
    /// Pure (no I/O). Every required activity tag is validated against the
    /// activity registry before a spec is emitted; an unregistered tag is
    /// an `UnknownActivityKind` error.
    pub fn build(step: &WorkflowModelStep, position: &ChainPosition) -> Result<Self> {
        for kind in &step.required_activities {
            activity::require_known(kind)?;
        }

        Ok(Self {
            target: position.clone(),
            allowed_groups: step.allowed_groups.clone(),
            required_activities: step.required_activities.clone(),
            allow_other_activities: step.allow_other_activities,
        })
    }

    /// Render the spec as a SHACL-style shape document.
    ///
    /// Kept on results for traceability; operators can feed it to an
    /// external SHACL engine to reproduce a verdict.
    pub fn to_shape_document(&self) -> String {
        let mut doc = String::from(
            "@prefix sh: <http://www.w3.org/ns/shacl#> .\n\
             @prefix crc: <https://crc1625.mdi.ruhr-uni-bochum.de/> .\n\
             @prefix project: <https://crc1625.mdi.ruhr-uni-bochum.de/project/> .\n\
             @prefix pmdco: <https://w3id.org/pmd/co/> .\n\
             @prefix prov: <http://www.w3.org/ns/prov#> .\n\n\
             crc:HandoverGroupShape\n    a sh:NodeShape ;\n",
        );
        doc.push_str(&format!("    sh:targetNode <{}> ;\n", self.target));

        if !self.allowed_groups.is_empty() {
            let members = self
                .allowed_groups
                .iter()
                .map(|g| format!("project:{}", g))
                .collect::<Vec<_>>()
                .join(" ");
            doc.push_str(&format!(
                "    sh:property [\n        sh:path prov:wasAssociatedWith ;\n        sh:in ( {} ) ;\n    ] ;\n",
                members
            ));
        }

        for kind in &self.required_activities {
            // Registry membership was checked at build time
            let class = activity::class_curie(kind).unwrap_or_else(|_| kind.clone());
            doc.push_str(&format!(
                "    sh:property [\n        sh:path pmdco:subordinateProcess ;\n        sh:qualifiedValueShape [ sh:class {} ] ;\n        sh:qualifiedMinCount 1 ;\n        sh:name \"{}\" ;\n    ] ;\n",
                class, kind
            ));
        }

        if !self.allow_other_activities {
            doc.push_str(&format!(
                "    sh:property [\n        sh:path pmdco:subordinateProcess ;\n        sh:maxCount {} ;\n    ] ;\n",
                self.required_activities.len()
            ));
        }

        doc.push_str(".\n");
        doc
    }
}

/// Outcome of evaluating one spec against one data graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub conforms: bool,
    /// Human-readable diagnostic; "Conforms" when conformant, otherwise
    /// one line per violated constraint.
    pub diagnostic: String,
}

/// Opaque constraint evaluation engine.
///
/// Implementations must be pure with respect to their inputs; evaluation
/// is distributed across CPU workers and may run in any order.
pub trait ConstraintEngine: Send + Sync {
    fn evaluate(&self, graph: &ObjectGraph, spec: &ConstraintSpec) -> Verdict;
}

/// Built-in constraint engine.
#[derive(Debug, Clone, Default)]
pub struct ShapeEvaluator;

impl ConstraintEngine for ShapeEvaluator {
    fn evaluate(&self, graph: &ObjectGraph, spec: &ConstraintSpec) -> Verdict {
        let data = graph.at(&spec.target);
        let mut violations = Vec::new();

        if !spec.allowed_groups.is_empty() {
            for group in &data.groups {
                if !spec.allowed_groups.contains(group) {
                    violations.push(format!(
                        "group '{}' acted at {} but is not among the allowed groups [{}]",
                        group,
                        spec.target,
                        spec.allowed_groups.join(", ")
                    ));
                }
            }
        }

        for kind in &spec.required_activities {
            if !data.activities.iter().any(|a| a == kind) {
                violations.push(format!(
                    "required activity '{}' was not recorded at {}",
                    kind, spec.target
                ));
            }
        }

        if !spec.allow_other_activities
            && data.activities.len() != spec.required_activities.len()
        {
            violations.push(format!(
                "{} distinct activities recorded at {} but exactly {} required activities are allowed",
                data.activities.len(),
                spec.target,
                spec.required_activities.len()
            ));
        }

        if violations.is_empty() {
            Verdict {
                conforms: true,
                diagnostic: "Conforms".to_string(),
            }
        } else {
            Verdict {
                conforms: false,
                diagnostic: violations.join("\n"),
            }
        }
    }
}
