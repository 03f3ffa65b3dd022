//! chainward - hand-off chain workflow validation engine
//!
//! chainward checks whether the chain of hand-off events recorded for a
//! tracked object (a materials library or sample passed between groups)
//! complies with a declared workflow model: a branching graph of required
//! steps, each constraining which organizational groups may act on the
//! object and which characterization activities must (or must not) occur.
//!
//! Models and instances are YAML documents; the recorded chains live in an
//! external SPARQL-speaking graph store. A validation run plans one
//! constraint-check job per reachable (step, object, chain position)
//! triple, fetches every referenced object's data graph concurrently, and
//! evaluates all jobs in parallel.
//!
//! ## Example
//!
//! ```yaml
//! # model.yaml
//! name: sputter-then-characterize
//! options:
//!   initial_step_name: deposition
//! steps:
//!   deposition:
//!     allowed_groups: [A02]
//!     next_steps: [characterization]
//!   characterization:
//!     required_activities: [EDX, XRD]
//!     allow_other_activities: false
//! ```
//!
//! ```yaml
//! # instance.yaml
//! name: batch-2024-03
//! model_name: sputter-then-characterize
//! step_assignments:
//!   deposition: [1201]
//!   characterization: [1201]
//! ```

pub mod activity;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod resolver;
pub mod shape;
pub mod store;

pub use engine::{ValidationReport, ValidationResult, Validator};
pub use error::{Error, Result};
