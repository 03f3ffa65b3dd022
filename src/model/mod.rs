//! Workflow model and instance definitions, parsing, and validation.
//!
//! A workflow model declares the step graph a hand-off chain must follow;
//! a workflow instance assigns tracked objects to the steps of one model.
//! Both are defined in YAML (or JSON) documents and are read-only once
//! handed to the validation engine.

mod parser;
mod types;
mod validator;

pub use parser::{parse_instance, parse_instance_file, parse_model, parse_model_file};
pub use types::*;
pub use validator::{validate_instance, validate_model};
