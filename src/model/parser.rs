//! YAML parsers for workflow model and instance documents.

use std::path::Path;

use super::types::{WorkflowInstance, WorkflowModel};
use crate::error::{Error, Result};

/// Parse a workflow model from a YAML string.
pub fn parse_model(yaml: &str) -> Result<WorkflowModel> {
    if yaml.trim().is_empty() {
        return Err(Error::Parse("Empty workflow model definition".to_string()));
    }

    serde_yaml::from_str(yaml).map_err(|e| map_yaml_error("model", e))
}

/// Parse a workflow model from a file path.
pub fn parse_model_file(path: &Path) -> Result<WorkflowModel> {
    let content = std::fs::read_to_string(path)?;
    parse_model(&content)
}

/// Parse a workflow instance from a YAML string.
pub fn parse_instance(yaml: &str) -> Result<WorkflowInstance> {
    if yaml.trim().is_empty() {
        return Err(Error::Parse(
            "Empty workflow instance definition".to_string(),
        ));
    }

    serde_yaml::from_str(yaml).map_err(|e| map_yaml_error("instance", e))
}

/// Parse a workflow instance from a file path.
pub fn parse_instance_file(path: &Path) -> Result<WorkflowInstance> {
    let content = std::fs::read_to_string(path)?;
    parse_instance(&content)
}

fn map_yaml_error(what: &str, e: serde_yaml::Error) -> Error {
    let msg = e.to_string();
    if let Some(field) = extract_missing_field(&msg) {
        Error::Parse(format!("Missing required {} field: {}", what, field))
    } else {
        Error::Parse(format!("Invalid {} YAML: {}", what, msg))
    }
}

fn extract_missing_field(error_message: &str) -> Option<&str> {
    let marker = "missing field `";
    let start = error_message.find(marker)? + marker.len();
    let rest = &error_message[start..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}
