//! Diffing detected placeholders against declared parameters.

use std::collections::HashSet;

use tracing::debug;

use super::{is_valid_name, Parameter};
use crate::template::Placeholder;

/// Mutations needed to mirror placeholders. Empty when already in sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// New parameters, positions already assigned.
    pub create: Vec<Parameter>,
    /// Names of parameters to delete.
    pub remove: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.remove.is_empty()
    }
}

/// Plans a sync: detected-only names become required parameters of the
/// inferred type appended after the current maximum position; declared-only
/// names are removed.
///
/// Dotted placeholder names (`{{user.name}}`) are not valid parameter names
/// and never produce a parameter.
pub fn plan_sync(detected: &[Placeholder], declared: &[Parameter]) -> SyncPlan {
    let declared_names: HashSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
    let detected_names: HashSet<&str> = detected.iter().map(|p| p.name.as_str()).collect();

    let mut next_position = declared.iter().map(|p| p.position).max().unwrap_or(0) + 1;
    let mut create = Vec::new();
    for placeholder in detected {
        if declared_names.contains(placeholder.name.as_str()) {
            continue;
        }
        if !is_valid_name(&placeholder.name) {
            debug!(name = %placeholder.name, "skipping placeholder with non-identifier name");
            continue;
        }
        let mut param = Parameter::new(placeholder.name.clone(), placeholder.inferred_type);
        param.position = next_position;
        next_position += 1;
        create.push(param);
    }

    let remove = declared
        .iter()
        .filter(|p| !detected_names.contains(p.name.as_str()))
        .map(|p| p.name.clone())
        .collect();

    SyncPlan { create, remove }
}
