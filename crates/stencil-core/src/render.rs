//! Rendering a document or version with caller values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::{ModelSettings, TrackedFields};
use crate::params::{cast, validate_all, Parameter};
use crate::template::substitute;
use crate::value::ParamValue;

/// Validation failures at render time. No partial output is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", messages.join(", "))]
pub struct RenderError {
    pub messages: Vec<String>,
}

/// Caller overrides applied on top of the version's settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderOverrides {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedOutput {
    pub content: String,
    pub instructions: Option<String>,
    pub settings: ModelSettings,
    /// Cast values used for substitution.
    pub values: BTreeMap<String, ParamValue>,
    pub version_number: u32,
}

/// Validates `values` against `params`, then substitutes the cast values.
///
/// Keys with no declared parameter are substituted as given.
pub fn render(
    tracked: &TrackedFields,
    version_number: u32,
    params: &[Parameter],
    values: &BTreeMap<String, Value>,
    overrides: &RenderOverrides,
) -> Result<RenderedOutput, RenderError> {
    let messages = validate_all(params, values);
    if !messages.is_empty() {
        debug!(version_number, errors = messages.len(), "render validation failed");
        return Err(RenderError { messages });
    }

    let mut cast_values: BTreeMap<String, ParamValue> = values
        .iter()
        .map(|(k, v)| (k.clone(), ParamValue::from_raw(v)))
        .collect();
    for param in params {
        cast_values.insert(param.name.clone(), cast(param, values.get(&param.name)));
    }

    let content = substitute(&tracked.content, cast_values.iter());
    let settings = ModelSettings {
        model: overrides
            .model
            .clone()
            .unwrap_or_else(|| tracked.settings.model.clone()),
        temperature: overrides.temperature.or(tracked.settings.temperature),
        max_tokens: overrides.max_tokens.or(tracked.settings.max_tokens),
    };
    let instructions = overrides
        .instructions
        .clone()
        .or_else(|| tracked.instructions.clone());

    Ok(RenderedOutput {
        content,
        instructions,
        settings,
        values: cast_values,
        version_number,
    })
}
