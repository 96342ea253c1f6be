//! Grading strategies for evaluation sets.
//!
//! Each grader validates its configuration before a set is persisted and
//! translates into a [`Criterion`] the remote service executes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Grader strategy. Unknown names fall back to exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum GraderType {
    #[default]
    ExactMatch,
    Contains,
    Regex,
    JsonSchema,
}

impl GraderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::Contains => "contains",
            Self::Regex => "regex",
            Self::JsonSchema => "json_schema",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "contains" => Self::Contains,
            "regex" => Self::Regex,
            "json_schema" => Self::JsonSchema,
            _ => Self::ExactMatch,
        }
    }
}

impl From<String> for GraderType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl std::fmt::Display for GraderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-neutral testing criterion. Compares the sampled output with the
/// item's `expected_output` unless a pattern is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub kind: CriterionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriterionKind {
    Equals,
    Contains,
    Matches { pattern: String },
}

pub trait Grader: Send + Sync {
    /// Configuration problems; empty when valid.
    fn validate_config(&self, config: &Value) -> Vec<String>;

    fn criterion(&self, config: &Value) -> Criterion;
}

struct ExactMatchGrader;

impl Grader for ExactMatchGrader {
    fn validate_config(&self, _config: &Value) -> Vec<String> {
        Vec::new()
    }

    fn criterion(&self, _config: &Value) -> Criterion {
        Criterion {
            name: "exact_match".into(),
            kind: CriterionKind::Equals,
        }
    }
}

struct ContainsGrader;

impl Grader for ContainsGrader {
    fn validate_config(&self, _config: &Value) -> Vec<String> {
        Vec::new()
    }

    fn criterion(&self, _config: &Value) -> Criterion {
        Criterion {
            name: "contains".into(),
            kind: CriterionKind::Contains,
        }
    }
}

struct RegexGrader;

fn pattern_of(config: &Value) -> &str {
    config.get("pattern").and_then(Value::as_str).unwrap_or("")
}

impl Grader for RegexGrader {
    fn validate_config(&self, config: &Value) -> Vec<String> {
        let pattern = pattern_of(config);
        if pattern.trim().is_empty() {
            return vec!["pattern can't be blank".into()];
        }
        match Regex::new(pattern) {
            Ok(_) => Vec::new(),
            Err(e) => vec![format!("invalid regex pattern: {}", e)],
        }
    }

    fn criterion(&self, config: &Value) -> Criterion {
        Criterion {
            name: "regex".into(),
            kind: CriterionKind::Matches {
                pattern: pattern_of(config).to_string(),
            },
        }
    }
}

/// Validates the schema at save time; executes as exact match.
struct JsonSchemaGrader;

impl Grader for JsonSchemaGrader {
    fn validate_config(&self, config: &Value) -> Vec<String> {
        let Some(schema) = config.get("schema").or(Some(config)).filter(|s| s.is_object())
        else {
            return vec!["schema configuration must be an object".into()];
        };
        if schema.get("type").is_none() {
            return vec!["schema configuration must include a type".into()];
        }
        match jsonschema::validator_for(schema) {
            Ok(_) => Vec::new(),
            Err(e) => vec![format!("invalid json schema: {}", e)],
        }
    }

    fn criterion(&self, _config: &Value) -> Criterion {
        ExactMatchGrader.criterion(&Value::Null)
    }
}

static EXACT_MATCH: ExactMatchGrader = ExactMatchGrader;
static CONTAINS: ContainsGrader = ContainsGrader;
static REGEX: RegexGrader = RegexGrader;
static JSON_SCHEMA: JsonSchemaGrader = JsonSchemaGrader;

pub fn grader_for(grader_type: GraderType) -> &'static dyn Grader {
    match grader_type {
        GraderType::ExactMatch => &EXACT_MATCH,
        GraderType::Contains => &CONTAINS,
        GraderType::Regex => &REGEX,
        GraderType::JsonSchema => &JSON_SCHEMA,
    }
}

/// Rejects a configuration that cannot run under `grader_type`.
pub fn validate_config(grader_type: GraderType, config: &Value) -> Result<(), ValidationError> {
    let errors = grader_for(grader_type).validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::with_messages("grader_config", errors))
    }
}
