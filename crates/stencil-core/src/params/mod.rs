//! Typed parameters backing template placeholders.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

mod cast;
mod sync;
mod validate;

pub use cast::{cast, try_cast, CastWarning};
pub use sync::{plan_sync, SyncPlan};
pub use validate::{validate, validate_all};

lazy_static! {
    static ref PARAM_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    Datetime,
    Date,
    Array,
    Json,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Date => "date",
            Self::Array => "array",
            Self::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "decimal" => Some(Self::Decimal),
            "boolean" => Some(Self::Boolean),
            "datetime" => Some(Self::Datetime),
            "date" => Some(Self::Date),
            "array" => Some(Self::Array),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// JSON-schema primitive used in the remote item schema.
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "number",
            Self::Boolean => "boolean",
            Self::Array | Self::Json => "array",
            Self::String | Self::Datetime | Self::Date => "string",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional constraints checked by [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A declared placeholder with type and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: ValidationRules,
    pub position: u32,
}

impl Parameter {
    /// A required parameter, not yet persisted.
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            id: 0,
            name: name.into(),
            param_type,
            required: true,
            default_value: None,
            description: None,
            rules: ValidationRules::default(),
            position: 0,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }
}

/// Manual edits to a parameter. Survives re-sync because sync never touches
/// parameters whose name is still detected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterEdit {
    pub param_type: Option<ParamType>,
    pub required: Option<bool>,
    pub default_value: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub rules: Option<ValidationRules>,
}

impl ParameterEdit {
    pub fn apply(self, param: &mut Parameter) {
        if let Some(t) = self.param_type {
            param.param_type = t;
        }
        if let Some(r) = self.required {
            param.required = r;
        }
        if let Some(d) = self.default_value {
            param.default_value = d;
        }
        if let Some(d) = self.description {
            param.description = d;
        }
        if let Some(rules) = self.rules {
            param.rules = rules;
        }
    }
}

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn is_valid_name(name: &str) -> bool {
    PARAM_NAME.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_syntax() {
        assert!(is_valid_name("user_name"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("user.name"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn schema_type_mapping() {
        assert_eq!(ParamType::Integer.json_schema_type(), "integer");
        assert_eq!(ParamType::Decimal.json_schema_type(), "number");
        assert_eq!(ParamType::Boolean.json_schema_type(), "boolean");
        assert_eq!(ParamType::Json.json_schema_type(), "array");
        assert_eq!(ParamType::Date.json_schema_type(), "string");
    }

    #[test]
    fn type_names_round_trip_through_parse() {
        for t in [ParamType::Datetime, ParamType::Array, ParamType::Json] {
            assert_eq!(ParamType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ParamType::parse("float"), None);
    }

    #[test]
    fn edit_keeps_untouched_fields() {
        let mut p = Parameter::new("name", ParamType::String);
        ParameterEdit {
            description: Some(Some("Who to greet".into())),
            ..Default::default()
        }
        .apply(&mut p);
        assert_eq!(p.description.as_deref(), Some("Who to greet"));
        assert!(p.required);
    }
}
