//! Typed parameter values.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parameter value after casting. `Null` stands for "no value" and renders
/// as the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    List(Vec<String>),
    Json(Value),
}

impl ParamValue {
    /// Untyped conversion for values that have no declared parameter.
    pub fn from_raw(raw: &Value) -> Self {
        match raw {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Decimal(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Json(raw.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view used by min/max validation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// JSON form used when serializing test data for the grading service.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Decimal(d) => Value::from(*d),
            Self::Boolean(b) => Value::Bool(*b),
            Self::DateTime(_) | Self::Date(_) => Value::String(self.to_string()),
            Self::List(items) => Value::from(items.clone()),
            Self::Json(v) => v.clone(),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::List(items) => f.write_str(&items.join(", ")),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Blank in the caller-input sense: null, whitespace-only strings and empty
/// collections.
pub fn is_blank(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// String form of a raw caller value (strings unquoted).
pub fn raw_to_string(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_renders_empty() {
        assert_eq!(ParamValue::Null.to_string(), "");
    }

    #[test]
    fn display_forms() {
        assert_eq!(ParamValue::Decimal(19.5).to_string(), "19.5");
        assert_eq!(
            ParamValue::List(vec!["a".into(), "b".into()]).to_string(),
            "a, b"
        );
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(ParamValue::Date(date).to_string(), "2024-03-01");
        assert_eq!(ParamValue::Json(json!({"a": 1})).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("   ")));
        assert!(is_blank(&json!([])));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
    }

    #[test]
    fn from_raw_keeps_numbers_typed() {
        assert_eq!(ParamValue::from_raw(&json!(3)), ParamValue::Integer(3));
        assert_eq!(ParamValue::from_raw(&json!(1.5)), ParamValue::Decimal(1.5));
        assert_eq!(
            ParamValue::from_raw(&json!("x")),
            ParamValue::String("x".into())
        );
    }
}
