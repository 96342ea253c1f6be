//! Casting raw caller values into [`ParamValue`]s.
//!
//! [`try_cast`] is strict. [`cast`] keeps the lenient contract callers rely
//! on: numeric failures become zero, date failures become no value and JSON
//! failures become an empty mapping.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::{ParamType, Parameter};
use crate::value::{is_blank, raw_to_string, ParamValue};

const TRUTHY: [&str; 6] = ["true", "1", "yes", "on", "t", "y"];

/// Strict cast failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot cast {raw:?} to {expected}")]
pub struct CastWarning {
    pub expected: ParamType,
    pub raw: String,
}

/// Lenient cast of a possibly absent raw value.
///
/// Blank input yields the declared default (itself cast) or no value.
pub fn cast(param: &Parameter, raw: Option<&Value>) -> ParamValue {
    match raw {
        Some(v) if !is_blank(v) => cast_lenient(param, v),
        _ => match &param.default_value {
            Some(default) => cast_lenient(param, &Value::String(default.clone())),
            None => ParamValue::Null,
        },
    }
}

fn cast_lenient(param: &Parameter, raw: &Value) -> ParamValue {
    match try_cast(param.param_type, raw) {
        Ok(v) => v,
        Err(warning) => {
            debug!(param = %param.name, %warning, "cast failed, using fallback");
            fallback(param.param_type)
        }
    }
}

fn fallback(param_type: ParamType) -> ParamValue {
    match param_type {
        ParamType::Integer => ParamValue::Integer(0),
        ParamType::Decimal => ParamValue::Decimal(0.0),
        ParamType::Json => ParamValue::Json(Value::Object(Default::default())),
        ParamType::Boolean => ParamValue::Boolean(false),
        ParamType::Array => ParamValue::List(Vec::new()),
        ParamType::String => ParamValue::String(String::new()),
        ParamType::Datetime | ParamType::Date => ParamValue::Null,
    }
}

/// Strict cast of a present value.
pub fn try_cast(param_type: ParamType, raw: &Value) -> Result<ParamValue, CastWarning> {
    let warn = || CastWarning {
        expected: param_type,
        raw: raw_to_string(raw),
    };

    match param_type {
        ParamType::String => Ok(ParamValue::String(raw_to_string(raw))),
        ParamType::Integer => parse_integer(raw).map(ParamValue::Integer).ok_or_else(warn),
        ParamType::Decimal => parse_decimal(raw).map(ParamValue::Decimal).ok_or_else(warn),
        ParamType::Boolean => Ok(ParamValue::Boolean(parse_bool(raw))),
        ParamType::Datetime => parse_datetime(&raw_to_string(raw))
            .map(ParamValue::DateTime)
            .ok_or_else(warn),
        ParamType::Date => parse_date(&raw_to_string(raw))
            .map(ParamValue::Date)
            .ok_or_else(warn),
        ParamType::Array => Ok(ParamValue::List(split_list(raw))),
        ParamType::Json => match raw {
            Value::String(s) => serde_json::from_str(s)
                .map(ParamValue::Json)
                .map_err(|_| warn()),
            other => Ok(ParamValue::Json(other.clone())),
        },
    }
}

fn parse_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn parse_decimal(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn parse_bool(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        other => {
            let s = raw_to_string(other).trim().to_lowercase();
            TRUTHY.contains(&s.as_str())
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    parse_date(s)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

fn split_list(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items.iter().map(raw_to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect(),
        other => vec![raw_to_string(other)],
    }
}
