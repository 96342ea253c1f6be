use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use super::{cast, Parameter};
use crate::value::{is_blank, raw_to_string};

/// Human-readable rule violations for one raw value; empty when valid.
///
/// Rules are skipped for blank input. A blank value only fails when the
/// parameter is required and has no default to fall back on.
pub fn validate(param: &Parameter, raw: Option<&Value>) -> Vec<String> {
    let mut errors = Vec::new();

    let raw = match raw {
        Some(v) if !is_blank(v) => v,
        _ => {
            if param.required && param.default_value.is_none() {
                errors.push(format!("{} is required", param.name));
            }
            return errors;
        }
    };

    let rules = &param.rules;
    let text = raw_to_string(raw);
    let len = text.chars().count();

    if let Some(min) = rules.min_length {
        if len < min {
            errors.push(format!(
                "{} is too short (minimum is {} characters)",
                param.name, min
            ));
        }
    }
    if let Some(max) = rules.max_length {
        if len > max {
            errors.push(format!(
                "{} is too long (maximum is {} characters)",
                param.name, max
            ));
        }
    }
    if let Some(pattern) = rules.pattern.as_deref() {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(&text) => {
                errors.push(format!("{} does not match pattern {}", param.name, pattern));
            }
            Ok(_) => {}
            Err(_) => {
                errors.push(format!("{} has an invalid pattern {}", param.name, pattern));
            }
        }
    }

    if rules.min.is_some() || rules.max.is_some() {
        if let Some(n) = cast(param, Some(raw)).as_f64() {
            if let Some(min) = rules.min {
                if n < min {
                    errors.push(format!(
                        "{} must be greater than or equal to {}",
                        param.name, min
                    ));
                }
            }
            if let Some(max) = rules.max {
                if n > max {
                    errors.push(format!(
                        "{} must be less than or equal to {}",
                        param.name, max
                    ));
                }
            }
        }
    }

    errors
}

/// Validates every declared parameter against the supplied values, in
/// parameter order.
pub fn validate_all(params: &[Parameter], values: &BTreeMap<String, Value>) -> Vec<String> {
    params
        .iter()
        .flat_map(|p| validate(p, values.get(&p.name)))
        .collect()
}
