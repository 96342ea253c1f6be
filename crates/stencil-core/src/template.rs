//! Placeholder engine over flat `{{name}}` syntax.
//!
//! Names are identifiers optionally joined by dots (`{{user.name}}`).
//! Whitespace inside the braces is ignored when matching, but the placeholder
//! text reported by [`extract`] is always the whitespace-free form.
//!
//! **Nesting:** matching is textual and stops at the first `}}`. In
//! `{{ {{name}} }}` only the inner `{{name}}` is a placeholder; the outer
//! braces are plain text. A real tokenizer would be needed to support nesting.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::params::ParamType;

lazy_static! {
    /// `{{ ident(.ident)* }}` with optional inner whitespace.
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\}\}")
            .unwrap();

    /// The whitespace-free form, the only one [`substitute`] replaces.
    static ref EXACT_PLACEHOLDER: Regex =
        Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\}\}").unwrap();
}

/// A placeholder detected in template content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub name: String,
    /// Canonical `{{name}}` text.
    pub placeholder: String,
    pub inferred_type: ParamType,
}

/// Distinct placeholders in first-occurrence order.
pub fn extract(content: &str) -> Vec<Placeholder> {
    let mut seen = HashSet::new();
    PLACEHOLDER
        .captures_iter(content)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            if !seen.insert(name.to_string()) {
                return None;
            }
            Some(Placeholder {
                name: name.to_string(),
                placeholder: placeholder_text(name),
                inferred_type: infer_type(name),
            })
        })
        .collect()
}

/// Replaces every exact `{{key}}` with the value's string form.
///
/// Only the whitespace-free form is replaced; placeholders without a matching
/// key are left untouched. Replacement is a single pass over `content`, so
/// substituted values are never scanned for placeholders.
pub fn substitute<I, K, V>(content: &str, values: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let values: HashMap<String, String> = values
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.to_string()))
        .collect();
    EXACT_PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Rewrites placeholders into the grading service's item syntax,
/// `{{name}}` becoming `{{ item.name }}`.
pub fn to_remote_template(content: &str) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| {
            format!("{{{{ item.{} }}}}", &caps[1])
        })
        .into_owned()
}

/// Name-based type heuristic, used when no explicit type is declared.
pub fn infer_type(name: &str) -> ParamType {
    const INTEGER_SUFFIXES: [&str; 5] = ["_id", "_count", "_number", "_qty", "_quantity"];
    const DATETIME_SUFFIXES: [&str; 3] = ["_at", "_date", "_time"];
    const DECIMAL_SUFFIXES: [&str; 4] = ["_price", "_amount", "_cost", "_total"];
    const BOOLEAN_PREFIXES: [&str; 4] = ["is_", "has_", "can_", "should_"];
    const ARRAY_SUFFIXES: [&str; 3] = ["_list", "_array", "_items"];

    if INTEGER_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        ParamType::Integer
    } else if DATETIME_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        ParamType::Datetime
    } else if DECIMAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        ParamType::Decimal
    } else if BOOLEAN_PREFIXES.iter().any(|p| name.starts_with(p)) {
        ParamType::Boolean
    } else if ARRAY_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        ParamType::Array
    } else {
        ParamType::String
    }
}

fn placeholder_text(name: &str) -> String {
    format!("{{{{{}}}}}", name)
}
