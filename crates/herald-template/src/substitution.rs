// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{variable}}` placeholder substitution.

use std::collections::HashMap;
use std::sync::LazyLock;

use herald_core::types::ContactVariables;
use regex::{Captures, Regex};
use serde_json::Value;

/// A `{{key}}` placeholder. Keys may not contain braces.
pub(crate) static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

/// Replace every placeholder whose key matches a variable, ignoring case.
///
/// Null values render as the empty string. Placeholders with no matching
/// variable are left untouched. Substituted values are not re-scanned.
pub fn substitute(template: &str, variables: &ContactVariables) -> String {
    if variables.is_empty() {
        return template.to_string();
    }
    let lookup: HashMap<String, &Value> = variables
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect();

    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            match lookup.get(&caps[1].to_lowercase()) {
                Some(value) => value_text(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
