// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping imported rows onto contacts.
//!
//! A row is an ordered list of `(header, value)` pairs. With a column mapping,
//! each mapped header becomes a variable under its target name; the targets
//! `phone` and `ignore` are special. Without one, every column except the phone
//! columns becomes a variable under its own header.

use std::collections::BTreeMap;

use herald_core::NewContact;
use herald_core::types::ContactVariables;
use serde::{Deserialize, Serialize};

/// Mapping target that selects the phone column.
pub const PHONE_TARGET: &str = "phone";

/// Mapping target that drops a column.
pub const IGNORE_TARGET: &str = "ignore";

/// Headers that hold the phone when no mapping names one.
const PHONE_HEADERS: [&str; 2] = ["phone", "numero"];

/// One imported row with columns in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    columns: Vec<(String, String)>,
}

impl ImportRow {
    pub fn new(columns: Vec<(String, String)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }
}

impl<H: Into<String>, V: Into<String>> FromIterator<(H, V)> for ImportRow {
    fn from_iter<I: IntoIterator<Item = (H, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(h, v)| (h.into(), v.into())).collect())
    }
}

/// Header to variable-name mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, header: impl Into<String>, target: impl Into<String>) {
        self.0.insert(header.into(), target.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn phone_header(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, target)| target.as_str() == PHONE_TARGET)
            .map(|(header, _)| header.as_str())
    }
}

impl<H: Into<String>, T: Into<String>> FromIterator<(H, T)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (H, T)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(h, t)| (h.into(), t.into())).collect())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Phone of a row: the mapped phone column if any, else `phone`, `numero`,
/// or the first column. Blank values fall through to the next candidate.
fn phone_of(row: &ImportRow, mapping: Option<&ColumnMapping>) -> String {
    let mapped = mapping
        .and_then(ColumnMapping::phone_header)
        .and_then(|header| non_empty(row.get(header)));
    mapped
        .or_else(|| PHONE_HEADERS.iter().find_map(|h| non_empty(row.get(h))))
        .or_else(|| non_empty(row.columns.first().map(|(_, v)| v.as_str())))
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn variables_of(row: &ImportRow, mapping: Option<&ColumnMapping>) -> ContactVariables {
    let mut variables = ContactVariables::new();
    match mapping {
        Some(mapping) => {
            for (header, target) in &mapping.0 {
                if target == PHONE_TARGET || target == IGNORE_TARGET {
                    continue;
                }
                let value = row
                    .get(header)
                    .map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.to_string()));
                variables.insert(target.clone(), value);
            }
        }
        None => {
            for (header, value) in &row.columns {
                if PHONE_HEADERS.contains(&header.as_str()) {
                    continue;
                }
                variables.insert(header.clone(), serde_json::Value::String(value.clone()));
            }
        }
    }
    variables
}

/// Turn imported rows into contacts. Every row yields exactly one contact;
/// a row without any usable phone gets an empty phone and fails later.
pub fn map_rows(rows: &[ImportRow], mapping: Option<&ColumnMapping>) -> Vec<NewContact> {
    let mapping = mapping.filter(|m| !m.is_empty());
    rows.iter()
        .map(|row| NewContact {
            phone: phone_of(row, mapping),
            variables: variables_of(row, mapping),
        })
        .collect()
}
