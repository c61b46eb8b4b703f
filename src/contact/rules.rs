use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::ValidationMessages;
use crate::util::{char_len, fill, is_email, is_phone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Email,
    Phone,
}

/// Declarative constraint for one named form field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldRule {
    pub fn new(name: &str, required: bool, kind: FieldKind) -> Self {
        FieldRule {
            name: name.to_string(),
            required,
            min: None,
            max: None,
            kind,
        }
    }

    pub fn text(name: &str, required: bool, min: Option<usize>, max: Option<usize>) -> Self {
        FieldRule {
            name: name.to_string(),
            required,
            min,
            max,
            kind: FieldKind::Text,
        }
    }

    /// Check a trimmed value. Empty values only fail when required; otherwise
    /// shape, then min length, then max length are evaluated and the last
    /// failing check supplies the message.
    pub fn check(&self, value: &str, messages: &ValidationMessages) -> Option<String> {
        if value.is_empty() {
            return self.required.then(|| messages.required.clone());
        }

        let mut error = match self.kind {
            FieldKind::Email if !is_email(value) => Some(messages.email.clone()),
            FieldKind::Phone if !is_phone(value) => Some(messages.phone.clone()),
            _ => None,
        };

        let len = char_len(value);
        if let Some(min) = self.min {
            if len < min {
                error = Some(fill(&messages.min_length, &[("min", min.to_string().as_str())]));
            }
        }
        if let Some(max) = self.max {
            if len > max {
                error = Some(fill(&messages.max_length, &[("max", max.to_string().as_str())]));
            }
        }
        error
    }
}

/// Trimmed field values captured in one pass at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    values: BTreeMap<String, String>,
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, raw: &str) {
        self.values.insert(name.to_string(), raw.trim().to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Empty string for fields the form does not have.
    pub fn get(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Field name to error message; a missing key means the field is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Validate every rule whose field is present in the snapshot. Rules naming
/// fields the form does not have are skipped.
pub fn validate(rules: &[FieldRule], snapshot: &FormSnapshot, messages: &ValidationMessages) -> ValidationResult {
    let mut result = ValidationResult::default();
    for rule in rules {
        if !snapshot.contains(&rule.name) {
            continue;
        }
        if let Some(msg) = rule.check(snapshot.get(&rule.name), messages) {
            result.errors.insert(rule.name.clone(), msg);
        }
    }
    result
}
