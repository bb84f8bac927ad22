//! Content Validation
//!
//! The field factory records each field's rules on a [`Validator`] while a
//! page type registers its schema. Groups get their own nested scope so a
//! rule registered inside a group never applies to a same-named field
//! elsewhere.

use crate::models::field::{FieldNode, Rule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A single failed rule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("{field} does not allow the value `{value}`")]
    NotAllowed { field: String, value: String },
}

impl ValidationError {
    /// Path of the offending field (`name`, `group.name` or `group[seq].name`)
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }
}

/// Every rule failure found on a content object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl std::error::Error for ContentValidationErrors {}

impl fmt::Display for ContentValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "content is invalid: {}", messages.join("; "))
    }
}

/// Rule set for one validation scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    rules: BTreeMap<String, Vec<Rule>>,
    groups: BTreeMap<String, Validator>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An independent, empty scope derived from this validator
    pub fn scoped(&self) -> Self {
        let mut scope = self.clone();
        scope.reset();
        scope
    }

    pub fn reset(&mut self) {
        self.rules.clear();
        self.groups.clear();
    }

    pub fn add_rules(&mut self, field: &str, rules: &[Rule]) {
        if rules.is_empty() {
            return;
        }
        self.rules
            .entry(field.to_string())
            .or_default()
            .extend(rules.iter().cloned());
    }

    pub fn rules_for(&self, field: &str) -> &[Rule] {
        self.rules.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set_group(&mut self, group: &str, validator: Validator) {
        self.groups.insert(group.to_string(), validator);
    }

    pub fn group(&self, group: &str) -> Option<&Validator> {
        self.groups.get(group)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.groups.values().all(Validator::is_empty)
    }

    /// Check one leaf field against the rules registered for its name
    pub fn check_field(&self, path: &str, field: &FieldNode) -> Vec<ValidationError> {
        match field {
            FieldNode::Field(f) => self.check_values(path, f.name(), f.value().into_iter().collect()),
            FieldNode::Multiple(f) => self.check_values(
                path,
                f.name(),
                f.values().into_iter().map(|(_, v)| v).collect(),
            ),
            FieldNode::Group(_) => Vec::new(),
        }
    }

    /// Check raw values against the rules registered for `name`
    pub fn check_values(&self, path: &str, name: &str, values: Vec<&str>) -> Vec<ValidationError> {
        apply_rules(path, self.rules_for(name), values)
    }
}

fn apply_rules(path: &str, rules: &[Rule], values: Vec<&str>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let present: Vec<&str> = values.into_iter().filter(|v| !v.is_empty()).collect();

    for rule in rules {
        match rule {
            Rule::Required => {
                if present.is_empty() {
                    errors.push(ValidationError::Required {
                        field: path.to_string(),
                    });
                }
            }
            Rule::MaxLength(max) => {
                for value in &present {
                    let actual = value.chars().count();
                    if actual > *max {
                        errors.push(ValidationError::TooLong {
                            field: path.to_string(),
                            max: *max,
                            actual,
                        });
                    }
                }
            }
            Rule::OneOf(allowed) => {
                for value in &present {
                    if !allowed.iter().any(|a| a == value) {
                        errors.push(ValidationError::NotAllowed {
                            field: path.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
    }

    errors
}
