//! Content Field Model
//!
//! A page type's schema is built from fields:
//!
//! - [`Field`] holds a single string value
//! - [`MultipleValueField`] holds named sub-values addressed by the fixed
//!   value keys its type declares (e.g. `name` / `value`)
//! - [`Group`](crate::models::Group) is an ordered, named collection of fields,
//!   optionally repeatable
//!
//! [`FieldNode`] is the tagged union the field factory hands out. Values are
//! always stored as strings; typed accessors (`as_bool`, `as_date`,
//! `render_html`) interpret them on the way out.

use crate::models::group::Group;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix for generated translation keys
pub const TRANSLATION_KEY_PREFIX: &str = "ms.cms.field";

/// Schema configuration errors
///
/// These indicate a page-type definition bug and are raised while the
/// schema is being built, never while content is being loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("A field with the name `{0}` already exists on the field factory")]
    DuplicateField(String),

    #[error("Field type `{0}` does not exist")]
    UnknownFieldType(String),

    #[error("Field type `{0}` is already registered")]
    InvalidTypeRegistration(String),

    #[error("Group `{group}` cannot contain the nested group `{nested}`")]
    NestedGroup { group: String, nested: String },

    #[error("Rich text engine `{0}` does not exist")]
    UnknownEngine(String),

    #[error("Option `{option}` is not supported by field `{field}`")]
    UnsupportedOption { field: String, option: String },
}

/// Declarative validation rule attached to a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "arg", rename_all = "snake_case")]
pub enum Rule {
    /// A non-empty value must be present
    Required,
    /// Value may not exceed this many characters
    MaxLength(usize),
    /// Value must be one of the listed strings (empty values pass)
    OneOf(Vec<String>),
}

/// Rendering engine for rich text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RichTextEngine {
    Markdown,
}

impl FromStr for RichTextEngine {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" => Ok(Self::Markdown),
            other => Err(FieldError::UnknownEngine(other.to_string())),
        }
    }
}

/// A field holding one string value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    field_type: String,
    label: Option<String>,
    translation_key: String,
    help_key: Option<String>,
    value: Option<String>,
    rules: Vec<Rule>,
    engine: Option<RichTextEngine>,
    allowed_types: Vec<String>,
}

impl Field {
    pub fn new(field_type: &str, name: &str, label: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            label: label.map(str::to_string),
            translation_key: format!("{}.{}", TRANSLATION_KEY_PREFIX, name),
            help_key: None,
            value: None,
            rules: Vec::new(),
            engine: None,
            allowed_types: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// Label, falling back to the field name
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn translation_key(&self) -> &str {
        &self.translation_key
    }

    pub fn help_key(&self) -> Option<&str> {
        self.help_key.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn with_help_key(mut self, key: impl Into<String>) -> Self {
        self.help_key = Some(key.into());
        self
    }

    pub fn set_help_key(&mut self, key: impl Into<String>) {
        self.help_key = Some(key.into());
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn required(self) -> Self {
        self.with_rule(Rule::Required)
    }

    /// Builder form of [`Field::set_engine`]
    pub fn with_engine(mut self, engine: &str) -> Result<Self, FieldError> {
        self.set_engine(engine)?;
        Ok(self)
    }

    /// Select the rendering engine of a rich text field
    ///
    /// Fails for unknown engines and for fields that are not rich text.
    pub fn set_engine(&mut self, engine: &str) -> Result<(), FieldError> {
        if self.engine.is_none() {
            return Err(unsupported(&self.name, "engine"));
        }
        self.engine = Some(engine.parse()?);
        Ok(())
    }

    pub fn engine(&self) -> Option<RichTextEngine> {
        self.engine
    }

    pub(crate) fn enable_engine(mut self, engine: RichTextEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Restrict the file types a file field accepts
    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the file types of a file field in place
    pub fn set_allowed_types(&mut self, types: Vec<String>) -> Result<(), FieldError> {
        if self.field_type != "file" {
            return Err(unsupported(&self.name, "allowed_types"));
        }
        self.allowed_types = types;
        Ok(())
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Interpret the value as a boolean (`1`, `true`, `yes`, `on`)
    pub fn as_bool(&self) -> bool {
        matches!(
            self.value.as_deref().map(str::trim).map(str::to_lowercase).as_deref(),
            Some("1") | Some("true") | Some("yes") | Some("on")
        )
    }

    /// Interpret the value as a timestamp (unix seconds or RFC 3339)
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.value.as_deref()?.trim();
        if let Ok(secs) = raw.parse::<i64>() {
            return DateTime::from_timestamp(secs, 0);
        }
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Render a rich text value to HTML
    ///
    /// Returns `None` for fields without a rendering engine.
    pub fn render_html(&self) -> Option<String> {
        match self.engine? {
            RichTextEngine::Markdown => {
                let source = self.value.as_deref().unwrap_or_default();
                let parser = pulldown_cmark::Parser::new(source);
                let mut html = String::new();
                pulldown_cmark::html::push_html(&mut html, parser);
                Some(html)
            }
        }
    }

    pub(crate) fn scope_translation_key(&mut self, group: &str) {
        self.translation_key = format!("{}.{}.{}", TRANSLATION_KEY_PREFIX, group, self.name);
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.as_deref().unwrap_or_default())
    }
}

/// A field holding several named sub-values
///
/// The value keys are fixed by the field type; setting a key the type does
/// not declare is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleValueField {
    name: String,
    field_type: String,
    label: Option<String>,
    translation_key: String,
    help_key: Option<String>,
    values: Vec<(String, Option<String>)>,
    rules: Vec<Rule>,
}

impl MultipleValueField {
    pub fn new(field_type: &str, name: &str, label: Option<&str>, value_keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            label: label.map(str::to_string),
            translation_key: format!("{}.{}", TRANSLATION_KEY_PREFIX, name),
            help_key: None,
            values: value_keys.iter().map(|k| (k.to_string(), None)).collect(),
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn translation_key(&self) -> &str {
        &self.translation_key
    }

    pub fn help_key(&self) -> Option<&str> {
        self.help_key.as_deref()
    }

    pub fn with_help_key(mut self, key: impl Into<String>) -> Self {
        self.help_key = Some(key.into());
        self
    }

    pub fn set_help_key(&mut self, key: impl Into<String>) {
        self.help_key = Some(key.into());
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn required(self) -> Self {
        self.with_rule(Rule::Required)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Value keys declared by this field's type, in declaration order
    pub fn value_keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    /// Set one sub-value; returns false when `key` is not a declared value key
    pub fn set_value(&mut self, key: &str, value: impl Into<String>) -> bool {
        match self.values.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => {
                *slot = Some(value.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// All sub-values that are set, keyed by value key
    pub fn values(&self) -> Vec<(&str, &str)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
            .collect()
    }

    /// True when no sub-value holds a non-empty string
    pub fn is_empty(&self) -> bool {
        self.values
            .iter()
            .all(|(_, v)| v.as_deref().map_or(true, str::is_empty))
    }

    pub fn clear_values(&mut self) {
        for (_, v) in &mut self.values {
            *v = None;
        }
    }

    pub(crate) fn scope_translation_key(&mut self, group: &str) {
        self.translation_key = format!("{}.{}.{}", TRANSLATION_KEY_PREFIX, group, self.name);
    }
}

/// A schema entry: single field, multi-value field, or group of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldNode {
    Field(Field),
    Multiple(MultipleValueField),
    Group(Group),
}

impl FieldNode {
    pub fn name(&self) -> &str {
        match self {
            FieldNode::Field(f) => f.name(),
            FieldNode::Multiple(f) => f.name(),
            FieldNode::Group(g) => g.name(),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, FieldNode::Group(_))
    }

    /// Store a persisted value on a leaf field
    ///
    /// Multi-value fields are addressed by `data_name`; single fields ignore
    /// it. Returns false when nothing was set (groups, undeclared keys).
    pub fn set_stored_value(&mut self, data_name: &str, value: &str) -> bool {
        match self {
            FieldNode::Field(f) => {
                f.set_value(value);
                true
            }
            FieldNode::Multiple(f) => f.set_value(data_name, value),
            FieldNode::Group(_) => false,
        }
    }

    /// Validation rules of a leaf field; groups carry none of their own
    pub fn rules(&self) -> &[Rule] {
        match self {
            FieldNode::Field(f) => f.rules(),
            FieldNode::Multiple(f) => f.rules(),
            FieldNode::Group(_) => &[],
        }
    }

    pub fn add_rule(&mut self, rule: Rule) -> Result<(), FieldError> {
        match self {
            FieldNode::Field(f) => f.add_rule(rule),
            FieldNode::Multiple(f) => f.add_rule(rule),
            FieldNode::Group(g) => return Err(unsupported(g.name(), "rules")),
        }
        Ok(())
    }

    pub fn set_help_key(&mut self, key: &str) -> Result<(), FieldError> {
        match self {
            FieldNode::Field(f) => f.set_help_key(key),
            FieldNode::Multiple(f) => f.set_help_key(key),
            FieldNode::Group(g) => return Err(unsupported(g.name(), "help_key")),
        }
        Ok(())
    }

    pub fn set_engine(&mut self, engine: &str) -> Result<(), FieldError> {
        match self {
            FieldNode::Field(f) => f.set_engine(engine),
            other => Err(unsupported(other.name(), "engine")),
        }
    }

    pub fn set_allowed_types(&mut self, types: Vec<String>) -> Result<(), FieldError> {
        match self {
            FieldNode::Field(f) => f.set_allowed_types(types),
            other => Err(unsupported(other.name(), "allowed_types")),
        }
    }

    /// Reset every value held by this node
    pub fn clear(&mut self) {
        match self {
            FieldNode::Field(f) => f.clear_value(),
            FieldNode::Multiple(f) => f.clear_values(),
            FieldNode::Group(g) => g.clear_values(),
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            FieldNode::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&MultipleValueField> {
        match self {
            FieldNode::Multiple(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            FieldNode::Group(g) => Some(g),
            _ => None,
        }
    }
}

fn unsupported(field: &str, option: &str) -> FieldError {
    FieldError::UnsupportedOption {
        field: field.to_string(),
        option: option.to_string(),
    }
}

impl From<Field> for FieldNode {
    fn from(field: Field) -> Self {
        FieldNode::Field(field)
    }
}

impl From<MultipleValueField> for FieldNode {
    fn from(field: MultipleValueField) -> Self {
        FieldNode::Multiple(field)
    }
}

impl From<Group> for FieldNode {
    fn from(group: Group) -> Self {
        FieldNode::Group(group)
    }
}
