//! Field Type Registry
//!
//! Maps a field type id (`text`, `richtext`, `link`, ...) to the constructor
//! that builds a fresh [`FieldNode`] of that type. The registry is validated
//! at registration time: an id can only be registered once.

use crate::models::field::{Field, FieldError, FieldNode, MultipleValueField, RichTextEngine};
use std::collections::BTreeMap;
use std::fmt;

/// Constructor for a field type: `(name, label) -> FieldNode`
pub type FieldConstructor = fn(&str, Option<&str>) -> FieldNode;

/// Built-in field type ids
pub const BUILTIN_FIELD_TYPES: [&str; 7] = [
    "text",
    "richtext",
    "date",
    "file",
    "boolean",
    "link",
    "productoption",
];

#[derive(Clone)]
pub struct FieldTypeRegistry {
    constructors: BTreeMap<String, FieldConstructor>,
}

impl fmt::Debug for FieldTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

impl FieldTypeRegistry {
    /// Registry with no types registered
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with the built-in field types
    pub fn new() -> Self {
        let mut registry = Self::empty();
        let builtins: [(&str, FieldConstructor); 7] = [
            ("text", |name, label| Field::new("text", name, label).into()),
            ("richtext", |name, label| {
                Field::new("richtext", name, label)
                    .enable_engine(RichTextEngine::Markdown)
                    .into()
            }),
            ("date", |name, label| Field::new("date", name, label).into()),
            ("file", |name, label| Field::new("file", name, label).into()),
            ("boolean", |name, label| {
                Field::new("boolean", name, label).into()
            }),
            ("link", |name, label| {
                MultipleValueField::new("link", name, label, &["scope", "target"]).into()
            }),
            ("productoption", |name, label| {
                MultipleValueField::new("productoption", name, label, &["name", "value"]).into()
            }),
        ];

        for (id, constructor) in builtins {
            registry.constructors.insert(id.to_string(), constructor);
        }
        registry
    }

    /// Register a custom field type
    ///
    /// Type ids are case-insensitive.
    pub fn register(&mut self, id: &str, constructor: FieldConstructor) -> Result<(), FieldError> {
        let key = id.to_lowercase();
        if key.is_empty() || self.constructors.contains_key(&key) {
            return Err(FieldError::InvalidTypeRegistration(id.to_string()));
        }
        self.constructors.insert(key, constructor);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(&id.to_lowercase())
    }

    /// Instantiate a field of type `id`
    pub fn create(&self, id: &str, name: &str, label: Option<&str>) -> Result<FieldNode, FieldError> {
        let constructor = self
            .constructors
            .get(&id.to_lowercase())
            .ok_or_else(|| FieldError::UnknownFieldType(id.to_string()))?;
        Ok(constructor(name, label))
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
