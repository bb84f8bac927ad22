//! Page Types
//!
//! A page type is a named schema: it registers the fields and groups a page
//! of that type exposes onto a [`FieldFactory`]. Types are either written as
//! Rust implementations of [`PageType`] or declared as data through a
//! [`PageTypeDefinition`].
//!
//! ## Example definition
//!
//! ```json
//! {
//!   "name": "product",
//!   "display_name": "Product",
//!   "fields": [
//!     { "name": "price", "type": "text", "required": true },
//!     { "name": "body", "type": "richtext", "engine": "markdown" },
//!     {
//!       "name": "images",
//!       "type": "group",
//!       "repeatable": true,
//!       "fields": [
//!         { "name": "image", "type": "file", "allowed_types": ["jpg", "png"] },
//!         { "name": "caption", "type": "text", "max_length": 120 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::models::field::{FieldError, FieldNode, Rule};
use crate::services::field_factory::{FieldFactory, FieldGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Field type id that declares a group in a [`FieldDefinition`]
pub const GROUP_FIELD_TYPE: &str = "group";

/// A named content schema
///
/// Loaded pages each hold their own clone of their type, so implementations
/// may keep per-instance state.
pub trait PageType: Debug + Send + Sync {
    /// Identifier stored on the page row
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    fn description(&self) -> &str {
        ""
    }

    /// Register this type's fields and groups on the factory
    fn register_fields(&self, factory: &mut FieldFactory) -> Result<(), FieldError>;

    fn box_clone(&self) -> Box<dyn PageType>;
}

impl Clone for Box<dyn PageType> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Page types by lower-cased name
#[derive(Debug, Clone, Default)]
pub struct PageTypeRegistry {
    types: BTreeMap<String, Box<dyn PageType>>,
}

impl PageTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, page_type: Box<dyn PageType>) -> Result<(), FieldError> {
        let key = page_type.name().to_lowercase();
        if key.is_empty() || self.types.contains_key(&key) {
            return Err(FieldError::InvalidTypeRegistration(
                page_type.name().to_string(),
            ));
        }
        self.types.insert(key, page_type);
        Ok(())
    }

    pub fn with(mut self, page_type: impl PageType + 'static) -> Result<Self, FieldError> {
        self.register(Box::new(page_type))?;
        Ok(self)
    }

    /// A fresh clone of the type registered under `name`
    pub fn get(&self, name: &str) -> Option<Box<dyn PageType>> {
        self.types.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Declarative page type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTypeDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Declarative field or group
///
/// A definition with type `group` declares a group; its `fields` are the
/// group members and `repeatable` makes it a repeatable group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_key: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_types: Vec<String>,

    #[serde(default)]
    pub repeatable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDefinition>,
}

impl FieldDefinition {
    pub fn new(field_type: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            ..Self::default()
        }
    }

    pub fn is_group(&self) -> bool {
        self.field_type.eq_ignore_ascii_case(GROUP_FIELD_TYPE)
    }

    fn rules(&self) -> Vec<Rule> {
        let mut rules = Vec::new();
        if self.required {
            rules.push(Rule::Required);
        }
        if let Some(max) = self.max_length {
            rules.push(Rule::MaxLength(max));
        }
        if let Some(allowed) = &self.one_of {
            rules.push(Rule::OneOf(allowed.clone()));
        }
        rules
    }

    /// Apply the optional settings of this definition to a created field
    fn configure(&self, node: &mut FieldNode) -> Result<(), FieldError> {
        for rule in self.rules() {
            node.add_rule(rule)?;
        }
        if let Some(key) = &self.help_key {
            node.set_help_key(key)?;
        }
        if let Some(engine) = &self.engine {
            node.set_engine(engine)?;
        }
        if !self.allowed_types.is_empty() {
            node.set_allowed_types(self.allowed_types.clone())?;
        }
        Ok(())
    }
}

/// A [`PageType`] backed by a [`PageTypeDefinition`]
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedPageType {
    definition: PageTypeDefinition,
}

impl DefinedPageType {
    pub fn new(definition: PageTypeDefinition) -> Self {
        Self { definition }
    }

    /// A type with no fields
    pub fn named(name: &str) -> Self {
        Self::new(PageTypeDefinition {
            name: name.to_string(),
            display_name: None,
            description: None,
            fields: Vec::new(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn definition(&self) -> &PageTypeDefinition {
        &self.definition
    }
}

impl PageType for DefinedPageType {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn display_name(&self) -> &str {
        self.definition
            .display_name
            .as_deref()
            .unwrap_or(&self.definition.name)
    }

    fn description(&self) -> &str {
        self.definition.description.as_deref().unwrap_or_default()
    }

    fn register_fields(&self, factory: &mut FieldFactory) -> Result<(), FieldError> {
        for def in &self.definition.fields {
            if def.is_group() {
                let mut group: FieldGroup = factory.get_group(&def.name, def.label.as_deref());
                group.set_repeatable(def.repeatable);
                for member in &def.fields {
                    if member.is_group() {
                        return Err(FieldError::NestedGroup {
                            group: def.name.clone(),
                            nested: member.name.clone(),
                        });
                    }
                    let node =
                        group.add_field(&member.field_type, &member.name, member.label.as_deref())?;
                    member.configure(node)?;
                }
                factory.add_group(group)?;
            } else {
                let node = factory.add_field(&def.field_type, &def.name, def.label.as_deref())?;
                def.configure(node)?;
            }
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn PageType> {
        Box::new(self.clone())
    }
}
