//! Field Groups
//!
//! A [`Group`] is an ordered, named collection of leaf fields. Groups marked
//! repeatable are wrapped in a [`RepeatableContainer`] on the content
//! object, which hands out sequence-indexed copies of the template group.

use crate::models::field::{FieldError, FieldNode};
use serde::{Deserialize, Serialize};

/// Ordered collection of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    name: String,
    label: Option<String>,
    repeatable: bool,
    fields: Vec<FieldNode>,
}

impl Group {
    pub fn new(name: &str, label: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            label: label.map(str::to_string),
            repeatable: false,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn set_repeatable(&mut self, repeatable: bool) -> &mut Self {
        self.repeatable = repeatable;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Add a leaf field to the group
    ///
    /// Groups cannot nest and field names are unique within a group.
    pub fn add(&mut self, field: impl Into<FieldNode>) -> Result<&mut FieldNode, FieldError> {
        let mut field = field.into();

        match &mut field {
            FieldNode::Group(nested) => {
                return Err(FieldError::NestedGroup {
                    group: self.name.clone(),
                    nested: nested.name().to_string(),
                })
            }
            FieldNode::Field(f) => f.scope_translation_key(&self.name),
            FieldNode::Multiple(f) => f.scope_translation_key(&self.name),
        }

        if self.get(field.name()).is_some() {
            return Err(FieldError::DuplicateField(format!(
                "{}.{}",
                self.name,
                field.name()
            )));
        }

        self.fields.push(field);
        let last = self.fields.len() - 1;
        Ok(&mut self.fields[last])
    }

    /// Builder form of [`Group::add`]
    pub fn with(mut self, field: impl Into<FieldNode>) -> Result<Self, FieldError> {
        self.add(field)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldNode> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Shortcut for the value of a single-value field in this group
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_field()?.value()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear_values(&mut self) {
        for field in &mut self.fields {
            field.clear();
        }
    }

    /// Copy of this group with every value cleared
    pub fn empty_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.clear_values();
        copy
    }
}

/// Sequence-indexed instances of a repeatable group
///
/// Instances are kept dense: asking for sequence `n` creates every missing
/// instance up to `n`, so iteration never skips an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatableContainer {
    template: Group,
    groups: Vec<Group>,
}

impl RepeatableContainer {
    pub fn new(template: Group) -> Self {
        Self {
            template: template.empty_copy(),
            groups: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn template(&self) -> &Group {
        &self.template
    }

    /// Append an empty instance and return it
    pub fn add(&mut self) -> &mut Group {
        self.groups.push(self.template.empty_copy());
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    pub fn get(&self, sequence: usize) -> Option<&Group> {
        self.groups.get(sequence)
    }

    pub fn get_mut(&mut self, sequence: usize) -> Option<&mut Group> {
        self.groups.get_mut(sequence)
    }

    /// Instance at `sequence`, creating empty instances up to it as needed
    pub fn get_or_create(&mut self, sequence: usize) -> &mut Group {
        while self.groups.len() <= sequence {
            self.add();
        }
        &mut self.groups[sequence]
    }

    /// Replace the instance at `sequence`, padding with empty instances
    pub fn set(&mut self, sequence: usize, group: Group) {
        *self.get_or_create(sequence) = group;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> IntoIterator for &'a RepeatableContainer {
    type Item = &'a Group;
    type IntoIter = std::slice::Iter<'a, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
