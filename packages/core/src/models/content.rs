//! Page Content
//!
//! [`Content`] is the resolved content of one page: an ordered mapping from
//! field name to a [`ContentSlot`]. It is rebuilt from the page type's schema
//! and the stored rows on every load and is never shared between pages.

use crate::models::field::{Field, FieldNode, MultipleValueField};
use crate::models::group::{Group, RepeatableContainer};
use crate::models::validation::{ContentValidationErrors, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// One named entry of a content object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSlot {
    Field(Field),
    Multiple(MultipleValueField),
    Group(Group),
    Repeatable(RepeatableContainer),
}

impl ContentSlot {
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            ContentSlot::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&MultipleValueField> {
        match self {
            ContentSlot::Multiple(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            ContentSlot::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            ContentSlot::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_repeatable(&self) -> Option<&RepeatableContainer> {
        match self {
            ContentSlot::Repeatable(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_repeatable_mut(&mut self) -> Option<&mut RepeatableContainer> {
        match self {
            ContentSlot::Repeatable(r) => Some(r),
            _ => None,
        }
    }
}

impl From<FieldNode> for ContentSlot {
    /// Seed a slot from a schema entry; repeatable groups get a container
    fn from(node: FieldNode) -> Self {
        match node {
            FieldNode::Field(f) => ContentSlot::Field(f),
            FieldNode::Multiple(f) => ContentSlot::Multiple(f),
            FieldNode::Group(g) if g.is_repeatable() => {
                ContentSlot::Repeatable(RepeatableContainer::new(g))
            }
            FieldNode::Group(g) => ContentSlot::Group(g),
        }
    }
}

impl From<Field> for ContentSlot {
    fn from(field: Field) -> Self {
        ContentSlot::Field(field)
    }
}

impl From<MultipleValueField> for ContentSlot {
    fn from(field: MultipleValueField) -> Self {
        ContentSlot::Multiple(field)
    }
}

/// Resolved content of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    page_type: String,
    slots: Vec<(String, ContentSlot)>,
    #[serde(skip)]
    validator: Validator,
}

impl Content {
    pub fn new(page_type: &str, validator: Validator) -> Self {
        Self {
            page_type: page_type.to_string(),
            slots: Vec::new(),
            validator,
        }
    }

    /// Name of the page type whose schema built this content
    pub fn page_type(&self) -> &str {
        &self.page_type
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Insert or replace the slot called `name`
    pub fn insert(&mut self, name: &str, slot: ContentSlot) {
        match self.slots.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = slot,
            None => self.slots.push((name.to_string(), slot)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContentSlot> {
        self.slots.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ContentSlot> {
        self.slots
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Value of a single-value field, if the field exists and is set
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_field()?.value()
    }

    /// Set a value on a top-level field
    ///
    /// Returns false (and changes nothing) when no field of that name exists
    /// or the slot is a group.
    pub fn set_value(&mut self, name: &str, data_name: &str, value: &str) -> bool {
        match self.get_mut(name) {
            Some(ContentSlot::Field(f)) => {
                f.set_value(value);
                true
            }
            Some(ContentSlot::Multiple(f)) => f.set_value(data_name, value),
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentSlot)> {
        self.slots.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check every field against the validator built with the schema
    pub fn validate(&self) -> Result<(), ContentValidationErrors> {
        let mut errors: Vec<ValidationError> = Vec::new();

        for (name, slot) in &self.slots {
            match slot {
                ContentSlot::Field(f) => errors.extend(self.validator.check_values(
                    name,
                    f.name(),
                    f.value().into_iter().collect(),
                )),
                ContentSlot::Multiple(f) => errors.extend(self.validator.check_values(
                    name,
                    f.name(),
                    f.values().into_iter().map(|(_, v)| v).collect(),
                )),
                ContentSlot::Group(group) => {
                    if let Some(scope) = self.validator.group(name) {
                        errors.extend(check_group(scope, name, group));
                    }
                }
                ContentSlot::Repeatable(container) => {
                    if let Some(scope) = self.validator.group(name) {
                        for (sequence, group) in container.iter().enumerate() {
                            let path = format!("{}[{}]", name, sequence);
                            errors.extend(check_group(scope, &path, group));
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ContentValidationErrors { errors })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

fn check_group(scope: &Validator, path: &str, group: &Group) -> Vec<ValidationError> {
    group
        .fields()
        .flat_map(|field| scope.check_field(&format!("{}.{}", path, field.name()), field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::Rule;

    fn sample_content() -> Content {
        let mut validator = Validator::new();
        validator.add_rules("title", &[Rule::Required]);
        let mut images = validator.scoped();
        images.add_rules("caption", &[Rule::MaxLength(4)]);
        validator.set_group("images", images);

        let mut content = Content::new("article", validator);
        content.insert("title", Field::new("text", "title", None).into());
        content.insert(
            "cta",
            MultipleValueField::new("link", "cta", None, &["scope", "target"]).into(),
        );
        let images = Group::new("images", None)
            .repeatable()
            .with(Field::new("text", "caption", None))
            .unwrap();
        content.insert("images", FieldNode::Group(images).into());
        content
    }

    #[test]
    fn test_slots_and_unknown_names() {
        let mut content = sample_content();

        assert!(content.get("images").unwrap().as_repeatable().is_some());
        assert!(content.get("nope").is_none());
        assert!(!content.set_value("nope", "", "x"));
        assert!(!content.set_value("images", "", "x"));

        assert!(content.set_value("title", "", "Hello"));
        assert!(content.set_value("cta", "target", "/contact"));
        assert_eq!(content.value("title"), Some("Hello"));
        assert_eq!(
            content.get("cta").unwrap().as_multiple().unwrap().get("target"),
            Some("/contact")
        );
        assert_eq!(
            content.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["title", "cta", "images"]
        );
    }

    #[test]
    fn test_validate_reports_paths() {
        let mut content = sample_content();
        content
            .get_mut("images")
            .unwrap()
            .as_repeatable_mut()
            .unwrap()
            .get_or_create(1)
            .get_mut("caption")
            .unwrap()
            .set_stored_value("", "too long");

        let errors = content.validate().unwrap_err().errors;
        let paths: Vec<&str> = errors.iter().map(ValidationError::field).collect();
        assert_eq!(paths, vec!["title", "images[1].caption"]);

        content.set_value("title", "", "Hi");
        content
            .get_mut("images")
            .unwrap()
            .as_repeatable_mut()
            .unwrap()
            .set(1, Group::new("images", None));
        assert!(content.is_valid());
    }
}
