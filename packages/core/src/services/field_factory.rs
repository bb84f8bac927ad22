//! Field Factory
//!
//! Collects the fields and groups a page type registers. `build()` resets the
//! factory and asks the page type to register its schema; the resulting
//! top-level entries are iterated in registration order by the content
//! loader.
//!
//! Duplicate names and unknown field types fail immediately with a
//! [`FieldError`]: both mean the page type definition is broken.

use crate::models::{FieldError, FieldNode, FieldTypeRegistry, Group, PageType, Validator};
use std::sync::Arc;

/// Builds the field schema of one page type
#[derive(Debug, Clone)]
pub struct FieldFactory {
    types: Arc<FieldTypeRegistry>,
    fields: Vec<FieldNode>,
}

impl FieldFactory {
    pub fn new(types: Arc<FieldTypeRegistry>) -> Self {
        Self {
            types,
            fields: Vec::new(),
        }
    }

    /// Reset and register the schema of `page_type`
    pub fn build(&mut self, page_type: &dyn PageType) -> Result<(), FieldError> {
        self.clear();
        page_type.register_fields(self)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Instantiate a field without adding it
    pub fn create(&self, field_type: &str, name: &str, label: Option<&str>) -> Result<FieldNode, FieldError> {
        self.types.create(field_type, name, label)
    }

    /// Instantiate a field of a registered type and add it
    pub fn add_field(
        &mut self,
        field_type: &str,
        name: &str,
        label: Option<&str>,
    ) -> Result<&mut FieldNode, FieldError> {
        let field = self.create(field_type, name, label)?;
        self.add(field)
    }

    /// Add a field, multi-value field or group
    pub fn add(&mut self, field: impl Into<FieldNode>) -> Result<&mut FieldNode, FieldError> {
        let field = field.into();
        if self.get(field.name()).is_some() {
            return Err(FieldError::DuplicateField(field.name().to_string()));
        }
        self.fields.push(field);
        let last = self.fields.len() - 1;
        Ok(&mut self.fields[last])
    }

    /// Start a new group whose members come from this factory's type registry
    ///
    /// The group is not part of the schema until passed to
    /// [`FieldFactory::add_group`].
    pub fn get_group(&self, name: &str, label: Option<&str>) -> FieldGroup {
        FieldGroup {
            group: Group::new(name, label),
            types: Arc::clone(&self.types),
        }
    }

    pub fn add_group(&mut self, group: FieldGroup) -> Result<&mut FieldNode, FieldError> {
        self.add(group.group)
    }

    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldNode> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validator for the registered schema
    ///
    /// Every group gets its own scope, derived from the top-level validator
    /// and reset, holding only the rules of that group's members.
    pub fn validator(&self) -> Validator {
        let mut validator = Validator::new();
        for field in &self.fields {
            match field {
                FieldNode::Group(group) => {
                    let mut scope = validator.scoped();
                    for member in group.fields() {
                        scope.add_rules(member.name(), member.rules());
                    }
                    validator.set_group(group.name(), scope);
                }
                leaf => validator.add_rules(leaf.name(), leaf.rules()),
            }
        }
        validator
    }
}

impl<'a> IntoIterator for &'a FieldFactory {
    type Item = &'a FieldNode;
    type IntoIter = std::slice::Iter<'a, FieldNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// A group under construction
#[derive(Debug, Clone)]
pub struct FieldGroup {
    group: Group,
    types: Arc<FieldTypeRegistry>,
}

impl FieldGroup {
    pub fn add_field(
        &mut self,
        field_type: &str,
        name: &str,
        label: Option<&str>,
    ) -> Result<&mut FieldNode, FieldError> {
        let field = self.types.create(field_type, name, label)?;
        self.group.add(field)
    }

    pub fn add(&mut self, field: impl Into<FieldNode>) -> Result<&mut FieldNode, FieldError> {
        self.group.add(field)
    }

    pub fn set_repeatable(&mut self, repeatable: bool) -> &mut Self {
        self.group.set_repeatable(repeatable);
        self
    }

    pub fn group(&self) -> &Group {
        &self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DefinedPageType, Field, FieldDefinition, PageTypeDefinition, Rule};

    fn factory() -> FieldFactory {
        FieldFactory::new(Arc::new(FieldTypeRegistry::new()))
    }

    #[derive(Debug, Clone)]
    struct BlogPost;

    impl PageType for BlogPost {
        fn name(&self) -> &str {
            "blog"
        }

        fn register_fields(&self, factory: &mut FieldFactory) -> Result<(), FieldError> {
            factory.add_field("text", "intro", Some("Intro"))?;
            factory.add_field("richtext", "body", None)?.set_engine("markdown")?;

            let mut comments = factory.get_group("comments", Some("Comments"));
            comments.add_field("text", "allow_comments", None)?;
            comments
                .add_field("productoption", "permission", None)?
                .add_rule(Rule::Required)?;
            factory.add_group(comments)?;
            Ok(())
        }

        fn box_clone(&self) -> Box<dyn PageType> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_build_registers_in_order() {
        let mut factory = factory();
        factory.build(&BlogPost).unwrap();

        let names: Vec<&str> = factory.iter().map(FieldNode::name).collect();
        assert_eq!(names, vec!["intro", "body", "comments"]);
        assert_eq!(factory.get("comments").unwrap().as_group().unwrap().len(), 2);
    }

    #[test]
    fn test_build_resets_previous_schema() {
        let mut factory = factory();
        factory.add(Field::new("text", "stale", None)).unwrap();

        factory.build(&BlogPost).unwrap();
        assert!(factory.get("stale").is_none());

        // building twice must not trip the duplicate check
        factory.build(&BlogPost).unwrap();
        assert_eq!(factory.len(), 3);
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut factory = factory();
        factory.add_field("text", "title", None).unwrap();

        assert_eq!(
            factory.add_field("date", "title", None).unwrap_err(),
            FieldError::DuplicateField("title".to_string())
        );
        assert_eq!(
            factory.add_field("colour", "bg", None).unwrap_err(),
            FieldError::UnknownFieldType("colour".to_string())
        );
    }

    #[test]
    fn test_group_rules_are_scoped() {
        let mut factory = factory();
        factory.build(&BlogPost).unwrap();

        let validator = factory.validator();
        assert!(validator.rules_for("permission").is_empty());
        assert_eq!(
            validator.group("comments").unwrap().rules_for("permission"),
            [Rule::Required]
        );
    }

    #[test]
    fn test_defined_type_configuration_errors() {
        let mut def = FieldDefinition::new("text", "intro");
        def.engine = Some("markdown".to_string());
        let page_type = DefinedPageType::new(PageTypeDefinition {
            name: "broken".to_string(),
            display_name: None,
            description: None,
            fields: vec![def],
        });

        let mut factory = factory();
        assert!(matches!(
            factory.build(&page_type),
            Err(FieldError::UnsupportedOption { .. })
        ));

        let mut nested = FieldDefinition::new("group", "outer");
        nested.fields.push(FieldDefinition::new("group", "inner"));
        let page_type = DefinedPageType::new(PageTypeDefinition {
            name: "nested".to_string(),
            display_name: None,
            description: None,
            fields: vec![nested],
        });
        assert_eq!(
            factory.build(&page_type),
            Err(FieldError::NestedGroup {
                group: "outer".to_string(),
                nested: "inner".to_string()
            })
        );
    }
}
