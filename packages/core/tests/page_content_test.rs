//! Typed page content through `PageEngine`: schema, persistence, validation

use pagespace_core::{
    CommentContentValidator, Content, ContentSlot, DefinedPageType, EngineCollaborators,
    EngineConfig, FieldDefinition, FieldTypeRegistry, InvalidContentError, MultipleValueField,
    PageEngine, PageTypeDefinition, PageTypeRegistry, ValidationError,
};
use tempfile::TempDir;

fn blog_post_type() -> DefinedPageType {
    let mut body = FieldDefinition::new("richtext", "body");
    body.engine = Some("markdown".to_string());
    body.required = true;

    let mut allow_comments = FieldDefinition::new("text", "allow_comments");
    allow_comments.one_of = Some(vec![
        "allow".to_string(),
        "approve".to_string(),
        "disabled".to_string(),
    ]);

    let mut comments = FieldDefinition::new("group", "comments");
    comments.fields = vec![allow_comments, FieldDefinition::new("permission", "permission")];

    DefinedPageType::new(PageTypeDefinition {
        name: "blog_post".to_string(),
        display_name: Some("Blog post".to_string()),
        description: None,
        fields: vec![body, comments],
    })
}

async fn open_engine() -> (PageEngine, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::default().with_database_path(temp_dir.path().join("site.db"));

    let mut field_types = FieldTypeRegistry::new();
    field_types
        .register("permission", |name, label| {
            MultipleValueField::new("permission", name, label, &["guest", "member"]).into()
        })
        .unwrap();

    let page_types = PageTypeRegistry::new().with(blog_post_type()).unwrap();
    let collaborators = EngineCollaborators::new(page_types).with_field_types(field_types);

    let engine = PageEngine::open(config, collaborators).await.unwrap();
    (engine, temp_dir)
}

fn set_comment_value(content: &mut Content, field: &str, data_name: &str, value: &str) {
    let group = content
        .get_mut("comments")
        .and_then(ContentSlot::as_group_mut)
        .unwrap();
    assert!(group
        .get_mut(field)
        .unwrap()
        .set_stored_value(data_name, value));
}

#[tokio::test]
async fn test_content_round_trip_and_comment_checks() {
    let (engine, _temp) = open_engine().await;
    let page = engine
        .writer()
        .create("blog_post", "Hello World", None)
        .await
        .unwrap();

    let mut content = engine.content_loader().build_schema(&page).unwrap();
    assert!(content.set_value("body", "value", "# Hello\n\nFirst *post*"));
    set_comment_value(&mut content, "allow_comments", "value", "approve");
    set_comment_value(&mut content, "permission", "member", "1");
    engine.writer().save_content(&page, &content).await.unwrap();

    let loaded = engine.content_loader().load(&page).await.unwrap();
    assert_eq!(loaded.page_type(), "blog_post");
    assert!(loaded.validate().is_ok());
    assert!(CommentContentValidator::new().is_valid(&loaded));

    let body = loaded.get("body").and_then(ContentSlot::as_field).unwrap();
    let html = body.render_html().unwrap();
    assert!(html.contains("<h1>Hello</h1>"));
    assert!(html.contains("<em>post</em>"));
}

#[tokio::test]
async fn test_disabled_comments() {
    let (engine, _temp) = open_engine().await;
    let page = engine
        .writer()
        .create("blog_post", "Quiet post", None)
        .await
        .unwrap();

    let mut content = engine.content_loader().build_schema(&page).unwrap();
    content.set_value("body", "value", "text");
    set_comment_value(&mut content, "allow_comments", "value", "disabled");
    set_comment_value(&mut content, "permission", "guest", "1");

    assert!(content.is_valid());
    assert_eq!(
        CommentContentValidator::new().validate(&content),
        Err(InvalidContentError::CommentsDisabled)
    );
}

#[tokio::test]
async fn test_invalid_values_are_reported_by_path() {
    let (engine, _temp) = open_engine().await;
    let page = engine
        .writer()
        .create("blog_post", "Broken", None)
        .await
        .unwrap();

    let mut content = engine.content_loader().build_schema(&page).unwrap();
    set_comment_value(&mut content, "allow_comments", "value", "sometimes");

    let errors = content.validate().unwrap_err().errors;
    assert!(errors.contains(&ValidationError::Required {
        field: "body".to_string(),
    }));
    assert!(errors.contains(&ValidationError::NotAllowed {
        field: "comments.allow_comments".to_string(),
        value: "sometimes".to_string(),
    }));

    assert_eq!(
        CommentContentValidator::new().validate(&content),
        Err(InvalidContentError::InvalidSetting("sometimes".to_string()))
    );
}
