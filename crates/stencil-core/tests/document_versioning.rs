use std::collections::BTreeMap;

use serde_json::{json, Value};
use stencil_core::document::INITIAL_VERSION_LABEL;
use stencil_core::params::ParameterEdit;
use stencil_core::{
    DocumentService, DocumentStatus, DocumentUpdate, NewDocument, ParamType, RenderOverrides,
    StencilError, Store,
};

fn service() -> DocumentService {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    DocumentService::new(store)
}

fn values(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn create_produces_initial_version_and_parameters() {
    let docs = service();
    let doc = docs
        .create(NewDocument::new("Order Update", "Hi {{name}}, order {{order_id}}"))
        .unwrap();
    assert_eq!(doc.slug, "order-update");

    let history = docs.history(doc.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version_number, 1);
    assert_eq!(history[0].change_description, INITIAL_VERSION_LABEL);

    let params = docs.parameters(doc.id).unwrap();
    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["name", "order_id"]);
    assert_eq!(params[1].param_type, ParamType::Integer);
    assert_eq!(params[1].position, 2);
}

#[test]
fn generated_slugs_are_unique() {
    let docs = service();
    let a = docs.create(NewDocument::new("Welcome", "a")).unwrap();
    let b = docs.create(NewDocument::new("Welcome", "b")).unwrap();
    assert_eq!(a.slug, "welcome");
    assert_eq!(b.slug, "welcome-2");

    let mut taken = NewDocument::new("Other", "c");
    taken.slug = Some("welcome".into());
    assert!(matches!(docs.create(taken), Err(StencilError::Validation(_))));
}

#[test]
fn tracked_change_creates_one_labelled_version() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "v1 text")).unwrap();

    let update = DocumentUpdate {
        content: Some("v2 text".into()),
        temperature: Some(Some(0.3)),
        ..Default::default()
    };
    let (_, version) = docs.update(doc.id, update).unwrap();
    let version = version.unwrap();
    assert_eq!(version.version_number, 2);
    assert_eq!(version.change_description, "Updated content, temperature");
    assert_eq!(version.tracked.content, "v2 text");
}

#[test]
fn untracked_change_creates_no_version() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "text")).unwrap();

    let update = DocumentUpdate {
        name: Some("Renamed".into()),
        status: Some(DocumentStatus::Active),
        ..Default::default()
    };
    let (updated, version) = docs.update(doc.id, update).unwrap();
    assert!(version.is_none());
    assert_eq!(updated.name, "Renamed");
    assert_eq!(docs.history(doc.id).unwrap().len(), 1);

    docs.set_status(doc.id, DocumentStatus::Archived).unwrap();
    assert_eq!(docs.get(doc.id).unwrap().status, DocumentStatus::Archived);
    assert_eq!(docs.history(doc.id).unwrap().len(), 1);
}

#[test]
fn restoring_twice_creates_two_versions() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "first")).unwrap();
    docs.update(doc.id, DocumentUpdate::content("second")).unwrap();

    let (restored, v3) = docs.restore(doc.id, 1).unwrap();
    assert_eq!(restored.tracked.content, "first");
    assert_eq!(v3.version_number, 3);
    assert_eq!(v3.change_description, "Restored from version 1");

    // Nothing changes the second time, yet the restore is still recorded.
    let (_, v4) = docs.restore(doc.id, 1).unwrap();
    assert_eq!(v4.version_number, 4);
    assert!(v4.version_number > v3.version_number);
    assert_eq!(v4.change_description, "Restored from version 1");
    assert_eq!(docs.history(doc.id).unwrap().len(), 4);
}

#[test]
fn restore_of_unknown_version_is_not_found() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "x")).unwrap();
    assert!(matches!(
        docs.restore(doc.id, 9),
        Err(StencilError::NotFound { entity: "version", .. })
    ));
}

#[test]
fn content_change_resyncs_parameters() {
    let docs = service();
    let doc = docs
        .create(NewDocument::new("Doc", "{{greeting}} {{name}}"))
        .unwrap();
    docs.update(doc.id, DocumentUpdate::content("{{name}} has {{item_count}} items"))
        .unwrap();

    let params = docs.parameters(doc.id).unwrap();
    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["name", "item_count"]);
    assert_eq!(params[1].position, 3);

    let plan = docs.sync_parameters(&docs.get(doc.id).unwrap()).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn manual_parameter_edits_survive_resync() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "Hello {{name}}")).unwrap();
    docs.update_parameter(
        doc.id,
        "name",
        ParameterEdit {
            description: Some(Some("Who to greet".into())),
            required: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    docs.update(doc.id, DocumentUpdate::content("Hello {{name}}, welcome"))
        .unwrap();
    let params = docs.parameters(doc.id).unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].description.as_deref(), Some("Who to greet"));
    assert!(!params[0].required);
}

#[test]
fn render_current_and_previous_versions() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Greeting", "Hello {{name}}")).unwrap();
    docs.update(doc.id, DocumentUpdate::content("Hi {{name}}!")).unwrap();

    let vals = values(&[("name", json!("Alice"))]);
    let current = docs
        .render(doc.id, &vals, &RenderOverrides::default(), None)
        .unwrap();
    assert_eq!(current.content, "Hi Alice!");
    assert_eq!(current.version_number, 2);

    let old = docs
        .render(doc.id, &vals, &RenderOverrides::default(), Some(1))
        .unwrap();
    assert_eq!(old.content, "Hello Alice");
    assert_eq!(old.version_number, 1);
}

#[test]
fn old_version_renders_against_its_own_placeholders() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Greeting", "Hello {{name}}")).unwrap();
    docs.update(doc.id, DocumentUpdate::content("Hi {{user}}")).unwrap();

    let old = docs
        .render(
            doc.id,
            &values(&[("name", json!("Alice"))]),
            &RenderOverrides::default(),
            Some(1),
        )
        .unwrap();
    assert_eq!(old.content, "Hello Alice");

    let err = docs
        .render(doc.id, &BTreeMap::new(), &RenderOverrides::default(), Some(1))
        .unwrap_err();
    assert_eq!(err.to_string(), "name is required");

    let current = docs
        .render(
            doc.id,
            &values(&[("user", json!("Bob"))]),
            &RenderOverrides::default(),
            None,
        )
        .unwrap();
    assert_eq!(current.content, "Hi Bob");
}

#[test]
fn render_without_required_value_fails() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Greeting", "Hello {{name}}")).unwrap();
    let err = docs
        .render(doc.id, &BTreeMap::new(), &RenderOverrides::default(), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "name is required");
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn diff_between_versions() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "line one\nline two\n")).unwrap();
    docs.update(
        doc.id,
        DocumentUpdate {
            content: Some("line one\nline 2\n".into()),
            model: Some("gpt-4o".into()),
            ..Default::default()
        },
    )
    .unwrap();

    let diff = docs.diff(doc.id, 1, 2).unwrap();
    assert_eq!(diff.changed_fields, vec!["content", "model"]);
    assert!(diff.content_diff.contains("-line two"));
    assert!(diff.content_diff.contains("+line 2"));
}

#[test]
fn delete_cascades() {
    let docs = service();
    let doc = docs.create(NewDocument::new("Doc", "{{a}}")).unwrap();
    docs.delete(doc.id).unwrap();
    assert!(docs.get(doc.id).is_err());
    assert!(docs.parameters(doc.id).unwrap().is_empty());
    assert!(docs.store().list_versions(doc.id).unwrap().is_empty());
}

#[test]
fn file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stencil.db");
    {
        let store = Store::open(&path).unwrap();
        store.init_schema().unwrap();
        DocumentService::new(store)
            .create(NewDocument::new("Kept", "text"))
            .unwrap();
    }
    let store = Store::open(&path).unwrap();
    store.init_schema().unwrap();
    let docs = DocumentService::new(store);
    let doc = docs.find_by_slug("kept").unwrap().unwrap();
    assert_eq!(docs.current_version(doc.id).unwrap().version_number, 1);
}
