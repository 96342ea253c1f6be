use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use super::versioning::{maybe_create_version, restore_label, INITIAL_VERSION_LABEL};
use super::{
    diff_versions, slugify, Document, DocumentStatus, DocumentUpdate, NewDocument, Version,
    VersionDiff,
};
use crate::error::{Result, StencilError, ValidationError};
use crate::params::{plan_sync, Parameter, ParameterEdit, SyncPlan};
use crate::render::{render, RenderOverrides, RenderedOutput};
use crate::storage::Store;
use crate::template::extract;
use crate::workflow::StepRenderer;

/// Document operations: creation, versioned updates, restore, parameter
/// sync and rendering.
#[derive(Clone)]
pub struct DocumentService {
    store: Store,
}

impl DocumentService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Creates a document with its "Initial version" and synced parameters.
    pub fn create(&self, new: NewDocument) -> Result<Document> {
        if new.name.trim().is_empty() {
            return Err(ValidationError::new("name", "can't be blank").into());
        }
        let slug = self.resolve_slug(&new)?;
        let (doc, version) = self.store.insert_document(
            new.name.trim(),
            &slug,
            new.status,
            &new.tracked,
            INITIAL_VERSION_LABEL,
        )?;
        self.sync_parameters(&doc)?;
        info!(id = doc.id, slug = %doc.slug, version = version.version_number, "created document");
        Ok(doc)
    }

    fn resolve_slug(&self, new: &NewDocument) -> Result<String> {
        if let Some(slug) = &new.slug {
            if slug.trim().is_empty() {
                return Err(ValidationError::new("slug", "can't be blank").into());
            }
            if self.store.slug_exists(slug)? {
                return Err(ValidationError::new("slug", "has already been taken").into());
            }
            return Ok(slug.clone());
        }
        let base = slugify(&new.name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.store.slug_exists(&candidate)? {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        Ok(candidate)
    }

    pub fn get(&self, id: i64) -> Result<Document> {
        self.store.get_document(id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Result<Option<Document>> {
        self.store.find_document_by_slug(slug)
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Document> {
        self.find_by_slug(slug)?
            .ok_or_else(|| StencilError::not_found("document", slug))
    }

    pub fn list(&self) -> Result<Vec<Document>> {
        self.store.list_documents()
    }

    /// Applies `update`, then appends a version if a tracked field changed.
    ///
    /// When content changes, parameters no longer referenced are removed in
    /// the same transaction as the save and new ones are created afterwards.
    pub fn update(&self, id: i64, update: DocumentUpdate) -> Result<(Document, Option<Version>)> {
        let old = self.store.get_document(id)?;
        let mut doc = old.clone();
        update.apply(&mut doc);
        if doc.name.trim().is_empty() {
            return Err(ValidationError::new("name", "can't be blank").into());
        }

        let content_changed = old.tracked.content != doc.tracked.content;
        let stale = self.stale_parameters(&doc, content_changed)?;
        self.store.save_document(&mut doc, &stale)?;

        let version = maybe_create_version(&self.store, id, &old.tracked, &doc.tracked)?;
        if content_changed {
            self.sync_parameters(&doc)?;
        }
        Ok((doc, version))
    }

    /// Copies a version's snapshot onto the document and records the restore
    /// as a new version, whether or not anything changed.
    pub fn restore(&self, id: i64, version_number: u32) -> Result<(Document, Version)> {
        let target = self.store.get_version(id, version_number)?;
        let old = self.store.get_document(id)?;
        let mut doc = old.clone();
        doc.tracked = target.tracked;

        let content_changed = old.tracked.content != doc.tracked.content;
        let stale = self.stale_parameters(&doc, content_changed)?;
        self.store.save_document(&mut doc, &stale)?;

        let version = self
            .store
            .insert_version(id, &doc.tracked, &restore_label(version_number))?;
        if content_changed {
            self.sync_parameters(&doc)?;
        }
        info!(id, from = version_number, version = version.version_number, "restored document");
        Ok((doc, version))
    }

    fn stale_parameters(&self, doc: &Document, content_changed: bool) -> Result<Vec<String>> {
        if !content_changed {
            return Ok(Vec::new());
        }
        let declared = self.store.list_parameters(doc.id)?;
        Ok(plan_sync(&extract(&doc.tracked.content), &declared).remove)
    }

    /// Status is not tracked and never produces a version.
    pub fn set_status(&self, id: i64, status: DocumentStatus) -> Result<Document> {
        let mut doc = self.store.get_document(id)?;
        doc.status = status;
        self.store.save_document(&mut doc, &[])?;
        Ok(doc)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_document(id)?;
        info!(id, "deleted document");
        Ok(())
    }

    /// Newest first.
    pub fn history(&self, id: i64) -> Result<Vec<Version>> {
        self.store.get_document(id)?;
        self.store.list_versions(id)
    }

    pub fn current_version(&self, id: i64) -> Result<Version> {
        self.store.latest_version(id)
    }

    pub fn version(&self, id: i64, version_number: u32) -> Result<Version> {
        self.store.get_version(id, version_number)
    }

    pub fn diff(&self, id: i64, from: u32, to: u32) -> Result<VersionDiff> {
        let a = self.store.get_version(id, from)?;
        let b = self.store.get_version(id, to)?;
        Ok(diff_versions(&a, &b))
    }

    /// Mirrors placeholders in the current content. Idempotent.
    pub fn sync_parameters(&self, doc: &Document) -> Result<SyncPlan> {
        let declared = self.store.list_parameters(doc.id)?;
        let plan = plan_sync(&extract(&doc.tracked.content), &declared);
        if plan.is_empty() {
            return Ok(plan);
        }
        self.store.apply_sync_plan(doc.id, &plan)?;
        debug!(
            id = doc.id,
            created = plan.create.len(),
            removed = plan.remove.len(),
            "synced parameters"
        );
        Ok(plan)
    }

    pub fn parameters(&self, id: i64) -> Result<Vec<Parameter>> {
        self.store.list_parameters(id)
    }

    /// Manual edits survive re-sync while the placeholder stays in content.
    pub fn update_parameter(&self, id: i64, name: &str, edit: ParameterEdit) -> Result<Parameter> {
        let mut param = self
            .store
            .list_parameters(id)?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| StencilError::not_found("parameter", name))?;
        edit.apply(&mut param);
        self.store.update_parameter(id, &param)?;
        Ok(param)
    }

    /// Renders the current document, or `version` when given.
    pub fn render(
        &self,
        id: i64,
        values: &BTreeMap<String, Value>,
        overrides: &RenderOverrides,
        version: Option<u32>,
    ) -> Result<RenderedOutput> {
        let doc = self.store.get_document(id)?;
        let declared = self.store.list_parameters(id)?;
        let (tracked, version_number, params) = match version {
            Some(n) => {
                let v = self.store.get_version(id, n)?;
                let params = version_parameters(&v.tracked.content, declared);
                (v.tracked, v.version_number, params)
            }
            None => {
                let latest = self.store.latest_version(id)?;
                (doc.tracked, latest.version_number, declared)
            }
        };
        Ok(render(&tracked, version_number, &params, values, overrides)?)
    }

    pub fn render_by_slug(
        &self,
        slug: &str,
        values: &BTreeMap<String, Value>,
        overrides: &RenderOverrides,
    ) -> Result<RenderedOutput> {
        let doc = self.get_by_slug(slug)?;
        self.render(doc.id, values, overrides, None)
    }
}

/// Parameters governing an older version's content: declared parameters it
/// still references, plus required inferred ones for placeholders that are no
/// longer declared.
fn version_parameters(content: &str, declared: Vec<Parameter>) -> Vec<Parameter> {
    let plan = plan_sync(&extract(content), &declared);
    let mut params: Vec<Parameter> = declared
        .into_iter()
        .filter(|p| !plan.remove.contains(&p.name))
        .collect();
    params.extend(plan.create);
    params
}

impl StepRenderer for DocumentService {
    fn render_step(&self, slug: &str, variables: &BTreeMap<String, Value>) -> Result<String> {
        Ok(self
            .render_by_slug(slug, variables, &RenderOverrides::default())?
            .content)
    }
}
