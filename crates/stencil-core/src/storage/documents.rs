use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{collect_rows, Store};
use crate::document::{Document, DocumentStatus, ModelSettings, TrackedFields, Version};
use crate::error::{Result, StencilError};
use crate::params::{ParamType, Parameter, SyncPlan, ValidationRules};

const DOCUMENT_COLUMNS: &str = "id, name, slug, status, content, instructions, model, \
     temperature, max_tokens, metadata, created_at, updated_at";

const VERSION_COLUMNS: &str = "id, document_id, version_number, content, instructions, model, \
     temperature, max_tokens, metadata, change_description, created_at";

const PARAMETER_COLUMNS: &str =
    "id, name, param_type, required, default_value, description, rules_json, position";

fn tracked_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<TrackedFields> {
    Ok(TrackedFields {
        content: row.get(offset)?,
        instructions: row.get(offset + 1)?,
        settings: ModelSettings {
            model: row.get(offset + 2)?,
            temperature: row.get(offset + 3)?,
            max_tokens: row.get(offset + 4)?,
        },
        metadata: row.get(offset + 5)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let status: String = row.get(3)?;
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        status: DocumentStatus::parse(&status).unwrap_or_default(),
        tracked: tracked_from_row(row, 4)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<Version> {
    Ok(Version {
        id: row.get(0)?,
        document_id: row.get(1)?,
        version_number: row.get(2)?,
        tracked: tracked_from_row(row, 3)?,
        change_description: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn parameter_from_row(row: &Row<'_>) -> rusqlite::Result<Parameter> {
    let param_type: String = row.get(2)?;
    let rules_json: String = row.get(6)?;
    Ok(Parameter {
        id: row.get(0)?,
        name: row.get(1)?,
        param_type: ParamType::parse(&param_type).unwrap_or_default(),
        required: row.get(3)?,
        default_value: row.get(4)?,
        description: row.get(5)?,
        rules: serde_json::from_str::<ValidationRules>(&rules_json).unwrap_or_default(),
        position: row.get(7)?,
    })
}

/// Appends the next version number for `document_id` in one statement.
fn insert_version_on(
    conn: &Connection,
    document_id: i64,
    tracked: &TrackedFields,
    change_description: &str,
) -> Result<Version> {
    conn.execute(
        "INSERT INTO versions (document_id, version_number, content, instructions, model,
             temperature, max_tokens, metadata, change_description, created_at)
         SELECT ?1, COALESCE(MAX(version_number), 0) + 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9
         FROM versions WHERE document_id = ?1",
        params![
            document_id,
            tracked.content,
            tracked.instructions,
            tracked.settings.model,
            tracked.settings.temperature,
            tracked.settings.max_tokens,
            tracked.metadata,
            change_description,
            Utc::now(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    let version = conn.query_row(
        &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE id = ?1"),
        params![id],
        version_from_row,
    )?;
    Ok(version)
}

fn insert_parameter_on(conn: &Connection, document_id: i64, param: &Parameter) -> Result<i64> {
    conn.execute(
        "INSERT INTO parameters (document_id, name, param_type, required, default_value,
             description, rules_json, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            document_id,
            param.name,
            param.param_type.as_str(),
            param.required,
            param.default_value,
            param.description,
            serde_json::to_string(&param.rules)?,
            param.position,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Store {
    pub fn slug_exists(&self, slug: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM documents WHERE slug = ?1",
                params![slug],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts a document together with its first version.
    pub fn insert_document(
        &self,
        name: &str,
        slug: &str,
        status: DocumentStatus,
        tracked: &TrackedFields,
        initial_label: &str,
    ) -> Result<(Document, Version)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        tx.execute(
            "INSERT INTO documents (name, slug, status, content, instructions, model,
                 temperature, max_tokens, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                name,
                slug,
                status.as_str(),
                tracked.content,
                tracked.instructions,
                tracked.settings.model,
                tracked.settings.temperature,
                tracked.settings.max_tokens,
                tracked.metadata,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let version = insert_version_on(&tx, id, tracked, initial_label)?;
        let doc = tx.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            document_from_row,
        )?;
        tx.commit()?;
        Ok((doc, version))
    }

    pub fn get_document(&self, id: i64) -> Result<Document> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id],
            document_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("document", id))
    }

    pub fn find_document_by_slug(&self, slug: &str) -> Result<Option<Document>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE slug = ?1"),
                params![slug],
                document_from_row,
            )
            .optional()?)
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY name, id"))?;
        let rows = stmt.query_map([], document_from_row)?;
        Ok(collect_rows(rows)?)
    }

    /// Persists the current state of `doc` and drops the named parameters in
    /// the same transaction. Bumps `updated_at`.
    pub fn save_document(&self, doc: &mut Document, remove_params: &[String]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        doc.updated_at = Utc::now();
        let t = &doc.tracked;
        let changed = tx.execute(
            "UPDATE documents SET name = ?2, status = ?3, content = ?4, instructions = ?5,
                 model = ?6, temperature = ?7, max_tokens = ?8, metadata = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                doc.id,
                doc.name,
                doc.status.as_str(),
                t.content,
                t.instructions,
                t.settings.model,
                t.settings.temperature,
                t.settings.max_tokens,
                t.metadata,
                doc.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(StencilError::not_found("document", doc.id));
        }
        for name in remove_params {
            tx.execute(
                "DELETE FROM parameters WHERE document_id = ?1 AND name = ?2",
                params![doc.id, name],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes a document; versions, parameters, sets, cases and runs cascade.
    pub fn delete_document(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StencilError::not_found("document", id));
        }
        Ok(())
    }

    pub fn insert_version(
        &self,
        document_id: i64,
        tracked: &TrackedFields,
        change_description: &str,
    ) -> Result<Version> {
        let conn = self.lock()?;
        insert_version_on(&conn, document_id, tracked, change_description)
    }

    pub fn get_version(&self, document_id: i64, version_number: u32) -> Result<Version> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM versions
                 WHERE document_id = ?1 AND version_number = ?2"
            ),
            params![document_id, version_number],
            version_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("version", format!("{document_id}/v{version_number}")))
    }

    pub fn get_version_by_id(&self, id: i64) -> Result<Version> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE id = ?1"),
            params![id],
            version_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("version", id))
    }

    pub fn latest_version(&self, document_id: i64) -> Result<Version> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM versions
                 WHERE document_id = ?1 ORDER BY version_number DESC LIMIT 1"
            ),
            params![document_id],
            version_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("version", format!("{document_id}/latest")))
    }

    /// Newest first.
    pub fn list_versions(&self, document_id: i64) -> Result<Vec<Version>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM versions
             WHERE document_id = ?1 ORDER BY version_number DESC"
        ))?;
        let rows = stmt.query_map(params![document_id], version_from_row)?;
        Ok(collect_rows(rows)?)
    }

    /// Ordered by position.
    pub fn list_parameters(&self, document_id: i64) -> Result<Vec<Parameter>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PARAMETER_COLUMNS} FROM parameters
             WHERE document_id = ?1 ORDER BY position, id"
        ))?;
        let rows = stmt.query_map(params![document_id], parameter_from_row)?;
        Ok(collect_rows(rows)?)
    }

    /// Applies a sync plan atomically.
    pub fn apply_sync_plan(&self, document_id: i64, plan: &SyncPlan) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for name in &plan.remove {
            tx.execute(
                "DELETE FROM parameters WHERE document_id = ?1 AND name = ?2",
                params![document_id, name],
            )?;
        }
        for param in &plan.create {
            insert_parameter_on(&tx, document_id, param)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Persists manual edits to an existing parameter, matched by name.
    pub fn update_parameter(&self, document_id: i64, param: &Parameter) -> Result<()> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE parameters SET param_type = ?3, required = ?4, default_value = ?5,
                 description = ?6, rules_json = ?7
             WHERE document_id = ?1 AND name = ?2",
            params![
                document_id,
                param.name,
                param.param_type.as_str(),
                param.required,
                param.default_value,
                param.description,
                serde_json::to_string(&param.rules)?,
            ],
        )?;
        if n == 0 {
            return Err(StencilError::not_found("parameter", &param.name));
        }
        Ok(())
    }
}
