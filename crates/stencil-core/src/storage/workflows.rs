use rusqlite::{params, OptionalExtension, Row};

use super::{collect_rows, Store};
use crate::error::{Result, StencilError, ValidationError};
use crate::workflow::Workflow;

fn workflow_from_row(row: &Row<'_>) -> rusqlite::Result<Workflow> {
    let steps_json: String = row.get(3)?;
    Ok(Workflow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        steps: serde_json::from_str(&steps_json).unwrap_or_default(),
        created_at: row.get(4)?,
    })
}

impl Store {
    /// Inserts or replaces a workflow by name after checking that it has at
    /// least one step and that every step slug names an existing document.
    pub fn save_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        if workflow.steps.is_empty() {
            return Err(ValidationError::new("steps", "must contain at least one step").into());
        }
        let mut missing = Vec::new();
        for (key, slug) in workflow.ordered_steps() {
            if !self.slug_exists(slug)? {
                missing.push(format!("step {} references unknown document {}", key, slug));
            }
        }
        if !missing.is_empty() {
            return Err(ValidationError::with_messages("steps", missing).into());
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO workflows (name, description, steps_json, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                 description = excluded.description,
                 steps_json = excluded.steps_json",
            params![
                workflow.name,
                workflow.description,
                serde_json::to_string(&workflow.steps)?,
                workflow.created_at,
            ],
        )?;
        Ok(conn.query_row(
            "SELECT id, name, description, steps_json, created_at FROM workflows WHERE name = ?1",
            params![workflow.name],
            workflow_from_row,
        )?)
    }

    pub fn get_workflow(&self, name: &str) -> Result<Workflow> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, description, steps_json, created_at FROM workflows WHERE name = ?1",
            params![name],
            workflow_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("workflow", name))
    }

    pub fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, steps_json, created_at FROM workflows ORDER BY name",
        )?;
        let rows = stmt.query_map([], workflow_from_row)?;
        Ok(collect_rows(rows)?)
    }
}
