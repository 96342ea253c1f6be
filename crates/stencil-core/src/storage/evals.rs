use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{collect_rows, Store};
use crate::error::{Result, StencilError};
use crate::eval::grader::validate_config;
use crate::eval::{
    EvaluationRun, EvaluationSet, GraderType, NewEvaluationSet, RunCounts, RunStatus, TestCase,
    TestCaseRecord,
};

const SET_COLUMNS: &str =
    "id, document_id, name, grader_type, grader_config, remote_eval_id, created_at";

const RUN_COLUMNS: &str = "id, evaluation_set_id, version_id, status, started_at, completed_at, \
     total_count, passed_count, failed_count, remote_run_id, remote_file_id, report_url, \
     error_message, created_at";

fn set_from_row(row: &Row<'_>) -> rusqlite::Result<EvaluationSet> {
    let grader_type: String = row.get(3)?;
    Ok(EvaluationSet {
        id: row.get(0)?,
        document_id: row.get(1)?,
        name: row.get(2)?,
        grader_type: GraderType::parse(&grader_type),
        grader_config: row.get(4)?,
        remote_eval_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<TestCase> {
    let inputs: String = row.get(2)?;
    Ok(TestCase {
        id: row.get(0)?,
        evaluation_set_id: row.get(1)?,
        input_variables: serde_json::from_str(&inputs).unwrap_or_default(),
        expected_output: row.get(3)?,
        description: row.get(4)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<EvaluationRun> {
    let status: String = row.get(3)?;
    Ok(EvaluationRun {
        id: row.get(0)?,
        evaluation_set_id: row.get(1)?,
        version_id: row.get(2)?,
        status: RunStatus::parse(&status),
        started_at: row.get(4)?,
        completed_at: row.get(5)?,
        counts: RunCounts {
            total: row.get(6)?,
            passed: row.get(7)?,
            failed: row.get(8)?,
        },
        remote_run_id: row.get(9)?,
        remote_file_id: row.get(10)?,
        report_url: row.get(11)?,
        error_message: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn insert_case_on(conn: &Connection, set_id: i64, record: &TestCaseRecord) -> Result<TestCase> {
    conn.execute(
        "INSERT INTO test_cases (evaluation_set_id, input_variables, expected_output, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            set_id,
            serde_json::to_string(&record.input_variables)?,
            record.expected_output,
            record.description,
        ],
    )?;
    Ok(TestCase {
        id: conn.last_insert_rowid(),
        evaluation_set_id: set_id,
        input_variables: record.input_variables.clone(),
        expected_output: record.expected_output.clone(),
        description: record.description.clone(),
    })
}

impl Store {
    /// Validates the grader configuration, then persists the set.
    pub fn insert_evaluation_set(&self, new: &NewEvaluationSet) -> Result<EvaluationSet> {
        validate_config(new.grader_type, &new.grader_config)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evaluation_sets (document_id, name, grader_type, grader_config, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.document_id,
                new.name,
                new.grader_type.as_str(),
                new.grader_config,
                Utc::now(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, grader = %new.grader_type, "created evaluation set");
        Ok(conn.query_row(
            &format!("SELECT {SET_COLUMNS} FROM evaluation_sets WHERE id = ?1"),
            params![id],
            set_from_row,
        )?)
    }

    pub fn get_evaluation_set(&self, id: i64) -> Result<EvaluationSet> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SET_COLUMNS} FROM evaluation_sets WHERE id = ?1"),
            params![id],
            set_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("evaluation set", id))
    }

    pub fn list_evaluation_sets(&self, document_id: i64) -> Result<Vec<EvaluationSet>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SET_COLUMNS} FROM evaluation_sets WHERE document_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![document_id], set_from_row)?;
        Ok(collect_rows(rows)?)
    }

    pub fn set_remote_eval_id(&self, set_id: i64, remote_eval_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE evaluation_sets SET remote_eval_id = ?2 WHERE id = ?1",
            params![set_id, remote_eval_id],
        )?;
        Ok(())
    }

    pub fn insert_test_case(&self, set_id: i64, record: &TestCaseRecord) -> Result<TestCase> {
        let conn = self.lock()?;
        insert_case_on(&conn, set_id, record)
    }

    /// Inserts all records or none.
    pub fn import_test_cases(&self, set_id: i64, records: &[TestCaseRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for record in records {
            insert_case_on(&tx, set_id, record)?;
        }
        tx.commit()?;
        debug!(set_id, count = records.len(), "imported test cases");
        Ok(records.len())
    }

    pub fn list_test_cases(&self, set_id: i64) -> Result<Vec<TestCase>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, evaluation_set_id, input_variables, expected_output, description
             FROM test_cases WHERE evaluation_set_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![set_id], case_from_row)?;
        Ok(collect_rows(rows)?)
    }

    /// A new pending run of `version_id` against `set_id`.
    pub fn insert_run(&self, set_id: i64, version_id: i64) -> Result<EvaluationRun> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evaluation_runs (evaluation_set_id, version_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![set_id, version_id, RunStatus::Pending.as_str(), Utc::now()],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM evaluation_runs WHERE id = ?1"),
            params![id],
            run_from_row,
        )?)
    }

    pub fn get_run(&self, id: i64) -> Result<EvaluationRun> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM evaluation_runs WHERE id = ?1"),
            params![id],
            run_from_row,
        )
        .optional()?
        .ok_or_else(|| StencilError::not_found("evaluation run", id))
    }

    /// Newest first.
    pub fn list_runs(&self, set_id: i64) -> Result<Vec<EvaluationRun>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM evaluation_runs WHERE evaluation_set_id = ?1 ORDER BY id DESC"
        ))?;
        let rows = stmt.query_map(params![set_id], run_from_row)?;
        Ok(collect_rows(rows)?)
    }

    pub fn save_run(&self, run: &EvaluationRun) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE evaluation_runs SET status = ?2, started_at = ?3, completed_at = ?4,
                 total_count = ?5, passed_count = ?6, failed_count = ?7, remote_run_id = ?8,
                 remote_file_id = ?9, report_url = ?10, error_message = ?11
             WHERE id = ?1",
            params![
                run.id,
                run.status.as_str(),
                run.started_at,
                run.completed_at,
                run.counts.total,
                run.counts.passed,
                run.counts.failed,
                run.remote_run_id,
                run.remote_file_id,
                run.report_url,
                run.error_message,
            ],
        )?;
        Ok(())
    }
}
