//! Evaluation sets, test cases and runs graded by a remote service.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StencilError};

pub mod grader;
mod orchestrator;

pub use grader::{grader_for, Criterion, CriterionKind, Grader, GraderType};
pub use orchestrator::{build_item_schema, Orchestrator, PollConfig, TIMEOUT_MESSAGE};

/// A named grading configuration scoped to one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSet {
    pub id: i64,
    pub document_id: i64,
    pub name: String,
    pub grader_type: GraderType,
    pub grader_config: Value,
    /// Remote eval id, created lazily on first run.
    pub remote_eval_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::Store::insert_evaluation_set`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvaluationSet {
    pub document_id: i64,
    pub name: String,
    #[serde(default)]
    pub grader_type: GraderType,
    #[serde(default = "empty_config")]
    pub grader_config: Value,
}

fn empty_config() -> Value {
    Value::Object(Default::default())
}

impl NewEvaluationSet {
    pub fn new(document_id: i64, name: impl Into<String>, grader_type: GraderType) -> Self {
        Self {
            document_id,
            name: name.into(),
            grader_type,
            grader_config: empty_config(),
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.grader_config = config;
        self
    }
}

/// One input/expected-output fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub evaluation_set_id: i64,
    pub input_variables: BTreeMap<String, Value>,
    pub expected_output: String,
    pub description: Option<String>,
}

impl TestCase {
    /// Input values flattened with `expected_output` at the same level.
    pub fn to_item(&self) -> Value {
        let mut item: serde_json::Map<String, Value> = self
            .input_variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        item.insert(
            "expected_output".to_string(),
            Value::String(self.expected_output.clone()),
        );
        Value::Object(item)
    }
}

/// Pre-validated test case data, as produced by an importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseRecord {
    #[serde(default)]
    pub input_variables: BTreeMap<String, Value>,
    pub expected_output: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Run status. Moves pending → running → completed | failed only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate result counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

/// One attempt to grade a version against an evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: i64,
    pub evaluation_set_id: i64,
    pub version_id: i64,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: RunCounts,
    pub remote_run_id: Option<String>,
    pub remote_file_id: Option<String>,
    pub report_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EvaluationRun {
    fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(StencilError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(RunStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, counts: RunCounts, now: DateTime<Utc>) -> Result<()> {
        self.transition(RunStatus::Completed)?;
        self.counts = counts;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.transition(RunStatus::Failed)?;
        self.error_message = Some(message.into());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Passed over total, when anything was graded.
    pub fn pass_rate(&self) -> Option<f64> {
        (self.counts.total > 0).then(|| self.counts.passed as f64 / self.counts.total as f64)
    }
}
