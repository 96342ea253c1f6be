//! Drives an evaluation run against the remote grading service.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::grader::grader_for;
use super::{EvaluationRun, EvaluationSet, RunCounts, TestCase};
use crate::document::Document;
use crate::error::{Result, StencilError};
use crate::grading::{
    GradingClient, GradingResult, RemoteFile, RemoteRunStatus, RunReport, RunRequest,
    TemplateMessage,
};
use crate::params::Parameter;
use crate::storage::Store;
use crate::template::to_remote_template;

pub const TIMEOUT_MESSAGE: &str = "Timeout waiting for eval results";

/// Fixed-interval polling with an attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// JSON schema for one data item: declared parameters plus `expected_output`.
pub fn build_item_schema(params: &[Parameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in params {
        properties.insert(
            param.name.clone(),
            json!({ "type": param.param_type.json_schema_type() }),
        );
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }
    properties.insert("expected_output".into(), json!({ "type": "string" }));
    required.push(Value::String("expected_output".into()));
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Awaits `fut` unless `token` fires first.
async fn guarded<T>(
    token: &CancellationToken,
    fut: impl Future<Output = GradingResult<T>>,
) -> Result<T> {
    tokio::select! {
        _ = token.cancelled() => Err(StencilError::Canceled),
        res = fut => Ok(res?),
    }
}

pub struct Orchestrator {
    store: Store,
    client: Arc<dyn GradingClient>,
    poll: PollConfig,
}

impl Orchestrator {
    pub fn new(store: Store, client: Arc<dyn GradingClient>) -> Self {
        Self {
            store,
            client,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Creates a pending run. Without `version_number` the latest version of
    /// the set's document is graded.
    pub fn create_run(&self, set_id: i64, version_number: Option<u32>) -> Result<EvaluationRun> {
        let set = self.store.get_evaluation_set(set_id)?;
        let version = match version_number {
            Some(n) => self.store.get_version(set.document_id, n)?,
            None => self.store.latest_version(set.document_id)?,
        };
        self.store.insert_run(set.id, version.id)
    }

    pub async fn execute(&self, run_id: i64) -> Result<EvaluationRun> {
        self.execute_with_cancel(run_id, &CancellationToken::new())
            .await
    }

    /// Runs to a terminal state.
    ///
    /// A remote `failed`/`canceled` outcome returns the failed run. Client
    /// errors, timeouts and cancellation mark the run failed with the error's
    /// message and are returned. Cancellation does not stop the remote run.
    pub async fn execute_with_cancel(
        &self,
        run_id: i64,
        token: &CancellationToken,
    ) -> Result<EvaluationRun> {
        let mut run = self.store.get_run(run_id)?;
        run.start(Utc::now())?;
        self.store.save_run(&run)?;
        info!(run_id, set_id = run.evaluation_set_id, "evaluation run started");

        match self.drive(&mut run, token).await {
            Ok(()) => Ok(run),
            Err(err) => {
                let message = err.to_string();
                warn!(run_id, error = %message, "evaluation run failed");
                if !run.status.is_terminal() {
                    run.fail(message, Utc::now())?;
                    if let Err(save_err) = self.store.save_run(&run) {
                        error!(run_id, error = %save_err, "could not record run failure");
                    }
                }
                Err(err)
            }
        }
    }

    async fn drive(&self, run: &mut EvaluationRun, token: &CancellationToken) -> Result<()> {
        let set = self.store.get_evaluation_set(run.evaluation_set_id)?;
        let document = self.store.get_document(set.document_id)?;
        let version = self.store.get_version_by_id(run.version_id)?;
        let params = self.store.list_parameters(set.document_id)?;

        let eval_id = self.ensure_remote_eval(&document, &set, &params, token).await?;

        let cases = self.store.list_test_cases(set.id)?;
        let file = self.upload_cases(&cases, token).await?;
        run.remote_file_id = Some(file.id.clone());
        self.store.save_run(run)?;

        let settings = &version.tracked.settings;
        let request = RunRequest {
            eval_id: eval_id.clone(),
            name: format!("{} - v{}", set.name, version.version_number),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            messages: vec![
                TemplateMessage {
                    role: "system".into(),
                    content: version.tracked.instructions.clone().unwrap_or_default(),
                },
                TemplateMessage {
                    role: "user".into(),
                    content: to_remote_template(&version.tracked.content),
                },
            ],
            file_id: file.id,
        };
        let remote = guarded(token, self.client.create_run(&request)).await?;
        run.remote_run_id = Some(remote.id.clone());
        run.report_url = remote.report_url;
        self.store.save_run(run)?;

        let report = self.poll(&eval_id, &remote.id, token).await?;
        // The in-memory run only turns terminal once the store agrees.
        let mut finished = run.clone();
        match report.status {
            RemoteRunStatus::Completed => {
                let counts = report
                    .result_counts
                    .map(|c| RunCounts {
                        total: c.total,
                        passed: c.passed,
                        failed: c.failed + c.errored,
                    })
                    .unwrap_or_default();
                finished.complete(counts, Utc::now())?;
                info!(
                    run_id = run.id,
                    total = counts.total,
                    passed = counts.passed,
                    "evaluation run completed"
                );
            }
            status => {
                let message = report
                    .error
                    .unwrap_or_else(|| format!("run {}", status.as_str()));
                warn!(run_id = run.id, %message, "remote run did not complete");
                finished.fail(message, Utc::now())?;
            }
        }
        self.store.save_run(&finished)?;
        *run = finished;
        Ok(())
    }

    async fn ensure_remote_eval(
        &self,
        document: &Document,
        set: &EvaluationSet,
        params: &[Parameter],
        token: &CancellationToken,
    ) -> Result<String> {
        if let Some(id) = &set.remote_eval_id {
            return Ok(id.clone());
        }
        let name = format!("{} - {}", document.name, set.name);
        let schema = build_item_schema(params);
        let criterion = grader_for(set.grader_type).criterion(&set.grader_config);
        let remote = guarded(
            token,
            self.client.create_eval(&name, &schema, std::slice::from_ref(&criterion)),
        )
        .await?;
        self.store.set_remote_eval_id(set.id, &remote.id)?;
        debug!(set_id = set.id, eval_id = %remote.id, "created remote eval");
        Ok(remote.id)
    }

    /// Writes one `{"item": ...}` line per case to a temp file and uploads
    /// it. The file is removed when this returns, on every path.
    async fn upload_cases(
        &self,
        cases: &[TestCase],
        token: &CancellationToken,
    ) -> Result<RemoteFile> {
        let mut file = tempfile::Builder::new()
            .prefix("stencil-eval-")
            .suffix(".jsonl")
            .tempfile()?;
        for case in cases {
            serde_json::to_writer(&mut file, &json!({ "item": case.to_item() }))?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        debug!(cases = cases.len(), path = %file.path().display(), "wrote eval data file");
        guarded(token, self.client.upload_file(file.path())).await
    }

    async fn poll(
        &self,
        eval_id: &str,
        run_id: &str,
        token: &CancellationToken,
    ) -> Result<RunReport> {
        for attempt in 1..=self.poll.max_attempts {
            let report = guarded(token, self.client.get_run(eval_id, run_id)).await?;
            debug!(run_id, attempt, status = report.status.as_str(), "polled remote run");
            if matches!(
                report.status,
                RemoteRunStatus::Completed | RemoteRunStatus::Failed | RemoteRunStatus::Canceled
            ) {
                return Ok(report);
            }
            if attempt < self.poll.max_attempts {
                tokio::select! {
                    _ = token.cancelled() => return Err(StencilError::Canceled),
                    _ = tokio::time::sleep(self.poll.interval) => {}
                }
            }
        }
        Err(StencilError::Timeout {
            message: TIMEOUT_MESSAGE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentService, NewDocument};
    use crate::eval::{Criterion, GraderType, NewEvaluationSet, RunStatus};
    use crate::grading::{RemoteEval, RemoteRun};
    use crate::params::ParamType;
    use async_trait::async_trait;
    use std::path::Path;

    struct CompletingClient;

    #[async_trait]
    impl GradingClient for CompletingClient {
        async fn create_eval(
            &self,
            _name: &str,
            _item_schema: &Value,
            _criteria: &[Criterion],
        ) -> GradingResult<RemoteEval> {
            Ok(RemoteEval { id: "eval_1".into() })
        }

        async fn upload_file(&self, _path: &Path) -> GradingResult<RemoteFile> {
            Ok(RemoteFile { id: "file_1".into() })
        }

        async fn create_run(&self, _request: &RunRequest) -> GradingResult<RemoteRun> {
            Ok(RemoteRun {
                id: "run_1".into(),
                report_url: None,
            })
        }

        async fn get_run(&self, _eval_id: &str, _run_id: &str) -> GradingResult<RunReport> {
            Ok(RunReport {
                status: RemoteRunStatus::Completed,
                result_counts: None,
                error: None,
            })
        }
    }

    #[tokio::test]
    async fn unsaved_completion_is_recorded_as_failure() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        let doc = DocumentService::new(store.clone())
            .create(NewDocument::new("Greeting", "Hello {{name}}"))
            .unwrap();
        let set = store
            .insert_evaluation_set(&NewEvaluationSet::new(doc.id, "smoke", GraderType::ExactMatch))
            .unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_completed BEFORE UPDATE ON evaluation_runs
                 WHEN NEW.status = 'completed'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let orch = Orchestrator::new(store.clone(), Arc::new(CompletingClient)).with_poll(
            PollConfig {
                interval: Duration::from_millis(1),
                max_attempts: 2,
            },
        );
        let run = orch.create_run(set.id, None).unwrap();
        let err = orch.execute(run.id).await.unwrap_err();
        assert!(matches!(err, StencilError::Storage(_)));

        let stored = store.get_run(run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message, Some(err.to_string()));
        assert!(stored.error_message.unwrap().contains("disk full"));
    }

    #[test]
    fn item_schema_lists_required_fields() {
        let params = vec![
            Parameter::new("name", ParamType::String),
            Parameter::new("order_count", ParamType::Integer).optional(),
        ];
        let schema = build_item_schema(&params);
        assert_eq!(schema["properties"]["order_count"]["type"], "integer");
        assert_eq!(schema["properties"]["expected_output"]["type"], "string");
        assert_eq!(schema["required"], json!(["name", "expected_output"]));
    }
}
