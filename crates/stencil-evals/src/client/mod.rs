//! Grading client for the OpenAI-compatible evals API.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use stencil_core::eval::{Criterion, CriterionKind};
use stencil_core::grading::{
    GradingClient, GradingError, GradingResult, RemoteEval, RemoteFile, RemoteRun,
    RemoteRunStatus, ResultCounts, RunReport, RunRequest,
};
use tracing::{debug, info};

use crate::config::EvalsConfig;

mod http;

use http::HttpBackend;

/// User agent for grading requests.
pub const EVALS_USER_AGENT: &str = concat!("stencil-evals/", env!("CARGO_PKG_VERSION"));

const SAMPLE_OUTPUT: &str = "{{ sample.output_text }}";
const EXPECTED_OUTPUT: &str = "{{ item.expected_output }}";

/// HTTP grading client.
#[derive(Debug, Clone)]
pub struct EvalsClient {
    http: HttpBackend,
}

impl EvalsClient {
    pub fn new(config: EvalsConfig) -> GradingResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(EVALS_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| http::network_error("failed to create HTTP client", e))?;

        // Normalize base URL (remove trailing slash)
        let base_url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            http: HttpBackend {
                client,
                base_url,
                config,
            },
        })
    }

    pub fn from_env() -> GradingResult<Self> {
        Self::new(EvalsConfig::from_env())
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunCreated {
    id: String,
    #[serde(default)]
    report_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunStatusResponse {
    status: String,
    #[serde(default)]
    result_counts: Option<ResultCounts>,
    #[serde(default)]
    error: Option<Value>,
}

/// Remote error payloads arrive as `{"code", "message"}`, a bare string, or
/// null.
fn run_error_message(error: Option<Value>) -> Option<String> {
    match error? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Wire form of a testing criterion.
pub fn criterion_json(criterion: &Criterion) -> Value {
    match &criterion.kind {
        CriterionKind::Equals => json!({
            "type": "string_check",
            "name": criterion.name,
            "input": SAMPLE_OUTPUT,
            "reference": EXPECTED_OUTPUT,
            "operation": "eq",
        }),
        CriterionKind::Contains => json!({
            "type": "string_check",
            "name": criterion.name,
            "input": SAMPLE_OUTPUT,
            "reference": format!("%{}%", EXPECTED_OUTPUT),
            "operation": "like",
        }),
        CriterionKind::Matches { pattern } => {
            let literal = serde_json::to_string(pattern).unwrap_or_else(|_| "\"\"".to_string());
            json!({
                "type": "python",
                "name": criterion.name,
                "source": format!(
                    "import re\n\ndef grade(sample, item) -> float:\n    \
                     return 1.0 if re.search({}, sample[\"output_text\"]) else 0.0\n",
                    literal
                ),
                "pass_threshold": 1.0,
            })
        }
    }
}

fn run_body(request: &RunRequest) -> Value {
    let mut sampling = serde_json::Map::new();
    if let Some(t) = request.temperature {
        sampling.insert("temperature".into(), json!(t));
    }
    if let Some(m) = request.max_tokens {
        sampling.insert("max_completion_tokens".into(), json!(m));
    }
    json!({
        "name": request.name,
        "data_source": {
            "type": "completions",
            "model": request.model,
            "input_messages": {
                "type": "template",
                "template": request.messages,
            },
            "source": { "type": "file_id", "id": request.file_id },
            "sampling_params": sampling,
        },
    })
}

#[async_trait]
impl GradingClient for EvalsClient {
    async fn create_eval(
        &self,
        name: &str,
        item_schema: &Value,
        criteria: &[Criterion],
    ) -> GradingResult<RemoteEval> {
        let body = json!({
            "name": name,
            "data_source_config": {
                "type": "custom",
                "item_schema": item_schema,
                "include_sample_schema": true,
            },
            "testing_criteria": criteria.iter().map(criterion_json).collect::<Vec<_>>(),
        });
        let created: IdResponse = self
            .http
            .send_json("/evals", |client, url| client.post(url).json(&body))
            .await?;
        info!(eval_id = %created.id, name, "created remote eval");
        Ok(RemoteEval { id: created.id })
    }

    async fn upload_file(&self, path: &Path) -> GradingResult<RemoteFile> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GradingError::File {
                message: format!("failed to read {}: {}", path.display(), e),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.jsonl".to_string());

        let uploaded: IdResponse = self
            .http
            .send_json("/files", |client, url| {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = Form::new().text("purpose", "evals").part("file", part);
                client.post(url).multipart(form)
            })
            .await?;
        debug!(file_id = %uploaded.id, size = bytes.len(), "uploaded eval data");
        Ok(RemoteFile { id: uploaded.id })
    }

    async fn create_run(&self, request: &RunRequest) -> GradingResult<RemoteRun> {
        let body = run_body(request);
        let path = format!("/evals/{}/runs", request.eval_id);
        let created: RunCreated = self
            .http
            .send_json(&path, |client, url| client.post(url).json(&body))
            .await?;
        info!(run_id = %created.id, eval_id = %request.eval_id, "created remote run");
        Ok(RemoteRun {
            id: created.id,
            report_url: created.report_url,
        })
    }

    async fn get_run(&self, eval_id: &str, run_id: &str) -> GradingResult<RunReport> {
        let path = format!("/evals/{}/runs/{}", eval_id, run_id);
        let resp: RunStatusResponse = self
            .http
            .send_json(&path, |client, url| client.get(url))
            .await?;
        Ok(RunReport {
            status: RemoteRunStatus::parse(&resp.status),
            result_counts: resp.result_counts,
            error: run_error_message(resp.error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_core::grading::TemplateMessage;

    #[test]
    fn equals_criterion_compares_with_expected_output() {
        let c = Criterion {
            name: "exact_match".into(),
            kind: CriterionKind::Equals,
        };
        let v = criterion_json(&c);
        assert_eq!(v["type"], "string_check");
        assert_eq!(v["operation"], "eq");
        assert_eq!(v["reference"], "{{ item.expected_output }}");
    }

    #[test]
    fn regex_criterion_embeds_pattern_literal() {
        let c = Criterion {
            name: "regex".into(),
            kind: CriterionKind::Matches {
                pattern: r#"^Hello "\w+""#.into(),
            },
        };
        let v = criterion_json(&c);
        assert_eq!(v["type"], "python");
        let source = v["source"].as_str().unwrap();
        assert!(source.contains(r#"re.search("^Hello \"\\w+\"""#));
    }

    #[test]
    fn run_body_omits_unset_sampling_params() {
        let req = RunRequest {
            eval_id: "eval_1".into(),
            name: "smoke - v2".into(),
            model: "gpt-4o-mini".into(),
            temperature: None,
            max_tokens: Some(100),
            messages: vec![TemplateMessage {
                role: "user".into(),
                content: "Hi {{ item.name }}".into(),
            }],
            file_id: "file_1".into(),
        };
        let body = run_body(&req);
        let ds = &body["data_source"];
        assert_eq!(ds["source"]["id"], "file_1");
        assert_eq!(ds["sampling_params"], json!({"max_completion_tokens": 100}));
        assert_eq!(ds["input_messages"]["template"][0]["role"], "user");
    }

    #[test]
    fn run_error_shapes() {
        assert_eq!(
            run_error_message(Some(json!({"code": "x", "message": "boom"}))),
            Some("boom".into())
        );
        assert_eq!(run_error_message(Some(json!("bad"))), Some("bad".into()));
        assert_eq!(run_error_message(Some(Value::Null)), None);
        assert_eq!(run_error_message(None), None);
    }
}
