//! HTTP layer: status mapping and retry.
//!
//! This is the only place for status code handling. client/mod.rs never
//! interprets status codes.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stencil_core::grading::{GradingError, GradingResult};
use tracing::{debug, warn};

use crate::config::EvalsConfig;

pub(crate) fn network_error(context: &str, err: reqwest::Error) -> GradingError {
    GradingError::Network {
        message: format!("{}: {}", context, err),
    }
}

/// HTTP backend for making requests (holds reqwest client and config).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) config: EvalsConfig,
}

impl HttpBackend {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request built by `build` and decodes a JSON body. `build` is
    /// called again for each retry.
    pub(crate) async fn send_json<T, F>(&self, path: &str, build: F) -> GradingResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        let response = self.request(path, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GradingError::InvalidResponse {
                message: format!("failed to decode {}: {}", path, e),
            })
    }

    pub(crate) async fn request<F>(&self, path: &str, build: F) -> GradingResult<Response>
    where
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        use rand::Rng;

        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            let result = self.request_once(path, &build).await;

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let backoff = match &e {
                        GradingError::RateLimited {
                            retry_after: Some(retry_after),
                        } => {
                            let capped = (*retry_after).min(Duration::from_secs(30));
                            let base_ms = capped.as_millis() as u64;
                            let jitter_factor: f64 =
                                rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                            let jittered_ms = ((base_ms as f64) * jitter_factor).round() as u64;
                            Duration::from_millis(jittered_ms.max(100))
                        }
                        _ => {
                            let base_backoff = Duration::from_secs(1 << retries);
                            let base_backoff = base_backoff.min(Duration::from_secs(30));
                            let jittered_ms =
                                rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                            Duration::from_millis(jittered_ms.max(10))
                        }
                    };

                    warn!(
                        error = %e,
                        path,
                        retry = retries,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once<F>(&self, path: &str, build: &F) -> GradingResult<Response>
    where
        F: Fn(&reqwest::Client, String) -> RequestBuilder,
    {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(GradingError::Authentication {
                message: "no API key configured (set STENCIL_EVALS_API_KEY)".to_string(),
            });
        };

        let response = build(&self.client, self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| network_error("request failed", e))?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "grading service response");

        match status.as_u16() {
            200..=299 => Ok(response),

            401 | 403 => Err(GradingError::Authentication {
                message: error_message(response).await,
            }),

            404 => Err(GradingError::NotFound {
                resource: path.to_string(),
            }),

            429 => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);

                Err(GradingError::RateLimited { retry_after })
            }

            code => Err(GradingError::Api {
                status: code,
                message: error_message(response).await,
            }),
        }
    }
}

/// `error.message` from a JSON error body, else the raw body, else the
/// status line.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) if !body.trim().is_empty() => body,
        _ => return status.to_string(),
    };
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body)
}
