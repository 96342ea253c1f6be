//! HTTP grading client for stencil evaluation runs.
//!
//! Implements [`stencil_core::GradingClient`] against an OpenAI-compatible
//! evals API:
//!
//! - `POST /evals` registers an eval with an item schema and criteria
//! - `POST /files` uploads the JSONL data file (`purpose=evals`)
//! - `POST /evals/{id}/runs` starts a run over the uploaded file
//! - `GET /evals/{id}/runs/{run_id}` reports status and result counts
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stencil_core::{Orchestrator, Store};
//! use stencil_evals::{EvalsClient, EvalsConfig};
//!
//! # async fn example(run_id: i64) -> anyhow::Result<()> {
//! let client = EvalsClient::new(EvalsConfig::from_env().with_api_key("sk-..."))?;
//! let store = Store::open(std::path::Path::new("stencil.db"))?;
//! let run = Orchestrator::new(store, Arc::new(client)).execute(run_id).await?;
//! println!("{} passed of {}", run.counts.passed, run.counts.total);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `STENCIL_EVALS_URL` | API base URL (default: `https://api.openai.com/v1`) |
//! | `STENCIL_EVALS_API_KEY` | Bearer API key |
//! | `STENCIL_EVALS_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `STENCIL_EVALS_MAX_RETRIES` | Max retries for transient failures (default: 3) |

pub mod client;
pub mod config;

pub use client::{criterion_json, EvalsClient, EVALS_USER_AGENT};
pub use config::EvalsConfig;
