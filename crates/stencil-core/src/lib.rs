//! Versioned prompt templates with typed parameters, rendering, workflow
//! chaining and remote evaluation orchestration.
//!
//! # Layout
//!
//! - [`template`]: placeholder extraction, substitution and type inference
//! - [`params`]: typed parameters (casting, validation, sync with content)
//! - [`document`]: documents with an immutable, append-only version history
//! - [`render`]: rendering a document or version into a [`RenderedOutput`]
//! - [`eval`]: evaluation sets, graders and the remote run orchestrator
//! - [`workflow`]: sequential chaining of document renders
//! - [`storage`]: SQLite persistence enforcing uniqueness and immutability
//!
//! # Quick Start
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use stencil_core::{DocumentService, NewDocument, RenderOverrides, Store};
//!
//! # fn example() -> stencil_core::Result<()> {
//! let store = Store::memory()?;
//! store.init_schema()?;
//! let docs = DocumentService::new(store);
//!
//! let doc = docs.create(NewDocument::new("Greeting", "Hello {{name}}"))?;
//! let mut values = BTreeMap::new();
//! values.insert("name".to_string(), serde_json::json!("Alice"));
//! let out = docs.render(doc.id, &values, &RenderOverrides::default(), None)?;
//! assert_eq!(out.content, "Hello Alice");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod grading;
pub mod params;
pub mod render;
pub mod storage;
pub mod template;
pub mod value;
pub mod workflow;

pub use config::{load_config, ConfigError, StencilConfig};
pub use document::{
    Document, DocumentService, DocumentStatus, DocumentUpdate, ModelSettings, NewDocument,
    TrackedFields, Version, VersionDiff,
};
pub use error::{Result, StencilError, ValidationError};
pub use eval::{
    EvaluationRun, EvaluationSet, GraderType, NewEvaluationSet, Orchestrator, PollConfig,
    RunCounts, RunStatus, TestCase, TestCaseRecord,
};
pub use grading::{GradingClient, GradingError, GradingResult};
pub use params::{ParamType, Parameter, ValidationRules};
pub use render::{RenderError, RenderOverrides, RenderedOutput};
pub use storage::Store;
pub use template::{extract, substitute, Placeholder};
pub use value::ParamValue;
pub use workflow::{ChainReport, StepRecord, StepRenderer, Workflow, WorkflowChain};
