//! Sequential chaining of document renders.
//!
//! Each step renders one document by slug; its output becomes the next
//! step's `input` (and `output`).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;

/// An ordered map of step key to document slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            steps: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn step(mut self, key: impl Into<String>, slug: impl Into<String>) -> Self {
        self.steps.insert(key.into(), slug.into());
        self
    }

    /// `(key, slug)` pairs in execution order: numeric keys ascending, then
    /// the remaining keys lexicographically.
    pub fn ordered_steps(&self) -> Vec<(&str, &str)> {
        let mut steps: Vec<(&str, &str)> = self
            .steps
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        steps.sort_by(|a, b| compare_keys(a.0, b.0));
        steps
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Renders one step. Implemented by [`crate::DocumentService`].
pub trait StepRenderer {
    fn render_step(&self, slug: &str, variables: &BTreeMap<String, Value>) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub key: String,
    pub slug: String,
    pub input: String,
    pub output: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub output: String,
    pub steps: Vec<StepRecord>,
    /// Variables left after the last step.
    pub variables: BTreeMap<String, Value>,
    pub total_elapsed: Duration,
}

pub struct WorkflowChain<'a> {
    workflow: &'a Workflow,
    renderer: &'a dyn StepRenderer,
}

fn set_io(vars: &mut BTreeMap<String, Value>, output: &str) {
    vars.insert("input".into(), Value::String(output.to_string()));
    vars.insert("output".into(), Value::String(output.to_string()));
}

impl<'a> WorkflowChain<'a> {
    pub fn new(workflow: &'a Workflow, renderer: &'a dyn StepRenderer) -> Self {
        Self { workflow, renderer }
    }

    /// Runs every step, passing all variables through. With no steps the
    /// initial input is returned unchanged.
    pub fn execute(
        &self,
        initial_input: &str,
        mut variables: BTreeMap<String, Value>,
    ) -> Result<String> {
        variables.insert("input".into(), Value::String(initial_input.to_string()));
        let mut current = initial_input.to_string();
        for (key, slug) in self.workflow.ordered_steps() {
            debug!(workflow = %self.workflow.name, step = key, slug, "running step");
            current = self.renderer.render_step(slug, &variables)?;
            set_io(&mut variables, &current);
        }
        Ok(current)
    }

    /// Runs every step and records each one.
    ///
    /// Only the first step renders with the caller's variables; every later
    /// step receives just `input` and `output` from its predecessor. The
    /// accumulated variables keep everything after step 1 and are cut down
    /// to `input`/`output` after each later step.
    pub fn execute_with_steps(
        &self,
        initial_input: &str,
        variables: BTreeMap<String, Value>,
    ) -> Result<ChainReport> {
        let started = Instant::now();
        let mut accumulated = variables;
        accumulated.insert("input".into(), Value::String(initial_input.to_string()));

        let mut current = initial_input.to_string();
        let mut records = Vec::new();
        for (index, (key, slug)) in self.workflow.ordered_steps().into_iter().enumerate() {
            let step_started = Instant::now();
            let output = if index == 0 {
                self.renderer.render_step(slug, &accumulated)?
            } else {
                let mut io = BTreeMap::new();
                set_io(&mut io, &current);
                self.renderer.render_step(slug, &io)?
            };

            if index > 0 {
                accumulated.clear();
            }
            set_io(&mut accumulated, &output);

            records.push(StepRecord {
                key: key.to_string(),
                slug: slug.to_string(),
                input: std::mem::replace(&mut current, output.clone()),
                output,
                elapsed: step_started.elapsed(),
            });
        }

        let total_elapsed = started.elapsed();
        info!(
            workflow = %self.workflow.name,
            steps = records.len(),
            elapsed_ms = total_elapsed.as_millis() as u64,
            "workflow finished"
        );
        Ok(ChainReport {
            output: current,
            steps: records,
            variables: accumulated,
            total_elapsed,
        })
    }
}
