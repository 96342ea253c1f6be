//! Documents and their immutable version history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod diff;
mod service;
mod versioning;

pub use diff::{diff_versions, VersionDiff};
pub use service::DocumentService;
pub use versioning::{change_label, maybe_create_version, restore_label, INITIAL_VERSION_LABEL};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Document lifecycle status. Not a tracked field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Model settings carried by documents and version snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// The fields whose changes produce a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedFields {
    pub content: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub settings: ModelSettings,
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl TrackedFields {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            instructions: None,
            settings: ModelSettings::default(),
            metadata: empty_object(),
        }
    }

    /// Names of tracked fields that differ, in a fixed order.
    pub fn changed_fields(&self, other: &TrackedFields) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.content != other.content {
            changed.push("content");
        }
        if self.instructions != other.instructions {
            changed.push("instructions");
        }
        if self.settings.model != other.settings.model {
            changed.push("model");
        }
        if self.settings.temperature != other.settings.temperature {
            changed.push("temperature");
        }
        if self.settings.max_tokens != other.settings.max_tokens {
            changed.push("max_tokens");
        }
        if self.metadata != other.metadata {
            changed.push("metadata");
        }
        changed
    }
}

/// A named template with its current, editable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub status: DocumentStatus,
    pub tracked: TrackedFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write-once snapshot of a document's tracked fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    pub document_id: i64,
    pub version_number: u32,
    pub tracked: TrackedFields,
    pub change_description: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`DocumentService::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(flatten)]
    pub tracked: TrackedFields,
}

impl NewDocument {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            status: DocumentStatus::default(),
            tracked: TrackedFields::new(content),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.tracked.instructions = Some(instructions.into());
        self
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.tracked.settings = settings;
        self
    }
}

/// Partial update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub name: Option<String>,
    pub status: Option<DocumentStatus>,
    pub content: Option<String>,
    pub instructions: Option<Option<String>>,
    pub model: Option<String>,
    pub temperature: Option<Option<f64>>,
    pub max_tokens: Option<Option<u32>>,
    pub metadata: Option<Value>,
}

impl DocumentUpdate {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub(crate) fn apply(self, doc: &mut Document) {
        if let Some(name) = self.name {
            doc.name = name;
        }
        if let Some(status) = self.status {
            doc.status = status;
        }
        let t = &mut doc.tracked;
        if let Some(content) = self.content {
            t.content = content;
        }
        if let Some(instructions) = self.instructions {
            t.instructions = instructions;
        }
        if let Some(model) = self.model {
            t.settings.model = model;
        }
        if let Some(temperature) = self.temperature {
            t.settings.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            t.settings.max_tokens = max_tokens;
        }
        if let Some(metadata) = self.metadata {
            t.metadata = metadata;
        }
    }
}

/// Lowercase, ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Customer Welcome Email!"), "customer-welcome-email");
        assert_eq!(slugify("  --Q&A-- "), "q-a");
        assert_eq!(slugify("***"), "document");
    }

    #[test]
    fn changed_fields_order() {
        let a = TrackedFields::new("x");
        let mut b = a.clone();
        b.metadata = json!({"k": 1});
        b.settings.temperature = Some(0.2);
        b.content = "y".into();
        assert_eq!(a.changed_fields(&b), vec!["content", "temperature", "metadata"]);
        assert!(a.changed_fields(&a.clone()).is_empty());
    }

    #[test]
    fn update_only_touches_given_fields() {
        let now = Utc::now();
        let mut doc = Document {
            id: 1,
            name: "n".into(),
            slug: "n".into(),
            status: DocumentStatus::Draft,
            tracked: NewDocument::new("n", "c").with_instructions("sys").tracked,
            created_at: now,
            updated_at: now,
        };
        DocumentUpdate {
            max_tokens: Some(Some(256)),
            ..Default::default()
        }
        .apply(&mut doc);
        assert_eq!(doc.tracked.settings.max_tokens, Some(256));
        assert_eq!(doc.tracked.instructions.as_deref(), Some("sys"));
        assert_eq!(doc.tracked.content, "c");
    }
}
