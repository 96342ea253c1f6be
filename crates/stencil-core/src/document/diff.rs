use serde::Serialize;
use similar::TextDiff;

use super::Version;

/// Differences between two versions of the same document.
#[derive(Debug, Clone, Serialize)]
pub struct VersionDiff {
    pub from_version: u32,
    pub to_version: u32,
    pub changed_fields: Vec<&'static str>,
    /// Unified line diff of the content; empty when content is equal.
    pub content_diff: String,
}

impl VersionDiff {
    pub fn is_empty(&self) -> bool {
        self.changed_fields.is_empty()
    }
}

pub fn diff_versions(from: &Version, to: &Version) -> VersionDiff {
    let changed_fields = from.tracked.changed_fields(&to.tracked);
    let content_diff = if changed_fields.contains(&"content") {
        let from_label = format!("v{}", from.version_number);
        let to_label = format!("v{}", to.version_number);
        TextDiff::from_lines(from.tracked.content.as_str(), to.tracked.content.as_str())
            .unified_diff()
            .context_radius(3)
            .header(&from_label, &to_label)
            .to_string()
    } else {
        String::new()
    };

    VersionDiff {
        from_version: from.version_number,
        to_version: to.version_number,
        changed_fields,
        content_diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TrackedFields;
    use chrono::Utc;

    fn version(n: u32, content: &str) -> Version {
        Version {
            id: n as i64,
            document_id: 1,
            version_number: n,
            tracked: TrackedFields::new(content),
            change_description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn content_change_produces_unified_diff() {
        let d = diff_versions(&version(1, "Hello\nWorld\n"), &version(2, "Hello\nThere\n"));
        assert_eq!(d.changed_fields, vec!["content"]);
        assert!(d.content_diff.contains("--- v1"));
        assert!(d.content_diff.contains("-World"));
        assert!(d.content_diff.contains("+There"));
    }

    #[test]
    fn identical_versions_have_empty_diff() {
        let d = diff_versions(&version(1, "same"), &version(2, "same"));
        assert!(d.is_empty());
        assert!(d.content_diff.is_empty());
    }
}
