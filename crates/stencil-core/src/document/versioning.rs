use tracing::debug;

use super::{TrackedFields, Version};
use crate::error::Result;
use crate::storage::Store;

pub const INITIAL_VERSION_LABEL: &str = "Initial version";

/// `"Updated content, temperature"`
pub fn change_label(changed: &[&str]) -> String {
    format!("Updated {}", changed.join(", "))
}

pub fn restore_label(version_number: u32) -> String {
    format!("Restored from version {}", version_number)
}

/// Appends a version when `new` differs from `old` in any tracked field.
///
/// Must be called after the document update itself is persisted. Returns the
/// created version, or `None` when nothing tracked changed.
pub fn maybe_create_version(
    store: &Store,
    document_id: i64,
    old: &TrackedFields,
    new: &TrackedFields,
) -> Result<Option<Version>> {
    let changed = old.changed_fields(new);
    if changed.is_empty() {
        debug!(document_id, "no tracked field changed, skipping version");
        return Ok(None);
    }
    let version = store.insert_version(document_id, new, &change_label(&changed))?;
    debug!(
        document_id,
        version = version.version_number,
        fields = ?changed,
        "created version"
    );
    Ok(Some(version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(change_label(&["content", "model"]), "Updated content, model");
        assert_eq!(restore_label(3), "Restored from version 3");
    }
}
