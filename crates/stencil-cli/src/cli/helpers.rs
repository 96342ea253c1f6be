use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde_json::Value;
use stencil_core::{load_config, DocumentService, StencilConfig, Store};

/// Loaded config plus an open store, shared by the store-backed commands.
pub struct Workspace {
    pub config: StencilConfig,
    pub store: Store,
}

impl Workspace {
    /// `--db` wins over the config's database path. A missing config file
    /// means defaults.
    pub fn open(config_path: &Path, db: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = if config_path.exists() {
            load_config(config_path)?
        } else {
            StencilConfig::default()
        };
        let path = db.unwrap_or_else(|| config.database.clone());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let store = Store::open(&path)?;
        store.init_schema()?;
        Ok(Self { config, store })
    }

    pub fn documents(&self) -> DocumentService {
        DocumentService::new(self.store.clone())
    }
}

pub fn find_doc_id(docs: &DocumentService, slug: &str) -> anyhow::Result<i64> {
    Ok(docs.get_by_slug(slug)?.id)
}

/// Parses `key=value` pairs. Values that parse as JSON keep their type;
/// anything else is a string.
pub fn parse_vars(pairs: &[String]) -> anyhow::Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("expected KEY=VALUE, got {:?}", pair);
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        out.insert(key.trim().to_string(), value);
    }
    Ok(out)
}

pub fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vars_keep_json_types() {
        let vars = parse_vars(&[
            "name=Alice".to_string(),
            "count=3".to_string(),
            "tags=[\"a\"]".to_string(),
            "note=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(vars["name"], json!("Alice"));
        assert_eq!(vars["count"], json!(3));
        assert_eq!(vars["tags"], json!(["a"]));
        assert_eq!(vars["note"], json!("a=b"));
    }

    #[test]
    fn rejects_missing_equals() {
        assert!(parse_vars(&["oops".to_string()]).is_err());
    }
}
