//! Alert catalog: alert name -> metadata, loaded once from a JSON object file.
//!
//! Entry shape is not interpreted here; reply composers decide what to read from it.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// Default catalog location, relative to the working directory.
pub const DEFAULT_CATALOG_PATH: &str = "resources/alerts.json";

/// Read-only lookup of alert metadata keyed by alert name.
#[derive(Debug, Clone, Default)]
pub struct AlertCatalog {
    entries: Map<String, Value>,
}

impl AlertCatalog {
    /// Load from a JSON file whose top level is an object keyed by alert name.
    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading alert catalog from {}", path.display()))?;
        let catalog = Self::from_json(&s)
            .with_context(|| format!("parsing alert catalog from {}", path.display()))?;
        log::info!(
            "loaded {} alert(s) from catalog {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(s)? {
            Value::Object(entries) => Ok(Self { entries }),
            other => anyhow::bail!(
                "alert catalog must be a JSON object keyed by alert name, got {}",
                json_kind(&other)
            ),
        }
    }

    pub fn get(&self, alert: &str) -> Option<&Value> {
        self.entries.get(alert)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "assist-catalog-test-{}-{}",
            std::process::id(),
            contents.len()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("alerts.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_object_keyed_by_alert_name() {
        let path = temp_file(r#"{"HighCPU": {"runbook": "https://runbooks/cpu"}, "Disk Space Low": {}}"#);
        let catalog = AlertCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("HighCPU").and_then(|v| v.get("runbook")).and_then(|v| v.as_str()),
            Some("https://runbooks/cpu")
        );
        assert!(catalog.get("Disk Space Low").is_some());
        assert!(catalog.get("Unknown").is_none());
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = AlertCatalog::from_json("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("assist-catalog-test-missing/none.json");
        let err = AlertCatalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("reading alert catalog"));
    }

    #[test]
    fn empty_object_is_an_empty_catalog() {
        let catalog = AlertCatalog::from_json("{}").unwrap();
        assert!(catalog.is_empty());
    }
}
