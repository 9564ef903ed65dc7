// # Local Override Configuration
//
// Section/key configuration read from a JSON file on the host. Values here
// take precedence over instance and project metadata.
//
// ## File Format
//
// ```json
// {
//   "wsfc": { "enable": "true", "addresses": "10.0.0.10,10.0.0.11" },
//   "addressManager": { "disable": false }
// }
// ```
//
// Scalar values of any JSON type are accepted and stringified; `null`,
// arrays and objects are treated as absent.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::traits::ConfigSource;

/// Local override configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl LocalConfig {
    /// An empty configuration (every lookup is absent)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(section, key, value)` triples
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let mut config = Self::default();
        for (section, key, value) in entries {
            config.set(section, key, value);
        }
        config
    }

    /// Set a single value
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let root: serde_json::Value = serde_json::from_str(json)?;
        let Some(object) = root.as_object() else {
            return Err(Error::config("Local config must be a JSON object of sections"));
        };

        let mut config = Self::default();
        for (section, keys) in object {
            let Some(keys) = keys.as_object() else {
                tracing::warn!("Ignoring local config section {:?}: not an object", section);
                continue;
            };
            for (key, value) in keys {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => continue,
                };
                config.set(section, key, value);
            }
        }

        Ok(config)
    }

    /// Load from a file; a missing file yields an empty configuration
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_json(&content).map_err(|e| {
                Error::config(format!("Failed to parse local config {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Local config {} does not exist", path.display());
                Ok(Self::empty())
            }
            Err(e) => Err(Error::config(format!(
                "Failed to read local config {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

impl ConfigSource for LocalConfig {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }
}
