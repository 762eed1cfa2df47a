use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stock_core::{ProviderRegistry, ProviderSpec};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read provider registry {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("provider registry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("provider registry lists no providers")]
    Empty,
    #[error("provider registry entry {index} has an empty id")]
    EmptyId { index: usize },
    #[error("provider id {0} appears more than once")]
    DuplicateId(String),
    #[error("provider {id} has a non-http url: {url}")]
    InvalidUrl { id: String, url: String },
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    id: String,
    url: String,
    #[serde(default)]
    name: Option<String>,
}

pub fn load_registry(path: &Path) -> Result<ProviderRegistry, RegistryError> {
    let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_registry(&text)
}

/// Parses a JSON array of `{id, url, name?}` entries, keeping file order.
pub fn parse_registry(text: &str) -> Result<ProviderRegistry, RegistryError> {
    let entries: Vec<ProviderEntry> = serde_json::from_str(text)?;
    if entries.is_empty() {
        return Err(RegistryError::Empty);
    }

    let mut seen = HashSet::new();
    let mut providers = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let id = entry.id.trim().to_string();
        if id.is_empty() {
            return Err(RegistryError::EmptyId { index });
        }
        if !seen.insert(id.clone()) {
            return Err(RegistryError::DuplicateId(id));
        }

        let url = entry.url.trim().to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RegistryError::InvalidUrl { id, url });
        }

        let name = entry
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.clone());

        providers.push(ProviderSpec {
            id: id.into(),
            url,
            name,
        });
    }

    Ok(ProviderRegistry::new(providers))
}
