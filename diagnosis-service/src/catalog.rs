//! Disease name to id lookup used to enrich prediction responses.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub disease_name: String,
    pub disease_id: String,
    #[serde(default)]
    pub specialty_id: Option<String>,
}

/// Ids resolved for a prediction. On a miss both ids are `None` and `id_error` says why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogLookup {
    pub disease_id: Option<String>,
    pub specialty_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiseaseCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl DiseaseCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.disease_name.to_lowercase(), entry))
            .collect();
        Self { entries }
    }

    /// Reads a JSON array of [`CatalogEntry`].
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read disease catalog {}", path.display()))?;
        let entries: Vec<CatalogEntry> = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse disease catalog {}", path.display()))?;
        info!(path = %path.display(), diseases = entries.len(), "Loaded disease catalog");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of the first name found in the catalog.
    pub fn resolve(&self, names: &[&str]) -> CatalogLookup {
        match names
            .iter()
            .find_map(|name| self.entries.get(&name.to_lowercase()))
        {
            Some(entry) => CatalogLookup {
                disease_id: Some(entry.disease_id.clone()),
                specialty_id: entry.specialty_id.clone(),
                id_error: None,
            },
            None => CatalogLookup {
                disease_id: None,
                specialty_id: None,
                id_error: Some(format!("Disease(s) {names:?} not found in database")),
            },
        }
    }
}
