//! Named filter sets over one in-memory store, as loaded by the server and
//! the CLI.

use crate::fixtures::{load_file, LoadError};
use crate::mem::InMemoryStore;
use docfilter_core::{FilterSet, FilterSetConfig, IndexDocument};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One entry of the configuration file: the index a filter set searches
/// plus its declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDeclaration {
    pub index: String,
    #[serde(flatten)]
    pub config: FilterSetConfig,
}

/// Set name -> declaration.
pub type CatalogConfig = BTreeMap<String, SetDeclaration>;

#[derive(Clone)]
pub struct Catalog {
    store: InMemoryStore,
    sets: BTreeMap<String, FilterSet>,
}

impl Catalog {
    /// Builds every declared set against `store`. Indices named by a set
    /// are created when missing so empty stores still answer searches.
    pub fn new(store: InMemoryStore, config: CatalogConfig) -> Self {
        let backend = Arc::new(store.clone());
        let sets = config
            .into_iter()
            .map(|(name, decl)| {
                store.create_index(&decl.index);
                let document = Arc::new(IndexDocument::new(decl.index, backend.clone()));
                (name, FilterSet::new(decl.config, document))
            })
            .collect();
        Catalog { store, sets }
    }

    /// Reads the JSON configuration at `config` and, when given, NDJSON
    /// fixtures into a fresh store.
    pub fn load(config: &Path, fixtures: Option<&Path>) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(config).map_err(|source| LoadError::Io {
            path: config.to_path_buf(),
            source,
        })?;
        let parsed: CatalogConfig =
            serde_json::from_str(&raw).map_err(|source| LoadError::Json {
                path: config.to_path_buf(),
                source,
            })?;
        let store = InMemoryStore::new();
        if let Some(path) = fixtures {
            load_file(&store, path)?;
        }
        let catalog = Catalog::new(store, parsed);
        info!(sets = ?catalog.names().collect::<Vec<_>>(), "catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&FilterSet> {
        self.sets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }
}
