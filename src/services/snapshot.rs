use crate::error::{ApiError, Result};
use crate::models::{CatalogSchema, ProductRecord};
use crate::services::catalog::CatalogStore;
use crate::services::vector_index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::info;

const CATALOG_FILE: &str = "catalog.json";
const INDEX_FILE: &str = "vector_index.json";
const META_FILE: &str = "index_meta.json";

/// Cross-checking metadata persisted alongside the catalog and index.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub record_count: usize,
    pub dimension: usize,
}

/// One immutable, internally-consistent (catalog, vector index) pair.
///
/// The record at position `i` of the catalog owns the vector stored under id
/// `i` in the index; construction refuses anything that breaks that
/// alignment. Mutating the catalog means building a whole new snapshot.
pub struct CatalogSnapshot {
    catalog: CatalogStore,
    index: VectorIndex,
}

impl CatalogSnapshot {
    pub fn new(catalog: CatalogStore, index: VectorIndex) -> Result<Self> {
        if catalog.len() != index.len() {
            return Err(ApiError::IndexInconsistency(format!(
                "Catalog holds {} records but the vector index holds {}",
                catalog.len(),
                index.len()
            )));
        }

        for (position, &id) in index.ids().iter().enumerate() {
            if position != id {
                return Err(ApiError::IndexInconsistency(format!(
                    "Index id {} found at position {}; ids must be positional",
                    id, position
                )));
            }
        }

        Ok(Self { catalog, index })
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Load the persisted (catalog, index, metadata) triple. Any missing
    /// artifact or size/dimension disagreement is fatal; a torn triple is
    /// never repaired in place.
    pub fn load(dir: &Path, schema: CatalogSchema) -> Result<Self> {
        let records = read_catalog(&dir.join(CATALOG_FILE))?;
        let index = VectorIndex::load(&dir.join(INDEX_FILE))?;
        let meta = read_metadata(&dir.join(META_FILE))?;

        if records.len() != meta.record_count {
            return Err(ApiError::IndexInconsistency(format!(
                "Catalog holds {} records but metadata expects {}",
                records.len(),
                meta.record_count
            )));
        }
        if index.dimension() != meta.dimension {
            return Err(ApiError::IndexInconsistency(format!(
                "Index dimension {} does not match metadata dimension {}",
                index.dimension(),
                meta.dimension
            )));
        }

        let snapshot = Self::new(CatalogStore::from_records(schema, records), index)?;
        info!(
            "Loaded catalog snapshot with {} products from {}",
            snapshot.catalog.len(),
            dir.display()
        );
        Ok(snapshot)
    }

    /// Persist the triple. Every artifact is written to a temporary file
    /// first and the renames happen only after all writes succeeded, so a
    /// failed rebuild never leaves a half-written triple behind.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let staged = [
            stage(dir, CATALOG_FILE, self.catalog.records())?,
            stage(dir, INDEX_FILE, self.index())?,
            stage(
                dir,
                META_FILE,
                &IndexMetadata {
                    record_count: self.catalog.len(),
                    dimension: self.index.dimension(),
                },
            )?,
        ];

        for (temp, path) in staged {
            fs::rename(temp, path)?;
        }

        info!(
            "Persisted catalog snapshot ({} products) to {}",
            self.catalog.len(),
            dir.display()
        );
        Ok(())
    }
}

/// Holder of the active snapshot. Readers clone the `Arc` out and work on a
/// consistent view; a rebuild swaps the pointer in one short write-lock
/// while in-flight requests keep their old snapshot.
pub struct SnapshotStore {
    active: RwLock<Arc<CatalogSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            active: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn swap(&self, snapshot: CatalogSnapshot) {
        let mut active = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = Arc::new(snapshot);
    }
}

fn read_catalog(path: &Path) -> Result<Vec<ProductRecord>> {
    let file = File::open(path).map_err(|e| {
        ApiError::IndexInconsistency(format!("Catalog not found at {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn read_metadata(path: &Path) -> Result<IndexMetadata> {
    let file = File::open(path).map_err(|e| {
        ApiError::IndexInconsistency(format!(
            "Index metadata not found at {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn stage<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<(PathBuf, PathBuf)> {
    let path = dir.join(name);
    let temp = dir.join(format!("{}.tmp", name));
    let file = File::create(&temp)?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok((temp, path))
}
