use crate::error::{ApiError, Result};
use crate::ml::Embedder;
use crate::models::CatalogSchema;
use crate::services::catalog::CatalogStore;
use crate::services::snapshot::CatalogSnapshot;
use crate::services::vector_index::VectorIndex;
use indicatif::ProgressBar;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Build the full catalog snapshot from a tabular source and persist it.
///
/// Pipeline: CSV rows -> normalized records -> per-record searchable text ->
/// embeddings -> flat vector index -> (catalog, index, metadata) triple on
/// disk. The first embedding failure aborts the whole build; a partially
/// embedded catalog is never persisted.
pub async fn index_catalog<E: Embedder>(
    embedder: &E,
    schema: CatalogSchema,
    csv_path: &Path,
    data_dir: &Path,
) -> Result<CatalogSnapshot> {
    info!("Starting catalog indexing from {}", csv_path.display());

    let file = File::open(csv_path)?;
    let (catalog, report) = CatalogStore::load(schema, file)?;

    for skipped in &report.skipped {
        warn!("Skipped row {}: {}", skipped.row, skipped.reason);
    }

    if catalog.is_empty() {
        return Err(ApiError::ValidationError(format!(
            "No valid products found in {}",
            csv_path.display()
        )));
    }

    info!("Generating embeddings for {} products...", catalog.len());
    let progress = ProgressBar::new(catalog.len() as u64);

    let mut vectors = Vec::with_capacity(catalog.len());
    let mut dimension = None;
    for record in catalog.records() {
        let text = record.searchable_text(catalog.schema());
        let embedding = embedder.embed(&text).await?;

        match dimension {
            None => dimension = Some(embedding.len()),
            Some(expected) if embedding.len() != expected => {
                return Err(ApiError::EmbeddingUnavailable(format!(
                    "Embedding for '{}' has dimension {}, expected {}",
                    record.name(),
                    embedding.len(),
                    expected
                )));
            }
            Some(_) => {}
        }

        vectors.push(embedding);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let ids = (0..catalog.len()).collect();
    let index = VectorIndex::build(vectors, ids)?;
    let snapshot = CatalogSnapshot::new(catalog, index)?;
    snapshot.persist(data_dir)?;

    info!(
        "Indexing complete: {} products, dimension {}, {} rows skipped",
        snapshot.catalog().len(),
        snapshot.index().dimension(),
        report.skipped.len()
    );

    Ok(snapshot)
}
