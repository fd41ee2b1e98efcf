use crate::error::{ApiError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Flat inner-product index over L2-normalized vectors.
///
/// Every vector is normalized at build time and queries are normalized on
/// entry, so the reported distance is `1 - cosine similarity` and ascending
/// order means most similar first. The id mapping is stored inside the index
/// so the two can never be persisted or loaded separately.
///
/// The index is batch-built and immutable; catalog changes always rebuild
/// it from scratch together with the catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    ids: Vec<usize>,
    vectors: Array2<f32>,
}

impl VectorIndex {
    /// Construct an index over all vectors at once. `ids` must match
    /// `vectors` 1:1 and all vectors must share one dimension.
    pub fn build(vectors: Vec<Vec<f32>>, ids: Vec<usize>) -> Result<Self> {
        if vectors.len() != ids.len() {
            return Err(ApiError::IndexInconsistency(format!(
                "{} vectors but {} ids",
                vectors.len(),
                ids.len()
            )));
        }

        if vectors.is_empty() {
            return Ok(Self {
                dimension: 0,
                ids,
                vectors: Array2::zeros((0, 0)),
            });
        }

        let dimension = vectors[0].len();
        let mut matrix = Array2::zeros((vectors.len(), dimension));
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(ApiError::IndexInconsistency(format!(
                    "Vector {} has dimension {}, expected {}",
                    row,
                    vector.len(),
                    dimension
                )));
            }
            let mut normalized = Array1::from_vec(vector.clone());
            normalize(&mut normalized);
            matrix.row_mut(row).assign(&normalized);
        }

        Ok(Self {
            dimension,
            ids,
            vectors: matrix,
        })
    }

    /// Up to `k` nearest neighbors as `(id, distance)`, ascending by
    /// distance. An empty index yields an empty result rather than an error.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if vector.len() != self.dimension {
            return Err(ApiError::IndexInconsistency(format!(
                "Query vector has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }

        let mut query = Array1::from_vec(vector.to_vec());
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .rows()
            .into_iter()
            .zip(self.ids.iter())
            .map(|(row, &id)| (id, 1.0 - row.dot(&query)))
            .collect();

        // Ties break on id so results are fully deterministic.
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ApiError::IndexInconsistency(format!(
                "Vector index not found at {}: {}",
                path.display(),
                e
            ))
        })?;
        let index: Self = serde_json::from_reader(BufReader::new(file))?;

        if index.ids.len() != index.vectors.nrows() {
            return Err(ApiError::IndexInconsistency(format!(
                "Index holds {} vectors but {} ids",
                index.vectors.nrows(),
                index.ids.len()
            )));
        }

        info!(
            "Loaded vector index: {} vectors, dimension {}",
            index.len(),
            index.dimension
        );
        Ok(index)
    }
}

fn normalize(vector: &mut Array1<f32>) {
    let norm = vector.dot(vector).sqrt();
    if norm > 0.0 {
        vector.mapv_inplace(|v| v / norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.7, 0.7, 0.0],
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_query_orders_by_ascending_distance() {
        let index = sample_index();
        let results = index.query(&[1.0, 0.1, 0.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 0, "exact-direction vector should rank first");
        assert_eq!(results[1].0, 2);
        assert_eq!(results[2].0, 1);
        assert!(results[0].1 <= results[1].1 && results[1].1 <= results[2].1);
    }

    #[test]
    fn test_query_returns_fewer_than_k_when_index_is_small() {
        let index = sample_index();
        let results = index.query(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_empty_index_yields_empty_results() {
        let index = VectorIndex::build(vec![], vec![]).unwrap();
        assert!(index.query(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_ids_are_rejected() {
        let result = VectorIndex::build(vec![vec![1.0, 0.0]], vec![0, 1]);
        assert!(matches!(result, Err(ApiError::IndexInconsistency(_))));
    }

    #[test]
    fn test_mixed_dimensions_are_rejected() {
        let result = VectorIndex::build(vec![vec![1.0, 0.0], vec![1.0]], vec![0, 1]);
        assert!(matches!(result, Err(ApiError::IndexInconsistency(_))));
    }

    #[test]
    fn test_query_dimension_mismatch_is_an_error() {
        let index = sample_index();
        assert!(index.query(&[1.0, 0.0], 2).is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let index = sample_index();
        index.save(&path).unwrap();
        let loaded = VectorIndex::load(&path).unwrap();

        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dimension(), index.dimension());
        assert_eq!(
            loaded.query(&[0.0, 1.0, 0.0], 1).unwrap(),
            index.query(&[0.0, 1.0, 0.0], 1).unwrap()
        );
    }

    #[test]
    fn test_missing_index_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = VectorIndex::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ApiError::IndexInconsistency(_))));
    }
}
