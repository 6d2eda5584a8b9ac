//! ABOUTME: Pure Rust HNSW cosine-similarity index, one instance per KB.
//! ABOUTME: Deletions are tombstoned rather than removed (hnsw_rs has no delete).

use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::DistCosine;
use kbforge_core::error::KbError;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Tuning knobs for the index, mirroring the parameters a production HNSW
/// graph is built with: connectivity (`m`), build-time search depth
/// (`ef_construction`), and query-time search depth (`ef_search`).
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    pub max_nb_connection: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub max_elements: usize,
    pub max_layer: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            max_nb_connection: 16,
            ef_construction: 200,
            ef_search: 64,
            max_elements: 100_000,
            max_layer: 16,
        }
    }
}

/// A neighbor returned from a [`VectorIndex::search`] call.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub row_id: i64,
    pub score: f32,
}

/// Per-KB approximate nearest neighbor index over cosine similarity.
///
/// Row ids map 1:1 onto `hnsw_rs` internal usize ids via an append-only
/// counter; deleted rows are tombstoned and filtered out of search results
/// rather than removed from the graph, since `hnsw_rs` does not support
/// point removal.
pub struct VectorIndex {
    dimension: usize,
    inner: RwLock<Hnsw<'static, f32, DistCosine>>,
    tombstones: RwLock<HashSet<i64>>,
}

impl VectorIndex {
    #[must_use]
    pub fn new(dimension: usize, config: &VectorIndexConfig) -> Self {
        let inner = Hnsw::new(
            config.max_nb_connection,
            config.max_elements,
            config.max_layer,
            config.ef_construction,
            DistCosine {},
        );
        Self {
            dimension,
            inner: RwLock::new(inner),
            tombstones: RwLock::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Inserts a vector under `row_id`. Row ids must be non-negative and are
    /// cast directly to the `hnsw_rs` internal usize id space.
    ///
    /// # Errors
    /// Returns [`KbError::InvalidInput`] on dimension mismatch or a negative id.
    pub fn insert(&self, row_id: i64, vector: &[f32]) -> Result<(), KbError> {
        if vector.len() != self.dimension {
            return Err(KbError::invalid_input(format!(
                "expected {}-dim vector, got {}",
                self.dimension,
                vector.len()
            )));
        }
        let id = usize::try_from(row_id)
            .map_err(|_| KbError::invalid_input("row id must be non-negative"))?;
        self.inner.read().insert((vector, id));
        Ok(())
    }

    /// Marks `row_id` as deleted so it is excluded from future search results.
    pub fn tombstone(&self, row_id: i64) {
        self.tombstones.write().insert(row_id);
    }

    /// Returns up to `k` nearest neighbors to `query` by cosine similarity,
    /// highest similarity first, excluding tombstoned rows.
    ///
    /// # Errors
    /// Returns [`KbError::InvalidInput`] on dimension mismatch.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, KbError> {
        if query.len() != self.dimension {
            return Err(KbError::invalid_input(format!(
                "expected {}-dim query vector, got {}",
                self.dimension,
                query.len()
            )));
        }
        let tombstones = self.tombstones.read();
        // Overfetch to compensate for tombstoned hits being filtered out below.
        let overfetch = k.saturating_add(tombstones.len()).max(k);
        let raw = self
            .inner
            .read()
            .search(query, overfetch, VectorIndexConfig::default().ef_search);

        let mut out = Vec::with_capacity(k);
        for neighbor in raw {
            let row_id = i64::try_from(neighbor.d_id).unwrap_or(i64::MAX);
            if tombstones.contains(&row_id) {
                continue;
            }
            out.push(Neighbor {
                row_id,
                // `DistCosine` yields `distance = 1 - cos_sim`, so
                // `1 - distance` is raw cosine similarity in [-1, 1]; remap
                // to [0, 1] so callers never see a negative score.
                score: ((1.0 - neighbor.distance) + 1.0) / 2.0,
            });
            if out.len() == k {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_and_finds_nearest_neighbor() {
        let index = VectorIndex::new(4, &VectorIndexConfig::default());
        index.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        index.insert(3, &[0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row_id, 1);
    }

    #[test]
    fn rejects_dimension_mismatch_on_insert() {
        let index = VectorIndex::new(4, &VectorIndexConfig::default());
        assert!(index.insert(1, &[1.0, 0.0]).is_err());
    }

    #[test]
    fn rejects_dimension_mismatch_on_search() {
        let index = VectorIndex::new(4, &VectorIndexConfig::default());
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn tombstoned_rows_are_excluded_from_search() {
        let index = VectorIndex::new(4, &VectorIndexConfig::default());
        index.insert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(2, &[0.95, 0.05, 0.0, 0.0]).unwrap();
        index.tombstone(1);

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert!(results.iter().all(|n| n.row_id != 1));
    }

    #[test]
    fn anti_parallel_vectors_still_score_within_zero_one() {
        let index = VectorIndex::new(2, &VectorIndexConfig::default());
        index.insert(1, &[-1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= 0.0 && results[0].score <= 1.0, "score {} out of range", results[0].score);
    }
}
