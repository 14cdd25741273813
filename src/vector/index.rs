//! Read-only nearest-neighbor index over the catalog embeddings.
//!
//! The index pairs the memory-mapped embedding matrix with the row-aligned
//! metadata catalog. It is loaded once at process start and shared across
//! requests; there is no runtime mutation, so concurrent searches need no
//! locking.

use std::path::Path;

use tracing::info;

use crate::vector::catalog::{Catalog, CatalogEntry};
use crate::vector::storage::MmapVectorStorage;
use crate::vector::types::{RowId, VectorDimension, VectorError};

/// Squared Euclidean distance between two equal-length vectors.
///
/// Matches the FAISS `IndexFlatL2` contract the artifacts were built
/// against: distances are squared L2, not the root.
#[must_use]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Immutable nearest-neighbor search structure over catalog embeddings.
#[derive(Debug)]
pub struct VectorIndex {
    storage: MmapVectorStorage,
    catalog: Catalog,
}

impl VectorIndex {
    /// Opens both artifacts from the index directory.
    ///
    /// Fails when either artifact is missing or malformed, or when the row
    /// counts disagree. These are process-initialization failures, not
    /// per-request errors.
    pub fn open(index_dir: impl AsRef<Path>) -> Result<Self, VectorError> {
        let storage = MmapVectorStorage::open(&index_dir)?;
        let catalog = Catalog::open(&index_dir)?;

        if storage.row_count() != catalog.len() {
            return Err(VectorError::RowCountMismatch {
                catalog_rows: catalog.len(),
                vector_rows: storage.row_count(),
            });
        }

        info!(
            rows = storage.row_count(),
            dimension = storage.dimension().get(),
            "Loaded vector index"
        );

        Ok(Self { storage, catalog })
    }

    /// Validates that the configured embedding dimension matches the
    /// artifact header. A mismatch is a fatal configuration error at
    /// startup.
    pub fn validate_dimension(&self, expected: VectorDimension) -> Result<(), VectorError> {
        if expected != self.storage.dimension() {
            return Err(VectorError::DimensionMismatch {
                expected: expected.get(),
                actual: self.storage.dimension().get(),
            });
        }
        Ok(())
    }

    /// Exact k-nearest-neighbor search.
    ///
    /// Scans every row, computing squared-L2 distance to the query, and
    /// returns up to `k` rows ordered by ascending distance.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(RowId, f32)>, VectorError> {
        self.storage.dimension().validate_vector(query)?;

        let mut hits: Vec<(RowId, f32)> = Vec::with_capacity(self.storage.row_count());
        for row in 0..self.storage.row_count() as u32 {
            let id = RowId::new(row);
            let vector = self.storage.row(id)?;
            hits.push((id, l2_squared(query, vector)));
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);

        Ok(hits)
    }

    /// Returns the catalog entry for a matrix row.
    pub fn entry(&self, row: RowId) -> Result<&CatalogEntry, VectorError> {
        self.catalog.entry(row)
    }

    /// Number of indexed rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.row_count()
    }

    /// True when the index holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.row_count() == 0
    }

    /// Vector dimension of the index.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.storage.dimension()
    }
}
