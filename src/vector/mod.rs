//! Vector index functionality for catalog retrieval.
//!
//! This module provides read-only storage and exact nearest-neighbor search
//! over the precomputed catalog embeddings, paired with the row-aligned
//! metadata catalog.
//!
//! # Architecture
//! The index is built offline: an embedding matrix artifact plus a
//! JSON-Lines catalog whose line order matches the matrix rows exactly.
//! At runtime the matrix is memory-mapped and scanned with squared-L2
//! distance; the catalog resolves matched rows into full entries.

mod catalog;
mod index;
mod storage;
mod types;

// Re-export core types for public API
pub use catalog::{CATALOG_FILE, Catalog, CatalogEntry, write_catalog};
pub use index::{VectorIndex, l2_squared};
pub use storage::{MmapVectorStorage, VECTOR_FILE, VectorStorageWriter};
pub use types::{
    RowId, Similarity, VECTOR_DIMENSION_768, VectorDimension, VectorError,
};
