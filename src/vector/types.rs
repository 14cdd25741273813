//! Type-safe wrappers and core types for the vector index.
//!
//! This module provides newtypes and error types following the project's
//! strict type safety guidelines, preventing primitive obsession in the
//! retrieval path.

use thiserror::Error;

/// Default vector dimension for catalog embeddings (nomic-embed-text model).
pub const VECTOR_DIMENSION_768: usize = 768;

/// Type-safe wrapper for positional row identifiers.
///
/// Rows in the vector artifact and the metadata catalog are aligned by
/// position, so ordinal zero is valid (the first row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u32);

impl RowId {
    /// Creates a new `RowId`.
    #[must_use]
    pub const fn new(row: u32) -> Self {
        Self(row)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the row as a usize for slice indexing.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for similarity scores.
///
/// Scores are normalized to the range [0.0, 1.0] where:
/// - 1.0 indicates perfect similarity
/// - 0.0 indicates no similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity(f32);

impl Similarity {
    /// Creates a new `Similarity` with validation.
    ///
    /// Returns an error if the score is not in the range [0.0, 1.0] or is NaN.
    pub fn new(value: f32) -> Result<Self, VectorError> {
        if value.is_nan() {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Similarity cannot be NaN",
            });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Similarity must be in range [0.0, 1.0]",
            });
        }
        Ok(Self(value))
    }

    /// Converts a non-negative distance into a bounded similarity score.
    ///
    /// Uses `1 / (1 + d)`, which is monotonically decreasing in the distance
    /// and bounded in (0.0, 1.0]. Negative or NaN distances are rejected.
    pub fn from_distance(distance: f32) -> Result<Self, VectorError> {
        if distance.is_nan() || distance < 0.0 {
            return Err(VectorError::InvalidScore {
                value: distance,
                reason: "Distance must be a non-negative number",
            });
        }
        Ok(Self(1.0 / (1.0 + distance)))
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Similarity {}

impl PartialOrd for Similarity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Similarity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NaN is rejected at construction, so total_cmp agrees with the
        // numeric order here
        self.0.total_cmp(&other.0)
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent mismatches
/// between the embedding service and the persisted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates the standard 768-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_768() -> Self {
        Self(VECTOR_DIMENSION_768)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur during vector index operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure the embedding model matches the one used to build the index"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid score value: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error("Invalid index format: {0}\nSuggestion: Rebuild the index artifacts")]
    InvalidFormat(String),

    #[error(
        "Invalid storage version: expected {expected}, got {actual}\nSuggestion: Rebuild the index artifacts with the current version"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error(
        "Row {row} out of bounds for index with {rows} rows\nSuggestion: The index and catalog artifacts may be misaligned"
    )]
    RowOutOfBounds { row: u32, rows: usize },

    #[error(
        "Catalog has {catalog_rows} rows but vector storage has {vector_rows}\nSuggestion: Regenerate both artifacts from the same source run"
    )]
    RowCountMismatch {
        catalog_rows: usize,
        vector_rows: usize,
    },

    #[error("Catalog error at line {line}: {reason}")]
    CatalogParse { line: usize, reason: String },
}
