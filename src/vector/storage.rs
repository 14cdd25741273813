//! Memory-mapped storage for the precomputed embedding matrix.
//!
//! The matrix is produced by an offline job and is strictly read-only at
//! runtime. Rows are positional: row `i` of the matrix corresponds to line
//! `i` of the metadata catalog, and retrieval depends on that alignment.
//!
//! # Storage Format
//!
//! A simple binary format optimized for sequential scans:
//! - Header (16 bytes): magic, version, dimension, row count
//! - Rows: contiguous f32 arrays in little-endian format, row-major
//!
//! There are no per-row identifiers; alignment with the catalog is by
//! position alone.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::vector::types::{RowId, VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes identifying a vector matrix artifact.
const MAGIC_BYTES: &[u8; 4] = b"AVEC";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// File name of the matrix artifact inside the index directory.
pub const VECTOR_FILE: &str = "catalog.vec";

/// Read-only memory-mapped view over the embedding matrix artifact.
///
/// The mmap is established once at load and shared for the process
/// lifetime; concurrent reads need no locking since no writer exists
/// after load.
pub struct MmapVectorStorage {
    path: PathBuf,
    mmap: Mmap,
    dimension: VectorDimension,
    row_count: usize,
}

impl MmapVectorStorage {
    /// Opens the matrix artifact from the given index directory.
    ///
    /// Validates the magic bytes, format version, and that the file length
    /// matches the header's dimension and row count exactly.
    pub fn open(index_dir: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = index_dir.as_ref().join(VECTOR_FILE);

        if !path.exists() {
            return Err(VectorError::Storage(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Vector artifact not found: {}", path.display()),
            )));
        }

        let file = File::open(&path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let (version, dimension, row_count) = Self::read_header(&mmap)?;

        if version != STORAGE_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: version,
            });
        }

        let expected_len = HEADER_SIZE + row_count * dimension.get() * BYTES_PER_F32;
        if mmap.len() != expected_len {
            return Err(VectorError::InvalidFormat(format!(
                "File length {} does not match header ({row_count} rows x {} dims)",
                mmap.len(),
                dimension.get()
            )));
        }

        Ok(Self {
            path,
            mmap,
            dimension,
            row_count,
        })
    }

    /// Returns the embedding vector stored at the given row.
    pub fn row(&self, row: RowId) -> Result<&[f32], VectorError> {
        if row.index() >= self.row_count {
            return Err(VectorError::RowOutOfBounds {
                row: row.get(),
                rows: self.row_count,
            });
        }

        let dim = self.dimension.get();
        let offset = HEADER_SIZE + row.index() * dim * BYTES_PER_F32;
        let bytes = &self.mmap[offset..offset + dim * BYTES_PER_F32];

        // Rows are written little-endian; on little-endian targets the mmap
        // bytes can be reinterpreted directly.
        let (prefix, floats, suffix) = unsafe { bytes.align_to::<f32>() };
        if !prefix.is_empty() || !suffix.is_empty() || floats.len() != dim {
            return Err(VectorError::InvalidFormat(
                "Vector rows are not aligned to f32 boundaries".to_string(),
            ));
        }

        Ok(floats)
    }

    /// Returns an iterator over all rows in position order.
    pub fn rows(&self) -> impl Iterator<Item = (RowId, &[f32])> {
        (0..self.row_count as u32).filter_map(|i| {
            let id = RowId::new(i);
            self.row(id).ok().map(|v| (id, v))
        })
    }

    /// Returns the number of rows stored.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn read_header(mmap: &Mmap) -> Result<(u32, VectorDimension, usize), VectorError> {
        if mmap.len() < HEADER_SIZE {
            return Err(VectorError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        if &mmap[0..4] != MAGIC_BYTES {
            return Err(VectorError::InvalidFormat(
                "Invalid magic bytes".to_string(),
            ));
        }

        let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);

        let dim_value = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]);
        let dimension = VectorDimension::new(dim_value as usize)?;

        let row_count = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

        Ok((version, dimension, row_count))
    }
}

impl std::fmt::Debug for MmapVectorStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapVectorStorage")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .field("row_count", &self.row_count)
            .finish()
    }
}

/// Writer producing the matrix artifact.
///
/// Used by the offline index build and by test fixtures. Rows must be
/// appended in the same order as the catalog lines they describe.
pub struct VectorStorageWriter {
    writer: BufWriter<File>,
    dimension: VectorDimension,
    row_count: u32,
}

impl VectorStorageWriter {
    /// Creates the artifact in the given index directory, truncating any
    /// previous version.
    pub fn create(
        index_dir: impl AsRef<Path>,
        dimension: VectorDimension,
    ) -> Result<Self, VectorError> {
        std::fs::create_dir_all(index_dir.as_ref())?;
        let path = index_dir.as_ref().join(VECTOR_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);

        writer.write_all(MAGIC_BYTES)?;
        writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
        writer.write_all(&(dimension.get() as u32).to_le_bytes())?;
        // Row count is patched in finish()
        writer.write_all(&0u32.to_le_bytes())?;

        Ok(Self {
            writer,
            dimension,
            row_count: 0,
        })
    }

    /// Appends one row to the matrix.
    pub fn append(&mut self, vector: &[f32]) -> Result<RowId, VectorError> {
        self.dimension.validate_vector(vector)?;

        for &value in vector {
            self.writer.write_all(&value.to_le_bytes())?;
        }

        let row = RowId::new(self.row_count);
        self.row_count += 1;
        Ok(row)
    }

    /// Flushes the data and patches the row count into the header.
    pub fn finish(mut self) -> Result<(), VectorError> {
        use std::io::{Seek, SeekFrom};

        self.writer.flush()?;
        let mut file = self.writer.into_inner().map_err(|e| {
            VectorError::Storage(io::Error::other(format!("Flush failed: {e}")))
        })?;

        file.seek(SeekFrom::Start(12))?;
        file.write_all(&self.row_count.to_le_bytes())?;
        file.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_matrix(dir: &Path, dim: usize, rows: &[Vec<f32>]) {
        let dimension = VectorDimension::new(dim).unwrap();
        let mut writer = VectorStorageWriter::create(dir, dimension).unwrap();
        for row in rows {
            writer.append(row).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_write_and_open() {
        let temp_dir = TempDir::new().unwrap();
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        write_matrix(temp_dir.path(), 3, &rows);

        let storage = MmapVectorStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.row_count(), 2);
        assert_eq!(storage.dimension().get(), 3);

        assert_eq!(storage.row(RowId::new(0)).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(storage.row(RowId::new(1)).unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_row_out_of_bounds() {
        let temp_dir = TempDir::new().unwrap();
        write_matrix(temp_dir.path(), 2, &[vec![1.0, 2.0]]);

        let storage = MmapVectorStorage::open(temp_dir.path()).unwrap();
        assert!(matches!(
            storage.row(RowId::new(1)),
            Err(VectorError::RowOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        assert!(MmapVectorStorage::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(VECTOR_FILE), b"NOPE0000XXXXYYYY").unwrap();
        assert!(matches!(
            MmapVectorStorage::open(temp_dir.path()),
            Err(VectorError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let temp_dir = TempDir::new().unwrap();
        write_matrix(temp_dir.path(), 4, &[vec![1.0; 4], vec![2.0; 4]]);

        // Chop off the tail of the last row
        let path = temp_dir.path().join(VECTOR_FILE);
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 4]).unwrap();

        assert!(matches!(
            MmapVectorStorage::open(temp_dir.path()),
            Err(VectorError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_writer_validates_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let dimension = VectorDimension::new(3).unwrap();
        let mut writer = VectorStorageWriter::create(temp_dir.path(), dimension).unwrap();
        assert!(writer.append(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_rows_iterator_order() {
        let temp_dir = TempDir::new().unwrap();
        let rows = vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]];
        write_matrix(temp_dir.path(), 2, &rows);

        let storage = MmapVectorStorage::open(temp_dir.path()).unwrap();
        let collected: Vec<(u32, Vec<f32>)> = storage
            .rows()
            .map(|(id, v)| (id.get(), v.to_vec()))
            .collect();
        assert_eq!(
            collected,
            vec![
                (0, vec![0.0, 1.0]),
                (1, vec![2.0, 3.0]),
                (2, vec![4.0, 5.0]),
            ]
        );
    }
}
