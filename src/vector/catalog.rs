//! Row-aligned metadata catalog for the vector index.
//!
//! The catalog is a JSON-Lines artifact produced by the same offline job
//! that writes the embedding matrix. Line `i` describes matrix row `i`;
//! the loader enforces nothing about ordering beyond reading the lines in
//! file order, so both artifacts must come from the same build.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::de_string_or_number;
use crate::vector::types::{RowId, VectorError};

/// File name of the catalog artifact inside the index directory.
pub const CATALOG_FILE: &str = "catalog.jsonl";

/// One catalog row: the code triple plus name and definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_code: u32,
    pub name: String,
    pub definition: String,
    pub supply_group: u16,
    /// Source catalogs store this sometimes as a number, sometimes as
    /// text; it is normalized to a string on load.
    #[serde(deserialize_with = "de_string_or_number")]
    pub supply_class: String,
}

/// In-memory catalog, loaded once at startup and read-only afterwards.
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Loads the catalog artifact from the given index directory.
    pub fn open(index_dir: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = index_dir.as_ref().join(CATALOG_FILE);

        if !path.exists() {
            return Err(VectorError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Catalog artifact not found: {}", path.display()),
            )));
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut entries = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: CatalogEntry =
                serde_json::from_str(&line).map_err(|e| VectorError::CatalogParse {
                    line: line_no + 1,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Returns the entry describing the given matrix row.
    pub fn entry(&self, row: RowId) -> Result<&CatalogEntry, VectorError> {
        self.entries
            .get(row.index())
            .ok_or(VectorError::RowOutOfBounds {
                row: row.get(),
                rows: self.entries.len(),
            })
    }

    /// Number of catalog rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the catalog holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes the catalog artifact, one JSON object per line in row order.
///
/// Used by the offline index build and by test fixtures, paired with
/// [`crate::vector::VectorStorageWriter`].
pub fn write_catalog(
    index_dir: impl AsRef<Path>,
    entries: &[CatalogEntry],
) -> Result<(), VectorError> {
    std::fs::create_dir_all(index_dir.as_ref())?;
    let path = index_dir.as_ref().join(CATALOG_FILE);
    let mut writer = BufWriter::new(File::create(path)?);

    for entry in entries {
        let line = serde_json::to_string(entry)
            .map_err(|e| VectorError::InvalidFormat(format!("Catalog serialization: {e}")))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}
