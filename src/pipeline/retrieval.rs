//! Stage 2: candidate retrieval.
//!
//! Embeds the extracted keywords and runs a k-nearest-neighbor search over
//! the catalog index, converting distances into bounded similarity scores.
//! Retrieval never returns an empty candidate list while the index has
//! rows: when the threshold filters everything out, the full unfiltered
//! list is returned so downstream stages always see the best available
//! guess.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::model::{CandidateEntry, SupplyClass};
use crate::services::Embedder;
use crate::vector::{Similarity, VectorIndex};

pub struct Retrieval {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl Retrieval {
    /// Creates the stage, validating that the embedder's dimension matches
    /// the index artifacts. A mismatch is a startup error, not a
    /// per-request one.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> PipelineResult<Self> {
        index.validate_dimension(embedder.dimension())?;
        Ok(Self { index, embedder })
    }

    /// Retrieves up to `top_k` candidates for the given keywords.
    ///
    /// Keywords are joined in order into a single query string; the order
    /// affects the embedding, so the ranking from query understanding
    /// matters. Results are ordered by ascending distance.
    pub async fn retrieve(
        &self,
        keywords: &[String],
        top_k: usize,
        similarity_threshold: f32,
    ) -> PipelineResult<Vec<CandidateEntry>> {
        let query_text = keywords.join(" ");
        info!(query = %query_text, top_k, "Searching catalog");

        let query_vector = self.embedder.embed(&query_text).await?;
        let hits = self.index.search(&query_vector, top_k)?;

        let mut candidates = Vec::with_capacity(hits.len());
        for (row, distance) in hits {
            let entry = self.index.entry(row)?;
            let similarity = Similarity::from_distance(distance).map_err(PipelineError::Vector)?;
            candidates.push(CandidateEntry {
                item_code: entry.item_code,
                name: entry.name.clone(),
                definition: entry.definition.clone(),
                supply_group: entry.supply_group,
                supply_class: SupplyClass::new(entry.supply_group, entry.supply_class.clone()),
                similarity: similarity.get(),
                distance,
            });
        }

        let filtered: Vec<CandidateEntry> = candidates
            .iter()
            .filter(|c| c.similarity >= similarity_threshold)
            .cloned()
            .collect();

        info!(
            retrieved = candidates.len(),
            above_threshold = filtered.len(),
            threshold = similarity_threshold,
            "Retrieval complete"
        );
        for c in filtered.iter().take(3) {
            debug!(
                item_code = c.item_code,
                name = %c.name,
                similarity = c.similarity,
                "Candidate"
            );
        }

        // Never return empty while the index has rows: a weak match beats
        // no match for the downstream fallback logic.
        if filtered.is_empty() {
            Ok(candidates)
        } else {
            Ok(filtered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use crate::vector::{CatalogEntry, VectorDimension, VectorStorageWriter, write_catalog};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Deterministic embedder mapping known keywords onto fixed axes.
    struct StubEmbedder {
        dimension: VectorDimension,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            let mut v = vec![0.0; self.dimension.get()];
            if text.contains("turbine") {
                v[0] = 1.0;
            }
            if text.contains("capacitor") {
                v[1] = 1.0;
            }
            Ok(v)
        }

        fn dimension(&self) -> VectorDimension {
            self.dimension
        }
    }

    fn entry(item_code: u32, name: &str) -> CatalogEntry {
        CatalogEntry {
            item_code,
            name: name.to_string(),
            definition: format!("Definition of {name}"),
            supply_group: 28,
            supply_class: "2840".to_string(),
        }
    }

    fn build_stage(dir: &TempDir, rows: &[(Vec<f32>, CatalogEntry)]) -> Retrieval {
        let dimension = VectorDimension::new(2).unwrap();
        let mut writer = VectorStorageWriter::create(dir.path(), dimension).unwrap();
        for (vector, _) in rows {
            writer.append(vector).unwrap();
        }
        writer.finish().unwrap();
        let entries: Vec<CatalogEntry> = rows.iter().map(|(_, e)| e.clone()).collect();
        write_catalog(dir.path(), &entries).unwrap();

        let index = Arc::new(VectorIndex::open(dir.path()).unwrap());
        Retrieval::new(index, Arc::new(StubEmbedder { dimension })).unwrap()
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_similarity() {
        let dir = TempDir::new().unwrap();
        let stage = build_stage(
            &dir,
            &[
                (vec![0.0, 1.0], entry(100, "CAPACITOR,FIXED")),
                (vec![1.0, 0.0], entry(200, "TURBINE,MODULE")),
            ],
        );

        let candidates = stage
            .retrieve(&keywords(&["turbine", "module"]), 5, 0.0)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].item_code, 200);
        assert!(candidates[0].similarity > candidates[1].similarity);
        // Exact hit: distance 0 means similarity 1.0
        assert_eq!(candidates[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn test_threshold_filters_weak_matches() {
        let dir = TempDir::new().unwrap();
        let stage = build_stage(
            &dir,
            &[
                (vec![1.0, 0.0], entry(200, "TURBINE,MODULE")),
                (vec![0.0, 1.0], entry(100, "CAPACITOR,FIXED")),
            ],
        );

        // The capacitor row sits at squared distance 2 from the turbine
        // query, similarity 1/3, which is below 0.6
        let candidates = stage
            .retrieve(&keywords(&["turbine"]), 5, 0.6)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item_code, 200);
    }

    #[tokio::test]
    async fn test_never_empty_when_all_below_threshold() {
        let dir = TempDir::new().unwrap();
        let stage = build_stage(
            &dir,
            &[
                (vec![0.0, 1.0], entry(100, "CAPACITOR,FIXED")),
                (vec![0.2, 0.9], entry(101, "CAPACITOR,VARIABLE")),
            ],
        );

        // Threshold 1.0 excludes everything, so the full list comes back
        let candidates = stage
            .retrieve(&keywords(&["turbine"]), 5, 1.0)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let stage = build_stage(&dir, &[]);

        let candidates = stage
            .retrieve(&keywords(&["anything"]), 5, 0.6)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_a_startup_error() {
        let dir = TempDir::new().unwrap();
        let dimension = VectorDimension::new(2).unwrap();
        let mut writer = VectorStorageWriter::create(dir.path(), dimension).unwrap();
        writer.append(&[0.0, 1.0]).unwrap();
        writer.finish().unwrap();
        write_catalog(dir.path(), &[entry(1, "ONLY")]).unwrap();

        let index = Arc::new(VectorIndex::open(dir.path()).unwrap());
        let embedder = Arc::new(StubEmbedder {
            dimension: VectorDimension::new(4).unwrap(),
        });
        assert!(Retrieval::new(index, embedder).is_err());
    }
}
