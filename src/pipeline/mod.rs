//! Three-stage classification pipeline.
//!
//! [`Codifier`] wires query understanding, retrieval, and selection
//! together and turns every request into a uniform
//! [`ClassificationResult`]. Stage failures never escape as panics or
//! bare errors: they become a failed result with the query stamped on.

pub mod retrieval;
pub mod selection;
pub mod understanding;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::Settings;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{Classification, ClassificationResult};
use crate::services::{ChatClient, Embedder, HttpChatClient, HttpEmbedder};
use crate::vector::{VectorDimension, VectorIndex};

pub use retrieval::Retrieval;
pub use selection::{Selection, SelectionStrategy};
pub use understanding::QueryUnderstanding;

/// End-to-end classifier over a prepared catalog index.
pub struct Codifier {
    understanding: QueryUnderstanding,
    retrieval: Retrieval,
    selection: Selection,
    settings: Arc<Settings>,
}

impl Codifier {
    /// Assembles a pipeline from pre-built parts.
    ///
    /// Fails fast when the embedder's dimension does not match the index
    /// artifacts; a mismatch at query time would silently rank garbage.
    pub fn new(
        settings: Arc<Settings>,
        index: Arc<VectorIndex>,
        chat: Arc<dyn ChatClient>,
        embedder: Arc<dyn Embedder>,
    ) -> PipelineResult<Self> {
        let retrieval = Retrieval::new(index, embedder)?;
        Ok(Self {
            understanding: QueryUnderstanding::new(chat.clone()),
            retrieval,
            selection: Selection::new(chat, settings.translation.clone()),
            settings,
        })
    }

    /// Opens the index and connects the HTTP services described by the
    /// settings.
    pub fn from_settings(settings: Settings) -> PipelineResult<Self> {
        let api_key = settings
            .chat_api_key()
            .map_err(|reason| PipelineError::Config { reason })?;

        let call_timeout = Duration::from_secs(settings.service.call_timeout_secs);

        let chat: Arc<dyn ChatClient> = Arc::new(HttpChatClient::new(
            &settings.chat.base_url,
            api_key,
            &settings.chat.model,
            call_timeout,
            settings.service.max_retries,
        )?);

        let dimension = VectorDimension::new(settings.embedding.dimension)?;
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(
            &settings.embedding.base_url,
            &settings.embedding.model,
            dimension,
            call_timeout,
            settings.service.max_retries,
        )?);

        let index = Arc::new(VectorIndex::open(&settings.index.dir)?);
        info!(
            entries = index.len(),
            dir = %settings.index.dir.display(),
            "Catalog index loaded"
        );

        Self::new(Arc::new(settings), index, chat, embedder)
    }

    /// Classifies one item description.
    ///
    /// Always returns a result; failures are reported through the
    /// `success`/`error` fields rather than an `Err`. The whole request
    /// runs under the configured deadline.
    pub async fn codify(&self, description: &str) -> ClassificationResult {
        // The original text is stamped onto the result for traceability;
        // the stages work on the trimmed form.
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return ClassificationResult::failure(description, "description must not be empty");
        }

        let deadline = Duration::from_secs(self.settings.service.request_timeout_secs);
        match tokio::time::timeout(deadline, self.run(trimmed)).await {
            Ok(Ok(classification)) => ClassificationResult::ok(description, classification),
            Ok(Err(e)) => {
                error!(query = description, "Classification failed: {e}");
                ClassificationResult::failure(description, e.to_string())
            }
            Err(_) => {
                let e = PipelineError::Timeout {
                    seconds: self.settings.service.request_timeout_secs,
                };
                error!(query = description, "Classification failed: {e}");
                ClassificationResult::failure(description, e.to_string())
            }
        }
    }

    async fn run(&self, description: &str) -> PipelineResult<Classification> {
        let signal = self.understanding.understand(description).await?;

        let candidates = self
            .retrieval
            .retrieve(
                &signal.search_keywords,
                self.settings.retrieval.top_k,
                self.settings.retrieval.similarity_threshold,
            )
            .await?;

        if candidates.is_empty() {
            return Err(PipelineError::NoCandidates);
        }

        self.selection.select(description, &candidates).await
    }
}
