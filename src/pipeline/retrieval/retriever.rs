use std::path::Path;
use std::sync::Arc;

use super::embedder::EmbeddingModel;
use super::index::StatuteIndex;
use super::types::RetrievalResult;
use super::RetrievalError;

/// Read-only statute search over a loaded index snapshot. Cheap to share
/// across concurrent requests.
pub struct StatuteRetriever {
    index: Arc<StatuteIndex>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl StatuteRetriever {
    /// Wrap an index, checking it was built with the same embedding model.
    pub fn new(
        index: Arc<StatuteIndex>,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, RetrievalError> {
        if index.model_id() != embedder.model_id() {
            return Err(RetrievalError::ModelMismatch {
                index: index.model_id().to_string(),
                configured: embedder.model_id(),
            });
        }
        if index.dimension() != embedder.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: index.dimension(),
                got: embedder.dimension(),
            });
        }
        Ok(Self { index, embedder })
    }

    /// Load the persisted index from disk.
    pub fn open(
        index_path: &Path,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, RetrievalError> {
        let index = StatuteIndex::load(index_path)?;
        tracing::info!(
            path = %index_path.display(),
            sections = index.len(),
            model = %index.model_id(),
            "Statute index loaded"
        );
        Self::new(Arc::new(index), embedder)
    }

    pub fn index_size(&self) -> usize {
        self.index.len()
    }

    /// Top-`k` statutes for `query`: exactly `min(k, index size)` entries,
    /// non-increasing by score.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        let query_vec = self.embedder.embed(query)?;
        let entries = self.index.search(&query_vec, k);

        for entry in &entries {
            tracing::debug!(
                section = %entry.chunk.section_id,
                score = entry.score,
                "Retrieved statute"
            );
        }
        Ok(RetrievalResult { entries })
    }
}
