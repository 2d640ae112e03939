use std::cmp::Ordering;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::corpus::{load_corpus, CorpusSection};
use super::embedder::EmbeddingModel;
use super::types::{ScoredStatute, StatuteChunk};
use super::RetrievalError;

pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Sections embedded per model call during ingestion.
const EMBED_BATCH_SIZE: usize = 32;

/// Persisted statute embedding index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuteIndex {
    version: u32,
    model_id: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    chunks: Vec<StatuteChunk>,
}

impl StatuteIndex {
    /// Embed every section. Sections are kept in corpus order.
    pub fn build(
        sections: &[CorpusSection],
        embedder: &dyn EmbeddingModel,
    ) -> Result<Self, RetrievalError> {
        if sections.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let dimension = embedder.dimension();
        let mut chunks = Vec::with_capacity(sections.len());

        for batch in sections.chunks(EMBED_BATCH_SIZE) {
            let passages: Vec<String> = batch
                .iter()
                .map(|s| {
                    StatuteChunk {
                        section_id: s.section_id.clone(),
                        title: s.title.clone(),
                        body: s.body.clone(),
                        embedding: Vec::new(),
                    }
                    .passage()
                })
                .collect();
            let refs: Vec<&str> = passages.iter().map(String::as_str).collect();
            let vectors = embedder.embed_batch(&refs)?;

            if vectors.len() != batch.len() {
                return Err(RetrievalError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (section, embedding) in batch.iter().zip(vectors) {
                if embedding.len() != dimension {
                    return Err(RetrievalError::DimensionMismatch {
                        expected: dimension,
                        got: embedding.len(),
                    });
                }
                chunks.push(StatuteChunk {
                    section_id: section.section_id.clone(),
                    title: section.title.clone(),
                    body: section.body.clone(),
                    embedding,
                });
            }
            tracing::debug!(
                embedded = chunks.len(),
                total = sections.len(),
                "Embedding batch done"
            );
        }

        Ok(Self {
            version: INDEX_FORMAT_VERSION,
            model_id: embedder.model_id(),
            dimension,
            built_at: Utc::now(),
            chunks,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrievalError::IndexNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let index: Self =
            serde_json::from_str(&raw).map_err(|e| RetrievalError::IndexCorrupt(e.to_string()))?;

        if index.version != INDEX_FORMAT_VERSION {
            return Err(RetrievalError::IndexCorrupt(format!(
                "unsupported index version {}",
                index.version
            )));
        }
        if let Some(bad) = index.chunks.iter().find(|c| c.embedding.len() != index.dimension) {
            return Err(RetrievalError::IndexCorrupt(format!(
                "section {} has {} dimensions, index declares {}",
                bad.section_id,
                bad.embedding.len(),
                index.dimension
            )));
        }
        Ok(index)
    }

    /// Write to a temp file in the target directory, then rename over `path`.
    /// Readers see either the previous index or the complete new one.
    pub fn save_atomic(&self, path: &Path) -> Result<(), RetrievalError> {
        let dir = parent_dir(path);
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(tmp.as_file_mut(), self)
            .map_err(|e| RetrievalError::Persist(e.to_string()))?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| RetrievalError::Persist(e.error.to_string()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn chunks(&self) -> &[StatuteChunk] {
        &self.chunks
    }

    /// Top `k` by cosine similarity, ties broken by section id.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredStatute> {
        let mut scored: Vec<ScoredStatute> = self
            .chunks
            .iter()
            .map(|chunk| ScoredStatute {
                score: cosine_similarity(query, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.section_id.cmp(&b.chunk.section_id))
        });
        scored.truncate(k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a * norm_b);
    if sim.is_nan() {
        0.0
    } else {
        sim
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// ═══════════════════════════════════════════════════════════
// Ingestion
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Built { sections: usize },
    /// A valid index for the same model already exists.
    Skipped { sections: usize },
}

/// Exclusive ingestion lock: `<index>.lock`, created with `create_new` and
/// removed on drop.
struct IngestLock {
    path: PathBuf,
}

impl IngestLock {
    fn acquire(index_path: &Path) -> Result<Self, RetrievalError> {
        let mut lock_path = index_path.as_os_str().to_owned();
        lock_path.push(".lock");
        let path = PathBuf::from(lock_path);

        std::fs::create_dir_all(parent_dir(&path))?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RetrievalError::IndexLocked(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for IngestLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove ingestion lock"
            );
        }
    }
}

/// Build the index from a corpus file. Idempotent: an existing valid index
/// built with the same model is kept unless `force` is set.
pub fn ingest(
    corpus_path: &Path,
    index_path: &Path,
    embedder: &dyn EmbeddingModel,
    force: bool,
) -> Result<IngestOutcome, RetrievalError> {
    let _span = tracing::info_span!(
        "ingest",
        corpus = %corpus_path.display(),
        index = %index_path.display(),
        force,
    )
    .entered();

    let _lock = IngestLock::acquire(index_path)?;

    if !force && index_path.exists() {
        match StatuteIndex::load(index_path) {
            Ok(existing) if existing.model_id() == embedder.model_id() => {
                tracing::info!(
                    sections = existing.len(),
                    "Index already present, skipping ingestion"
                );
                return Ok(IngestOutcome::Skipped { sections: existing.len() });
            }
            Ok(existing) => {
                return Err(RetrievalError::ModelMismatch {
                    index: existing.model_id().to_string(),
                    configured: embedder.model_id(),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Existing index unreadable, rebuilding");
            }
        }
    }

    let sections = load_corpus(corpus_path)?;
    tracing::info!(
        sections = sections.len(),
        model = %embedder.model_id(),
        "Building statute index"
    );

    let index = StatuteIndex::build(&sections, embedder)?;
    index.save_atomic(index_path)?;

    tracing::info!(sections = index.len(), "Statute index written");
    Ok(IngestOutcome::Built { sections: index.len() })
}
