use std::sync::Arc;

use super::RetrievalError;
use crate::ollama::EmbeddingClient;

/// Dimension of the hashing embedder and of all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Text → vector. Implementations are blocking and shareable.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError>;
    fn dimension(&self) -> usize;
    /// Identifier recorded in the index so a mismatched model is detected at load.
    fn model_id(&self) -> String;
}

// ═══════════════════════════════════════════════════════════
// Hashing embedder (default, offline)
// ═══════════════════════════════════════════════════════════

/// Deterministic feature-hashing bag-of-words embedder.
///
/// Each lower-cased token is hashed (FNV-1a, stable across builds) into one
/// of `dimension` buckets with a hash-derived sign; the vector is then
/// L2-normalized. Texts sharing vocabulary land close in cosine space, which
/// is enough to rank statute sections lexically without a model runtime.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIM)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(hashed_vector(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|t| hashed_vector(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> String {
        format!("hashing-fnv1a-{}", self.dimension)
    }
}

fn hashed_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dim];
    let lowered = text.to_lowercase();

    for token in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
    {
        let h = fnv1a(token.as_bytes());
        let bucket = (h % dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign;
    }

    l2_normalize(&mut vec);
    vec
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}

pub(crate) fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vec.iter_mut() {
            *val /= norm;
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Ollama embedder
// ═══════════════════════════════════════════════════════════

/// Embeddings from an Ollama embedding model (`/api/embed`).
pub struct OllamaEmbedder {
    client: Arc<dyn EmbeddingClient>,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Embeds one sample text to learn the model's output dimension.
    pub fn connect(client: Arc<dyn EmbeddingClient>, model: &str) -> Result<Self, RetrievalError> {
        let sample = client
            .embed(model, &["dimension check"])
            .map_err(|e| RetrievalError::ModelInit(format!("{model}: {e}")))?;
        let dimension = sample
            .first()
            .map(Vec::len)
            .filter(|d| *d > 0)
            .ok_or_else(|| RetrievalError::ModelInit(format!("{model}: empty embedding")))?;

        tracing::info!(model, dimension, "Ollama embedder ready");
        Ok(Self {
            client,
            model: model.to_string(),
            dimension,
        })
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| RetrievalError::Embedding("no embedding returned".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut vectors = self
            .client
            .embed(&self.model, texts)
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        for v in vectors.iter_mut() {
            if v.len() != self.dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: self.dimension,
                    got: v.len(),
                });
            }
            l2_normalize(v);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX Embedder, behind `onnx-embeddings` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{l2_normalize, EmbeddingModel, RetrievalError, EMBEDDING_DIM};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// all-MiniLM-L6-v2 via ONNX Runtime.
    ///
    /// `model_dir` must contain `model.onnx` and `tokenizer.json`. The session
    /// sits behind a Mutex because `Session::run` takes `&mut self`.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, RetrievalError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(RetrievalError::ModelNotFound(model_path));
            }
            if !tokenizer_path.exists() {
                return Err(RetrievalError::ModelNotFound(tokenizer_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| RetrievalError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| RetrievalError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    RetrievalError::ModelInit(format!("ONNX load failed: {e}"))
                })?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| RetrievalError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            tracing::info!("ONNX embedder loaded from {}", model_dir.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Tokenize, run inference, mean-pool over the attention mask.
        fn infer(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| RetrievalError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> =
                encoding.get_attention_mask().iter().map(|&m| m as i64).collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let seq_len = input_ids.len();

            let to_array = |data: Vec<i64>| {
                ndarray::Array2::from_shape_vec((1, seq_len), data)
                    .map_err(|e| RetrievalError::Embedding(e.to_string()))
            };
            let ids_array = to_array(input_ids)?;
            let mask_array = to_array(attention_mask.clone())?;
            let type_array = to_array(token_type_ids)?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
            let type_tensor = TensorRef::from_array_view(&type_array)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| RetrievalError::Embedding("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| RetrievalError::Embedding(format!("ONNX inference failed: {e}")))?;

            let (shape, output_data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| RetrievalError::Embedding(format!("Output extraction: {e}")))?;

            if shape.len() != 3 || shape[2] as usize != EMBEDDING_DIM {
                return Err(RetrievalError::Embedding(format!(
                    "Unexpected output shape: {shape:?}, expected [1, {seq_len}, {EMBEDDING_DIM}]"
                )));
            }

            let mut pooled = vec![0.0f32; EMBEDDING_DIM];
            let mut mask_sum = 0.0f32;
            for (token_idx, &mask_val) in attention_mask.iter().enumerate().take(seq_len) {
                let mask_val = mask_val as f32;
                mask_sum += mask_val;
                let offset = token_idx * EMBEDDING_DIM;
                for (dim_idx, p) in pooled.iter_mut().enumerate() {
                    *p += output_data[offset + dim_idx] * mask_val;
                }
            }
            if mask_sum > 0.0 {
                for val in &mut pooled {
                    *val /= mask_sum;
                }
            }

            l2_normalize(&mut pooled);
            Ok(pooled)
        }
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            self.infer(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }

        fn model_id(&self) -> String {
            "onnx:all-MiniLM-L6-v2".to_string()
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::OllamaError;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn hashing_embed_has_configured_dimension() {
        let embedder = HashingEmbedder::new();
        assert_eq!(embedder.embed("murder with a knife").unwrap().len(), EMBEDDING_DIM);
        assert_eq!(embedder.dimension(), 384);
    }

    #[test]
    fn hashing_embed_is_deterministic() {
        let embedder = HashingEmbedder::new();
        assert_eq!(embedder.embed("same text").unwrap(), embedder.embed("same text").unwrap());
    }

    #[test]
    fn hashing_embed_is_l2_normalized() {
        let vec = HashingEmbedder::new().embed("voluntarily causing hurt").unwrap();
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "got norm = {norm}");
    }

    #[test]
    fn hashing_embed_ranks_shared_vocabulary_higher() {
        let e = HashingEmbedder::new();
        let query = e.embed("attacked with a knife, a dangerous weapon").unwrap();
        let weapon = e.embed("hurt caused by a knife or other dangerous weapon").unwrap();
        let cheating = e.embed("cheating and dishonestly inducing delivery of property").unwrap();
        assert!(cosine(&query, &weapon) > cosine(&query, &cheating));
    }

    #[test]
    fn hashing_embed_of_empty_text_is_zero() {
        let vec = HashingEmbedder::new().embed("").unwrap();
        assert!(vec.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn hashing_model_id_includes_dimension() {
        assert_eq!(HashingEmbedder::with_dimension(64).model_id(), "hashing-fnv1a-64");
    }

    #[test]
    fn fnv1a_known_value() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    struct FixedEmbeddingClient {
        dim: usize,
    }

    impl EmbeddingClient for FixedEmbeddingClient {
        fn embed(&self, _model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, OllamaError> {
            Ok(inputs.iter().map(|_| vec![2.0; self.dim]).collect())
        }
    }

    struct DownEmbeddingClient;

    impl EmbeddingClient for DownEmbeddingClient {
        fn embed(&self, _model: &str, _inputs: &[&str]) -> Result<Vec<Vec<f32>>, OllamaError> {
            Err(OllamaError::Connection("http://localhost:11434".into()))
        }
    }

    #[test]
    fn ollama_embedder_learns_dimension_and_normalizes() {
        let client = Arc::new(FixedEmbeddingClient { dim: 4 });
        let embedder = OllamaEmbedder::connect(client, "nomic-embed-text").unwrap();
        assert_eq!(embedder.dimension(), 4);
        assert_eq!(embedder.model_id(), "ollama:nomic-embed-text");
        let v = embedder.embed("x").unwrap();
        assert!((v[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn ollama_embedder_connect_fails_when_down() {
        let err = OllamaEmbedder::connect(Arc::new(DownEmbeddingClient), "nomic-embed-text");
        assert!(matches!(err, Err(RetrievalError::ModelInit(_))));
    }
}
