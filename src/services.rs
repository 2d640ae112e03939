//! Long-lived service handles, resolved once from configuration.
//!
//! Missing credentials or unreachable capabilities never fail startup: each
//! one degrades (mock ledger, no OCR, no statute index, basic analysis) and
//! the degradation is logged here.

use std::sync::Arc;

use crate::config::{AppConfig, EmbedderKind, LedgerConfig, LedgerMode};
use crate::ollama::OllamaClient;
use crate::pipeline::cognition::{ContradictionEngine, OllamaReasoner, ReasoningBackend};
use crate::pipeline::extraction::pdfium::PdfiumRenderer;
use crate::pipeline::extraction::vision_ocr::OllamaVisionOcr;
use crate::pipeline::extraction::{DocumentTextExtractor, OcrEngine};
use crate::pipeline::retrieval::{
    EmbeddingModel, HashingEmbedder, OllamaEmbedder, RetrievalError, StatuteRetriever,
};
use crate::pipeline::trust::{JsonRpcLedger, LedgerAnchor, MockLedger};
use crate::pipeline::{PipelineOrchestrator, PipelineSettings};

/// Shared handles passed explicitly into pipeline invocations.
pub struct ServiceRegistry {
    pub config: AppConfig,
    pub ledger: Arc<dyn LedgerAnchor>,
    pub extractor: Arc<DocumentTextExtractor>,
    pub retriever: Option<Arc<StatuteRetriever>>,
    pub engine: Arc<ContradictionEngine>,
}

impl ServiceRegistry {
    /// Build every service. Must be called outside an async runtime: the
    /// HTTP clients are blocking.
    pub fn from_config(config: AppConfig) -> Self {
        let ledger = build_ledger(&config.ledger);

        let reasoning_client = Arc::new(OllamaClient::new(
            &config.ollama_url,
            config.reasoning_timeout.as_secs(),
        ));
        let vision_client = Arc::new(OllamaClient::new(
            &config.ollama_url,
            config.ocr_timeout.as_secs(),
        ));

        let extractor = Arc::new(build_extractor(&config, vision_client));

        let retriever = match build_embedder(&config, reasoning_client.clone())
            .and_then(|embedder| StatuteRetriever::open(&config.index_path, embedder))
        {
            Ok(retriever) => Some(Arc::new(retriever)),
            Err(e) => {
                tracing::warn!(error = %e, "Statute retrieval disabled");
                None
            }
        };

        let backend: Option<Arc<dyn ReasoningBackend>> = match &config.reasoning_model {
            Some(model) => {
                tracing::info!(model = %model, "Reasoning backend configured");
                Some(Arc::new(OllamaReasoner::new(reasoning_client, model)))
            }
            None => {
                tracing::warn!("NYAYA_REASONING_MODEL not set, analysis runs in basic mode");
                None
            }
        };

        Self {
            ledger,
            extractor,
            retriever,
            engine: Arc::new(ContradictionEngine::new(backend)),
            config,
        }
    }

    pub fn pipeline(&self) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.extractor),
            self.retriever.clone(),
            Arc::clone(&self.engine),
            PipelineSettings::from_config(&self.config),
        )
    }
}

/// Ledger for the configured mode. Live mode without usable credentials
/// falls back to the mock ledger.
pub fn build_ledger(config: &LedgerConfig) -> Arc<dyn LedgerAnchor> {
    if config.mode == LedgerMode::Mock {
        tracing::info!("Ledger mode: mock");
        return Arc::new(MockLedger::new());
    }

    let (Some(rpc_url), Some(contract), Some(private_key)) = (
        config.rpc_url.as_deref(),
        config.contract_address.as_deref(),
        config.private_key.as_ref(),
    ) else {
        tracing::warn!("Live ledger needs RPC URL, contract and signing key; using mock ledger");
        return Arc::new(MockLedger::new());
    };

    match JsonRpcLedger::new(rpc_url, contract, private_key, config.timeout, config.poll_interval) {
        Ok(ledger) => {
            let ledger = ledger.with_gas_limit(config.gas_limit);
            tracing::info!(
                rpc_url = %rpc_url,
                contract = %contract,
                submitter = %ledger.submitter(),
                "Ledger mode: live"
            );
            Arc::new(ledger)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Live ledger unavailable, using mock ledger");
            Arc::new(MockLedger::new())
        }
    }
}

/// Embedding model for the configured kind.
pub fn build_embedder(
    config: &AppConfig,
    client: Arc<OllamaClient>,
) -> Result<Arc<dyn EmbeddingModel>, RetrievalError> {
    match config.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new())),
        EmbedderKind::Ollama => Ok(Arc::new(OllamaEmbedder::connect(client, &config.embed_model)?)),
        #[cfg(feature = "onnx-embeddings")]
        EmbedderKind::Onnx => Ok(Arc::new(crate::pipeline::retrieval::OnnxEmbedder::load(
            &config.onnx_model_dir,
        )?)),
        #[cfg(not(feature = "onnx-embeddings"))]
        EmbedderKind::Onnx => Err(RetrievalError::ModelInit(
            "built without the onnx-embeddings feature".into(),
        )),
    }
}

fn build_extractor(config: &AppConfig, vision_client: Arc<OllamaClient>) -> DocumentTextExtractor {
    let ocr: Option<Arc<dyn OcrEngine>> = match &config.vision_model {
        Some(model) => {
            tracing::info!(model = %model, "OCR engine configured");
            Some(Arc::new(OllamaVisionOcr::new(vision_client, model.clone())))
        }
        None => {
            tracing::warn!("NYAYA_VISION_MODEL not set, extracted text will be degraded");
            None
        }
    };

    let extractor = DocumentTextExtractor::new(ocr).with_render_dpi(config.render_dpi);
    match PdfiumRenderer::new() {
        Ok(renderer) => extractor.with_pdf_renderer(Arc::new(renderer)),
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable, PDF documents will be degraded");
            extractor
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::trust::hash;

    const VAULT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn live_config(rpc_url: Option<&str>, key: Option<&str>) -> LedgerConfig {
        LedgerConfig {
            mode: LedgerMode::Live,
            rpc_url: rpc_url.map(str::to_string),
            contract_address: Some(VAULT.to_string()),
            private_key: key.map(|k| zeroize::Zeroizing::new(k.to_string())),
            gas_limit: crate::config::DEFAULT_LEDGER_GAS_LIMIT,
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }

    #[test]
    fn mock_mode_builds_mock_ledger() {
        let ledger = build_ledger(&AppConfig::default().ledger);
        assert_eq!(ledger.mode(), LedgerMode::Mock);
        assert!(ledger.anchor(&hash(b"doc"), "incident_report").is_confirmed());
    }

    #[test]
    fn live_mode_without_credentials_degrades_to_mock() {
        assert_eq!(build_ledger(&live_config(None, None)).mode(), LedgerMode::Mock);
        assert_eq!(
            build_ledger(&live_config(Some("http://127.0.0.1:9"), None)).mode(),
            LedgerMode::Mock
        );
    }

    #[test]
    fn live_mode_with_bad_key_degrades_to_mock() {
        let ledger = build_ledger(&live_config(Some("http://127.0.0.1:9"), Some("not-hex")));
        assert_eq!(ledger.mode(), LedgerMode::Mock);
    }

    #[test]
    fn live_mode_without_contract_degrades_to_mock() {
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let mut config = live_config(Some("http://127.0.0.1:9"), Some(key));
        config.contract_address = None;
        assert_eq!(build_ledger(&config).mode(), LedgerMode::Mock);
    }

    #[test]
    fn live_mode_with_credentials_builds_live_ledger() {
        let key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let ledger = build_ledger(&live_config(Some("http://127.0.0.1:9"), Some(key)));
        assert_eq!(ledger.mode(), LedgerMode::Live);
    }

    #[test]
    fn hashing_embedder_is_default() {
        let client = Arc::new(OllamaClient::default_local());
        let embedder = build_embedder(&AppConfig::default(), client).unwrap();
        assert!(embedder.model_id().starts_with("hashing-"));
    }

    #[test]
    fn registry_degrades_without_models_or_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            index_path: dir.path().join("missing.index.json"),
            ..AppConfig::default()
        };
        let registry = ServiceRegistry::from_config(config);
        assert!(registry.retriever.is_none());
        assert!(!registry.engine.has_backend());
        assert!(!registry.extractor.ocr_available());
        assert_eq!(registry.ledger.mode(), LedgerMode::Mock);
    }
}
