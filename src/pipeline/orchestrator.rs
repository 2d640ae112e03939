//! Evidentiary analysis pipeline: trust, perception and cognition.
//!
//! Per document, hashing+anchoring and text extraction run as independent
//! branches. Extraction is joined across all documents before retrieval and
//! contradiction analysis. Stage failures are recorded on the report and
//! never abort the run.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::pipeline::cognition::{
    AnalysisReport, CognitionError, ContradictionEngine, StatementText,
};
use crate::pipeline::extraction::{DocumentTextExtractor, ExtractedText};
use crate::pipeline::report::{
    EvidenceReport, PerceptionEntry, PipelineStage, StageWarning, TrustEntry,
};
use crate::pipeline::retrieval::{RetrievalResult, StatuteRetriever};
use crate::pipeline::trust::{hash, AnchorRecord, AnchorStatus, LedgerAnchor};
use crate::pipeline::types::{Document, DocumentRole};

/// Extra time granted over the ledger's own confirmation deadline before the
/// pipeline gives up on an anchoring branch.
const ANCHOR_GRACE: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cognition failed: {0}")]
    Cognition(#[from] CognitionError),
}

/// Per-branch deadlines and retrieval depth.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub anchor_timeout: Duration,
    pub ocr_timeout: Duration,
    pub reasoning_timeout: Duration,
    pub top_k: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            anchor_timeout: config.ledger.timeout + ANCHOR_GRACE,
            ocr_timeout: config.ocr_timeout,
            reasoning_timeout: config.reasoning_timeout,
            top_k: config.top_k,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Holds only shared, read-only service handles; concurrent `run` calls do
/// not share any per-request state.
pub struct PipelineOrchestrator {
    ledger: Arc<dyn LedgerAnchor>,
    extractor: Arc<DocumentTextExtractor>,
    retriever: Option<Arc<StatuteRetriever>>,
    engine: Arc<ContradictionEngine>,
    settings: PipelineSettings,
}

/// Output of the two per-document branches.
struct DocumentOutcome {
    trust: TrustEntry,
    perception: PerceptionEntry,
    warnings: Vec<StageWarning>,
}

impl PipelineOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerAnchor>,
        extractor: Arc<DocumentTextExtractor>,
        retriever: Option<Arc<StatuteRetriever>>,
        engine: Arc<ContradictionEngine>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            ledger,
            extractor,
            retriever,
            engine,
            settings,
        }
    }

    /// Run the full pipeline for one incident report and its witness
    /// statements. Only missing input fails the call.
    pub async fn run(
        &self,
        incident: Document,
        witnesses: Vec<Document>,
    ) -> Result<EvidenceReport, PipelineError> {
        if witnesses.is_empty() {
            return Err(PipelineError::InvalidInput(
                "at least one witness statement is required".into(),
            ));
        }
        if incident.is_empty() {
            return Err(PipelineError::InvalidInput("incident report is empty".into()));
        }
        if let Some(i) = witnesses.iter().position(Document::is_empty) {
            return Err(PipelineError::InvalidInput(format!(
                "witness statement {} ({}) is empty",
                i + 1,
                witnesses[i].filename
            )));
        }

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %request_id, witnesses = witnesses.len());
        self.run_inner(request_id, incident, witnesses).instrument(span).await
    }

    async fn run_inner(
        &self,
        request_id: Uuid,
        incident: Document,
        witnesses: Vec<Document>,
    ) -> Result<EvidenceReport, PipelineError> {
        let mut documents = Vec::with_capacity(witnesses.len() + 1);
        let mut incident = incident;
        incident.role = DocumentRole::Incident;
        documents.push(incident);
        for (i, mut doc) in witnesses.into_iter().enumerate() {
            doc.role = DocumentRole::Witness(i + 1);
            documents.push(doc);
        }

        // Synchronization point: cognition needs every document's text
        let outcomes = join_all(documents.iter().map(|doc| self.process_document(doc))).await;

        let mut trust_layer = Vec::with_capacity(outcomes.len());
        let mut perception_layer = Vec::with_capacity(outcomes.len());
        let mut warnings = Vec::new();
        for outcome in outcomes {
            trust_layer.push(outcome.trust);
            perception_layer.push(outcome.perception);
            warnings.extend(outcome.warnings);
        }

        // Degraded extractions carry a placeholder, not testimony
        let mut statements = perception_layer.iter().map(|p| {
            if p.extraction.has_content() {
                StatementText::readable(p.extraction.text.clone())
            } else {
                StatementText::unreadable()
            }
        });
        let incident_text = statements.next().unwrap_or_else(StatementText::unreadable);
        let witness_texts: Vec<StatementText> = statements.collect();

        let retrieval = self.retrieve_statutes(&perception_layer, &mut warnings).await;
        let mut cognition_layer = self
            .analyze(incident_text, witness_texts, retrieval, &mut warnings)
            .await?;

        for entry in perception_layer.iter().filter(|p| p.extraction.degraded) {
            cognition_layer.recommendations.push(format!(
                "Re-scan {}: text extraction was degraded ({}).",
                entry.role,
                entry.extraction.degradation_reason.as_deref().unwrap_or("unknown reason")
            ));
        }

        tracing::info!(
            anchored = trust_layer.iter().filter(|t| t.anchor.is_confirmed()).count(),
            degraded = perception_layer.iter().filter(|p| p.extraction.degraded).count(),
            contradictions = cognition_layer.contradictions.len(),
            warnings = warnings.len(),
            "Pipeline run complete"
        );

        Ok(EvidenceReport {
            request_id,
            generated_at: chrono::Utc::now(),
            trust_layer,
            perception_layer,
            cognition_layer,
            warnings,
        })
    }

    async fn process_document(&self, doc: &Document) -> DocumentOutcome {
        let span = tracing::info_span!("document", role = %doc.role, filename = %doc.filename);
        async {
            let ((trust, trust_warning), (extraction, perception_warning)) =
                tokio::join!(self.trust_branch(doc), self.perception_branch(doc));
            DocumentOutcome {
                trust,
                perception: PerceptionEntry {
                    role: doc.role,
                    extraction,
                },
                warnings: trust_warning.into_iter().chain(perception_warning).collect(),
            }
        }
        .instrument(span)
        .await
    }

    /// Hash the raw bytes and anchor the fingerprint.
    async fn trust_branch(&self, doc: &Document) -> (TrustEntry, Option<StageWarning>) {
        let fingerprint = hash(doc.bytes());
        let document_type = doc.role.document_type();
        tracing::info!(fingerprint = %fingerprint.prefix(16), "Document hashed");

        let ledger = Arc::clone(&self.ledger);
        let fp = fingerprint.clone();
        let metadata = doc.filename.clone();
        let task = tokio::task::spawn_blocking(move || {
            ledger.anchor_with_metadata(&fp, document_type, &metadata)
        });

        let anchor = match tokio::time::timeout(self.settings.anchor_timeout, task).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => AnchorRecord::failed(
                &fingerprint,
                self.ledger.mode(),
                None,
                document_type,
                format!("anchoring task failed: {e}"),
            ),
            Err(_) => AnchorRecord::failed(
                &fingerprint,
                self.ledger.mode(),
                None,
                document_type,
                format!(
                    "anchoring timed out after {}s",
                    self.settings.anchor_timeout.as_secs_f32()
                ),
            ),
        };

        let warning = match anchor.status {
            AnchorStatus::Confirmed => {
                tracing::info!(tx = %anchor.transaction_id, "Fingerprint anchored");
                None
            }
            _ => {
                let reason = anchor
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "anchor not confirmed".into());
                tracing::warn!(tx = %anchor.transaction_id, reason = %reason, "Anchoring failed");
                Some(StageWarning::for_document(PipelineStage::Trust, doc.role, reason))
            }
        };

        let entry = TrustEntry {
            role: doc.role,
            filename: doc.filename.clone(),
            fingerprint: fingerprint.hex().to_string(),
            algorithm: fingerprint.algorithm.clone(),
            anchor,
        };
        (entry, warning)
    }

    async fn perception_branch(&self, doc: &Document) -> (ExtractedText, Option<StageWarning>) {
        let extractor = Arc::clone(&self.extractor);
        let bytes = doc.shared_bytes();
        let filename = doc.filename.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes, &filename));

        let extraction = match tokio::time::timeout(self.settings.ocr_timeout, task).await {
            Ok(Ok(extracted)) => extracted,
            Ok(Err(e)) => ExtractedText::unavailable(
                &doc.filename,
                doc.declared_kind,
                format!("extraction task failed: {e}"),
            ),
            Err(_) => ExtractedText::unavailable(
                &doc.filename,
                doc.declared_kind,
                format!("OCR timed out after {}s", self.settings.ocr_timeout.as_secs_f32()),
            ),
        };

        let warning = extraction.degraded.then(|| {
            let reason = extraction
                .degradation_reason
                .clone()
                .unwrap_or_else(|| "text extraction degraded".into());
            tracing::warn!(reason = %reason, "Extraction degraded");
            StageWarning::for_document(PipelineStage::Perception, doc.role, reason)
        });
        (extraction, warning)
    }

    /// Statute context for the request. Degraded documents do not contribute
    /// to the query.
    async fn retrieve_statutes(
        &self,
        perception: &[PerceptionEntry],
        warnings: &mut Vec<StageWarning>,
    ) -> RetrievalResult {
        let Some(retriever) = self.retriever.as_ref().map(Arc::clone) else {
            tracing::info!("No statute index loaded, skipping retrieval");
            warnings.push(StageWarning::for_stage(
                PipelineStage::Retrieval,
                "statute index not loaded",
            ));
            return RetrievalResult::empty();
        };

        let query = perception
            .iter()
            .filter(|p| p.extraction.has_content())
            .map(|p| p.extraction.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if query.trim().is_empty() {
            tracing::warn!("No readable text to query the statute index with");
            return RetrievalResult::empty();
        }

        let k = self.settings.top_k;
        match tokio::task::spawn_blocking(move || retriever.retrieve(&query, k)).await {
            Ok(Ok(result)) => {
                tracing::info!(retrieved = result.len(), "Statutes retrieved");
                result
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Statute retrieval failed");
                warnings.push(StageWarning::for_stage(PipelineStage::Retrieval, e.to_string()));
                RetrievalResult::empty()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Statute retrieval task failed");
                warnings.push(StageWarning::for_stage(PipelineStage::Retrieval, e.to_string()));
                RetrievalResult::empty()
            }
        }
    }

    async fn analyze(
        &self,
        incident: StatementText,
        witnesses: Vec<StatementText>,
        retrieval: RetrievalResult,
        warnings: &mut Vec<StageWarning>,
    ) -> Result<AnalysisReport, PipelineError> {
        let engine = Arc::clone(&self.engine);
        let retrieval = Arc::new(retrieval);
        let task = {
            let incident = incident.clone();
            let witnesses = witnesses.clone();
            let retrieval = Arc::clone(&retrieval);
            tokio::task::spawn_blocking(move || {
                engine.analyze_statements(&incident, &witnesses, &retrieval)
            })
        };

        match tokio::time::timeout(self.settings.reasoning_timeout, task).await {
            Ok(Ok(report)) => Ok(report?),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Cognition task failed");
                warnings.push(StageWarning::for_stage(PipelineStage::Cognition, e.to_string()));
                Ok(AnalysisReport::error(format!("Contradiction analysis failed: {e}")))
            }
            Err(_) => {
                let secs = self.settings.reasoning_timeout.as_secs_f32();
                tracing::warn!(
                    timeout_secs = secs,
                    "Reasoning backend timed out, falling back to basic analysis"
                );
                warnings.push(StageWarning::for_stage(
                    PipelineStage::Cognition,
                    format!("reasoning backend timed out after {secs}s"),
                ));
                Ok(self
                    .engine
                    .analyze_after_backend_timeout(&incident, &witnesses, &retrieval)?)
            }
        }
    }
}
