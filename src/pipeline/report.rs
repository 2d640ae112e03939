//! Final report merging the trust, perception and cognition layers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::cognition::AnalysisReport;
use crate::pipeline::extraction::ExtractedText;
use crate::pipeline::trust::AnchorRecord;
use crate::pipeline::types::DocumentRole;

/// Provenance of one document: its fingerprint and anchoring outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TrustEntry {
    pub role: DocumentRole,
    pub filename: String,
    pub fingerprint: String,
    pub algorithm: String,
    pub anchor: AnchorRecord,
}

/// Extracted text of one document.
#[derive(Debug, Clone, Serialize)]
pub struct PerceptionEntry {
    pub role: DocumentRole,
    #[serde(flatten)]
    pub extraction: ExtractedText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Trust,
    Perception,
    Retrieval,
    Cognition,
}

/// A stage failure absorbed during the run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageWarning {
    pub stage: PipelineStage,
    /// Document label, when the failure concerns one document.
    pub document: Option<String>,
    pub message: String,
}

impl StageWarning {
    pub fn for_document(
        stage: PipelineStage,
        role: DocumentRole,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            document: Some(role.label()),
            message: message.into(),
        }
    }

    pub fn for_stage(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            document: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceReport {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Incident first, then witnesses in order.
    pub trust_layer: Vec<TrustEntry>,
    pub perception_layer: Vec<PerceptionEntry>,
    pub cognition_layer: AnalysisReport,
    pub warnings: Vec<StageWarning>,
}

impl EvidenceReport {
    pub fn all_anchored(&self) -> bool {
        self.trust_layer.iter().all(|t| t.anchor.is_confirmed())
    }

    /// Labels of documents whose text is degraded.
    pub fn degraded_documents(&self) -> Vec<String> {
        self.perception_layer
            .iter()
            .filter(|p| p.extraction.degraded)
            .map(|p| p.role.label())
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
