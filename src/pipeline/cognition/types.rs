use serde::{Deserialize, Serialize};

use crate::pipeline::retrieval::StatuteReference;

/// Canonical contradiction families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionType {
    Temporal,
    Spatial,
    Person,
    Event,
    Other,
}

impl ContradictionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "Temporal",
            Self::Spatial => "Spatial",
            Self::Person => "Person",
            Self::Event => "Event",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// A factual inconsistency between two documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contradiction {
    pub contradiction_type: ContradictionType,
    /// Label as proposed by the producer, e.g. `"Time"` or `"Weapon"`.
    pub label: String,
    pub source_a: String,
    pub source_b: String,
    pub source_text_a: String,
    pub source_text_b: String,
    /// Always recomputed from `label`.
    pub severity: Severity,
    pub explanation: String,
    pub statute_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Reasoning backend produced (or was asked for) the contradictions.
    Full,
    /// Lexical fallback only.
    Basic,
}

/// Terminal outcome of the generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    Parsed,
    ParseFailed,
    BackendUnavailable,
}

/// Engine lifecycle states, recorded in order on every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Drafting,
    ModelInvoked,
    Parsed,
    ParseFailed,
    BackendUnavailable,
    Finalized,
}

impl From<GenerationOutcome> for EngineState {
    fn from(outcome: GenerationOutcome) -> Self {
        match outcome {
            GenerationOutcome::Parsed => Self::Parsed,
            GenerationOutcome::ParseFailed => Self::ParseFailed,
            GenerationOutcome::BackendUnavailable => Self::BackendUnavailable,
        }
    }
}

/// One document pair. Pairs involving an unreadable document are listed
/// with `compared: false` and zero similarity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairComparison {
    pub source_a: String,
    pub source_b: String,
    pub compared: bool,
    /// Token-set Jaccard similarity in [0, 1].
    pub similarity: f32,
    pub contradiction_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub status: AnalysisStatus,
    pub mode: AnalysisMode,
    pub outcome: GenerationOutcome,
    pub contradictions: Vec<Contradiction>,
    pub pairs: Vec<PairComparison>,
    pub overall_similarity: f32,
    pub confidence: f32,
    pub recommendations: Vec<String>,
    pub statute_references: Vec<StatuteReference>,
    pub states: Vec<EngineState>,
}

impl AnalysisReport {
    /// Report for an analysis that could not run at all.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Error,
            mode: AnalysisMode::Basic,
            outcome: GenerationOutcome::BackendUnavailable,
            contradictions: Vec::new(),
            pairs: Vec::new(),
            overall_similarity: 0.0,
            confidence: 0.0,
            recommendations: vec![reason.into()],
            statute_references: Vec::new(),
            states: vec![EngineState::Drafting, EngineState::Finalized],
        }
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.contradictions.iter().filter(|c| c.severity == severity).count()
    }

    pub fn has_type(&self, kind: ContradictionType) -> bool {
        self.contradictions.iter().any(|c| c.contradiction_type == kind)
    }
}

/// One document's text as handed to the engine. Unreadable documents keep
/// their position (and so their label) but are never compared or shown to
/// the reasoning backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementText {
    pub text: String,
    pub readable: bool,
}

impl StatementText {
    pub fn readable(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            readable: true,
        }
    }

    pub fn unreadable() -> Self {
        Self {
            text: String::new(),
            readable: false,
        }
    }
}

/// Witness statements in list form. Single-text callers convert at the
/// boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WitnessStatements(Vec<String>);

impl WitnessStatements {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    /// Every statement, marked readable.
    pub fn into_statements(self) -> Vec<StatementText> {
        self.0.into_iter().map(StatementText::readable).collect()
    }
}

impl From<&str> for WitnessStatements {
    fn from(text: &str) -> Self {
        Self(vec![text.to_string()])
    }
}

impl From<String> for WitnessStatements {
    fn from(text: String) -> Self {
        Self(vec![text])
    }
}

impl From<Vec<String>> for WitnessStatements {
    fn from(texts: Vec<String>) -> Self {
        Self(texts)
    }
}

impl From<Vec<&str>> for WitnessStatements {
    fn from(texts: Vec<&str>) -> Self {
        Self(texts.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_statements_from_single_text() {
        let w: WitnessStatements = "I saw B attacked".into();
        assert_eq!(w.len(), 1);
        let w: WitnessStatements = String::from("I saw B attacked").into();
        assert_eq!(w.as_slice()[0], "I saw B attacked");
    }

    #[test]
    fn witness_statements_from_list() {
        let w: WitnessStatements = vec!["one".to_string(), "two".to_string()].into();
        assert_eq!(w.len(), 2);
        let w: WitnessStatements = vec!["a", "b", "c"].into();
        assert_eq!(w.into_inner(), vec!["a", "b", "c"]);
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&ContradictionType::Temporal).unwrap(), "\"temporal\"");
        assert_eq!(
            serde_json::to_string(&GenerationOutcome::ParseFailed).unwrap(),
            "\"parse_failed\""
        );
        assert_eq!(serde_json::to_string(&AnalysisMode::Basic).unwrap(), "\"basic\"");
    }

    #[test]
    fn outcome_maps_to_state() {
        assert_eq!(EngineState::from(GenerationOutcome::Parsed), EngineState::Parsed);
        assert_eq!(
            EngineState::from(GenerationOutcome::BackendUnavailable),
            EngineState::BackendUnavailable
        );
    }
}
