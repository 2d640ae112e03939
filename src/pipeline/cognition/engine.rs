use std::sync::Arc;

use crate::pipeline::retrieval::RetrievalResult;
use crate::pipeline::types::DocumentRole;

use super::backend::ReasoningBackend;
use super::lexical::{jaccard_similarity, rule_based_contradictions};
use super::parser::{parse_contradictions, RawContradiction};
use super::prompt::{build_contradiction_prompt, SYSTEM_PROMPT};
use super::severity::{canonical_type, severity_for};
use super::types::*;
use super::CognitionError;

/// Confidence assigned to a discarded (unparseable) backend response.
pub const PARSE_FAILED_CONFIDENCE: f32 = 0.1;
/// Floor for backend-grounded analysis. Basic reports stay strictly below it.
pub const FULL_MODE_FLOOR: f32 = 0.5;
const FULL_MODE_BASE: f32 = 0.7;
const FULL_MODE_CAP: f32 = 0.95;
const BASIC_MODE_BASE: f32 = 0.2;
const BASIC_MODE_CAP: f32 = 0.45;

/// Detects contradictions between an incident report and witness statements.
///
/// Holds no per-request state; one engine serves concurrent requests.
pub struct ContradictionEngine {
    backend: Option<Arc<dyn ReasoningBackend>>,
}

impl ContradictionEngine {
    pub fn new(backend: Option<Arc<dyn ReasoningBackend>>) -> Self {
        Self { backend }
    }

    /// Engine without a reasoning backend (always `basic`).
    pub fn lexical_only() -> Self {
        Self { backend: None }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Compare the incident against every witness and every witness against
    /// every other witness. All texts are taken as readable.
    pub fn analyze(
        &self,
        incident: &str,
        witnesses: impl Into<WitnessStatements>,
        retrieval: &RetrievalResult,
    ) -> Result<AnalysisReport, CognitionError> {
        let witnesses = witnesses.into().into_statements();
        self.analyze_statements(&StatementText::readable(incident), &witnesses, retrieval)
    }

    /// Like `analyze`, for texts that may not have been read. Pairs touching
    /// an unreadable document are reported as not compared.
    ///
    /// Backend failures never surface as errors: an unreachable backend falls
    /// back to lexical comparison, an unparseable response yields an empty
    /// report. Only missing input is rejected.
    pub fn analyze_statements(
        &self,
        incident: &StatementText,
        witnesses: &[StatementText],
        retrieval: &RetrievalResult,
    ) -> Result<AnalysisReport, CognitionError> {
        let draft = Draft::new(incident, witnesses)?;

        if draft.compared_pairs() == 0 {
            tracing::warn!("No pair of documents has readable text, nothing to compare");
            return Ok(draft.finish_basic(Vec::new(), retrieval));
        }

        let Some(backend) = &self.backend else {
            tracing::info!("No reasoning backend configured, using lexical comparison");
            return Ok(draft.finish_basic(vec![EngineState::BackendUnavailable], retrieval));
        };

        let prompt = build_contradiction_prompt(&draft.readable_documents(), retrieval);
        tracing::debug!(
            backend = %backend.name(),
            prompt_chars = prompt.len(),
            "Invoking reasoning backend"
        );

        let response = match backend.generate(SYSTEM_PROMPT, &prompt) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    backend = %backend.name(),
                    error = %e,
                    "Reasoning backend unavailable, falling back to basic analysis"
                );
                return Ok(draft.finish_basic(
                    vec![EngineState::ModelInvoked, EngineState::BackendUnavailable],
                    retrieval,
                ));
            }
        };

        match parse_contradictions(&response) {
            Ok(raw) => Ok(draft.finish_parsed(raw, retrieval)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    response_chars = response.len(),
                    "Discarding unparseable reasoning output"
                );
                Ok(draft.finish_parse_failed(retrieval))
            }
        }
    }

    /// Basic report for a request whose backend call was abandoned, e.g.
    /// after the caller's deadline elapsed.
    pub fn analyze_after_backend_timeout(
        &self,
        incident: &StatementText,
        witnesses: &[StatementText],
        retrieval: &RetrievalResult,
    ) -> Result<AnalysisReport, CognitionError> {
        let draft = Draft::new(incident, witnesses)?;
        let mut transitions = vec![EngineState::BackendUnavailable];
        if self.has_backend() {
            transitions.insert(0, EngineState::ModelInvoked);
        }
        Ok(draft.finish_basic(transitions, retrieval))
    }
}

// ──────────────────────────────────────────────
// Report assembly
// ──────────────────────────────────────────────

/// Per-request working state between `Drafting` and `Finalized`.
struct Draft<'a> {
    incident: &'a StatementText,
    witnesses: &'a [StatementText],
    pairs: Vec<(DocumentRole, DocumentRole)>,
    /// `None` for pairs that were not compared.
    similarities: Vec<Option<f32>>,
}

impl<'a> Draft<'a> {
    fn new(
        incident: &'a StatementText,
        witnesses: &'a [StatementText],
    ) -> Result<Self, CognitionError> {
        if witnesses.is_empty() {
            return Err(CognitionError::InvalidInput(
                "at least one witness statement is required".into(),
            ));
        }
        let roles = std::iter::once((DocumentRole::Incident, incident)).chain(
            witnesses
                .iter()
                .enumerate()
                .map(|(i, w)| (DocumentRole::Witness(i + 1), w)),
        );
        for (role, statement) in roles {
            if statement.readable && statement.text.trim().is_empty() {
                return Err(CognitionError::InvalidInput(format!(
                    "{} text is empty",
                    role.label()
                )));
            }
        }

        let mut pairs = Vec::new();
        for i in 1..=witnesses.len() {
            pairs.push((DocumentRole::Incident, DocumentRole::Witness(i)));
        }
        for i in 1..=witnesses.len() {
            for j in (i + 1)..=witnesses.len() {
                pairs.push((DocumentRole::Witness(i), DocumentRole::Witness(j)));
            }
        }

        let similarities = pairs
            .iter()
            .map(|(a, b)| {
                let a = readable_text(incident, witnesses, *a)?;
                let b = readable_text(incident, witnesses, *b)?;
                Some(jaccard_similarity(a, b))
            })
            .collect();

        Ok(Self {
            incident,
            witnesses,
            pairs,
            similarities,
        })
    }

    /// Text of a known, readable document.
    fn text_of(&self, role: DocumentRole) -> Option<&'a str> {
        readable_text(self.incident, self.witnesses, role)
    }

    fn compared_pairs(&self) -> usize {
        self.similarities.iter().filter(|s| s.is_some()).count()
    }

    /// Readable documents in label order, for the backend prompt.
    fn readable_documents(&self) -> Vec<(DocumentRole, &'a str)> {
        std::iter::once(DocumentRole::Incident)
            .chain((1..=self.witnesses.len()).map(DocumentRole::Witness))
            .filter_map(|role| self.text_of(role).map(|text| (role, text)))
            .collect()
    }

    /// Mean similarity over compared incident–witness pairs.
    fn overall_similarity(&self) -> f32 {
        let incident_pairs: Vec<f32> = self
            .pairs
            .iter()
            .zip(&self.similarities)
            .filter(|((a, _), _)| *a == DocumentRole::Incident)
            .filter_map(|(_, s)| *s)
            .collect();
        if incident_pairs.is_empty() {
            return 0.0;
        }
        incident_pairs.iter().sum::<f32>() / incident_pairs.len() as f32
    }

    fn finish_parsed(
        self,
        raw: Vec<RawContradiction>,
        retrieval: &RetrievalResult,
    ) -> AnalysisReport {
        let proposed = raw.len();
        let contradictions: Vec<Contradiction> =
            raw.into_iter().filter_map(|r| self.normalize(r)).collect();
        if contradictions.len() < proposed {
            tracing::warn!(
                proposed,
                kept = contradictions.len(),
                "Dropped contradictions with unknown or identical sources"
            );
        }

        let mut confidence = FULL_MODE_BASE;
        if !retrieval.is_empty() {
            confidence += 0.15;
        }
        if contradictions.iter().any(|c| c.statute_reference.is_some()) {
            confidence += 0.05;
        }

        self.finish(
            AnalysisMode::Full,
            GenerationOutcome::Parsed,
            vec![EngineState::ModelInvoked, EngineState::Parsed],
            contradictions,
            confidence.min(FULL_MODE_CAP),
            retrieval,
        )
    }

    fn finish_parse_failed(self, retrieval: &RetrievalResult) -> AnalysisReport {
        self.finish(
            AnalysisMode::Full,
            GenerationOutcome::ParseFailed,
            vec![EngineState::ModelInvoked, EngineState::ParseFailed],
            Vec::new(),
            PARSE_FAILED_CONFIDENCE,
            retrieval,
        )
    }

    fn finish_basic(
        self,
        transitions: Vec<EngineState>,
        retrieval: &RetrievalResult,
    ) -> AnalysisReport {
        let contradictions: Vec<Contradiction> = self
            .pairs
            .iter()
            .filter_map(|(a, b)| Some((*a, self.text_of(*a)?, *b, self.text_of(*b)?)))
            .flat_map(|(a, text_a, b, text_b)| {
                rule_based_contradictions(&a.label(), text_a, &b.label(), text_b)
            })
            .collect();
        let confidence = (BASIC_MODE_BASE + 0.2 * self.overall_similarity()).min(BASIC_MODE_CAP);

        self.finish(
            AnalysisMode::Basic,
            GenerationOutcome::BackendUnavailable,
            transitions,
            contradictions,
            confidence,
            retrieval,
        )
    }

    fn finish(
        self,
        mode: AnalysisMode,
        outcome: GenerationOutcome,
        transitions: Vec<EngineState>,
        contradictions: Vec<Contradiction>,
        confidence: f32,
        retrieval: &RetrievalResult,
    ) -> AnalysisReport {
        let pairs: Vec<PairComparison> = self
            .pairs
            .iter()
            .zip(&self.similarities)
            .map(|((a, b), similarity)| {
                let (a, b) = (a.label(), b.label());
                let contradiction_count = contradictions
                    .iter()
                    .filter(|c| c.source_a == a && c.source_b == b)
                    .count();
                PairComparison {
                    source_a: a,
                    source_b: b,
                    compared: similarity.is_some(),
                    similarity: similarity.unwrap_or(0.0),
                    contradiction_count,
                }
            })
            .collect();

        let mut states = vec![EngineState::Drafting];
        states.extend(transitions);
        states.push(EngineState::Finalized);

        let skipped = self.pairs.len() - self.compared_pairs();
        let recommendations = recommendations(mode, outcome, &contradictions, skipped);

        tracing::info!(
            mode = ?mode,
            outcome = ?outcome,
            contradictions = contradictions.len(),
            skipped_pairs = skipped,
            confidence,
            "Contradiction analysis finalized"
        );

        AnalysisReport {
            status: AnalysisStatus::Success,
            mode,
            outcome,
            contradictions,
            pairs,
            overall_similarity: self.overall_similarity(),
            confidence,
            recommendations,
            statute_references: retrieval.references(),
            states,
        }
    }

    /// Resolve source labels onto readable documents and recompute severity.
    fn normalize(&self, raw: RawContradiction) -> Option<Contradiction> {
        let known = |label: &Option<String>| {
            label
                .as_deref()
                .and_then(DocumentRole::parse_label)
                .filter(|role| self.text_of(*role).is_some())
        };

        let statute_reference = raw.statute_reference_text();
        let (mut role_a, mut role_b) = match (known(&raw.source_a), known(&raw.source_b)) {
            (Some(a), Some(b)) => (a, b),
            // Legacy two-document contract carries no labels
            (None, None)
                if raw.source_a.is_none()
                    && raw.source_b.is_none()
                    && self.witnesses.len() == 1
                    && self.compared_pairs() == 1 =>
            {
                (DocumentRole::Incident, DocumentRole::Witness(1))
            }
            _ => return None,
        };
        if role_a == role_b {
            return None;
        }

        let (mut text_a, mut text_b) = (raw.source_text_a, raw.source_text_b);
        if role_b < role_a {
            std::mem::swap(&mut role_a, &mut role_b);
            std::mem::swap(&mut text_a, &mut text_b);
        }

        let label = raw.contradiction_type.trim().to_string();
        Some(Contradiction {
            contradiction_type: canonical_type(&label),
            severity: severity_for(&label),
            label,
            source_a: role_a.label(),
            source_b: role_b.label(),
            source_text_a: text_a,
            source_text_b: text_b,
            explanation: raw.explanation,
            statute_reference,
        })
    }
}

/// Text of `role` when the document exists and was read.
fn readable_text<'a>(
    incident: &'a StatementText,
    witnesses: &'a [StatementText],
    role: DocumentRole,
) -> Option<&'a str> {
    let statement = match role {
        DocumentRole::Incident => incident,
        DocumentRole::Witness(n) => witnesses.get(n.checked_sub(1)?)?,
    };
    statement.readable.then_some(statement.text.as_str())
}

/// Deterministic follow-up actions derived from the finalized contradictions.
fn recommendations(
    mode: AnalysisMode,
    outcome: GenerationOutcome,
    contradictions: &[Contradiction],
    skipped_pairs: usize,
) -> Vec<String> {
    let mut out: Vec<String> = contradictions
        .iter()
        .filter(|c| c.severity == Severity::High)
        .map(|c| {
            format!(
                "Examine {} and {} on the {} discrepancy: '{}' vs '{}'.",
                c.source_a, c.source_b, c.label, c.source_text_a, c.source_text_b
            )
        })
        .collect();

    match (mode, outcome) {
        (AnalysisMode::Basic, _) => out.push(
            "Basic lexical analysis only. Configure a reasoning backend for statute-grounded \
             review."
                .to_string(),
        ),
        (_, GenerationOutcome::ParseFailed) => out.push(
            "Reasoning output could not be parsed. Re-run the analysis or review the statements \
             manually."
                .to_string(),
        ),
        _ => {}
    }

    if skipped_pairs > 0 {
        out.push(format!(
            "{skipped_pairs} document pair(s) were not compared because their text could not be \
             read."
        ));
    } else if contradictions.is_empty() && outcome != GenerationOutcome::ParseFailed {
        out.push("No material contradictions detected between the statements.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cognition::backend::MockReasoningBackend;
    use crate::pipeline::retrieval::{ScoredStatute, StatuteChunk};

    const INCIDENT: &str = "At 10 AM near the Market, A attacked B with a knife.";
    const WITNESS: &str = "I saw B attacked around 12 PM at the Bus Stop by A.";

    fn engine_with(response: &str) -> (ContradictionEngine, Arc<MockReasoningBackend>) {
        let backend = Arc::new(MockReasoningBackend::new(response));
        let engine = ContradictionEngine::new(Some(backend.clone() as Arc<dyn ReasoningBackend>));
        (engine, backend)
    }

    fn statutes() -> RetrievalResult {
        RetrievalResult {
            entries: vec![ScoredStatute {
                chunk: StatuteChunk {
                    section_id: "324".into(),
                    title: "Hurt by dangerous weapons".into(),
                    body: "causing hurt by a knife".into(),
                    embedding: vec![],
                },
                score: 0.7,
            }],
        }
    }

    #[test]
    fn empty_witness_list_is_invalid_input() {
        let err = ContradictionEngine::lexical_only()
            .analyze(INCIDENT, Vec::<String>::new(), &RetrievalResult::empty())
            .unwrap_err();
        assert!(matches!(err, CognitionError::InvalidInput(_)));
    }

    #[test]
    fn blank_incident_or_witness_text_is_invalid_input() {
        let engine = ContradictionEngine::lexical_only();
        let empty = RetrievalResult::empty();

        let err = engine.analyze("", vec!["   "], &empty).unwrap_err();
        assert!(matches!(err, CognitionError::InvalidInput(ref m) if m.contains("incident")));

        let err = engine.analyze(INCIDENT, vec![WITNESS, " \n\t"], &empty).unwrap_err();
        assert!(matches!(err, CognitionError::InvalidInput(ref m) if m.contains("witness_2")));
    }

    #[test]
    fn unreadable_documents_are_never_compared() {
        let report = ContradictionEngine::lexical_only()
            .analyze_statements(
                &StatementText::unreadable(),
                &[StatementText::unreadable()],
                &RetrievalResult::empty(),
            )
            .unwrap();

        assert!(!report.pairs[0].compared);
        assert_eq!(report.pairs[0].similarity, 0.0);
        assert_eq!(report.overall_similarity, 0.0);
        assert!(report.contradictions.is_empty());
        assert!(report.recommendations.iter().any(|r| r.starts_with("1 document pair(s)")));
        assert!(!report
            .recommendations
            .iter()
            .any(|r| r.contains("No material contradictions")));
    }

    #[test]
    fn pairs_with_an_unreadable_witness_are_skipped() {
        let witnesses = [
            StatementText::readable(WITNESS),
            StatementText::unreadable(),
        ];
        let report = ContradictionEngine::lexical_only()
            .analyze_statements(&StatementText::readable(INCIDENT), &witnesses, &statutes())
            .unwrap();

        let compared: Vec<bool> = report.pairs.iter().map(|p| p.compared).collect();
        // incident-w1, incident-w2, w1-w2
        assert_eq!(compared, vec![true, false, false]);
        assert!(report.has_type(ContradictionType::Temporal));
        assert!(report
            .contradictions
            .iter()
            .all(|c| c.source_a != "witness_2" && c.source_b != "witness_2"));
        assert!(report.recommendations.iter().any(|r| r.starts_with("2 document pair(s)")));
    }

    #[test]
    fn unreadable_documents_are_kept_out_of_the_prompt() {
        let (engine, backend) = engine_with(
            r#"[{"contradiction_type":"Time","source_a":"incident","source_b":"witness_2","source_text_a":"10 AM","source_text_b":"noon","explanation":"x"}]"#,
        );
        let witnesses = [StatementText::readable(WITNESS), StatementText::unreadable()];
        let report = engine
            .analyze_statements(&StatementText::readable(INCIDENT), &witnesses, &statutes())
            .unwrap();

        let prompt = backend.last_prompt().unwrap();
        assert!(prompt.contains("<document label=\"witness_1\">"));
        assert!(!prompt.contains("<document label=\"witness_2\">"));
        assert!(report.contradictions.is_empty());
    }

    #[test]
    fn backend_is_skipped_when_nothing_is_readable() {
        let (engine, backend) = engine_with("[]");
        let report = engine
            .analyze_statements(
                &StatementText::readable(INCIDENT),
                &[StatementText::unreadable()],
                &statutes(),
            )
            .unwrap();
        assert_eq!(backend.call_count(), 0);
        assert_eq!(report.mode, AnalysisMode::Basic);
        assert_eq!(report.states, vec![EngineState::Drafting, EngineState::Finalized]);
    }

    #[test]
    fn basic_mode_finds_temporal_and_spatial() {
        let report = ContradictionEngine::lexical_only()
            .analyze(INCIDENT, WITNESS, &RetrievalResult::empty())
            .unwrap();
        assert_eq!(report.mode, AnalysisMode::Basic);
        assert!(report.has_type(ContradictionType::Temporal));
        assert!(report.has_type(ContradictionType::Spatial));
        assert_eq!(
            report.states,
            vec![EngineState::Drafting, EngineState::BackendUnavailable, EngineState::Finalized]
        );
    }

    #[test]
    fn unreachable_backend_degrades_to_basic_below_floor() {
        let backend: Arc<dyn ReasoningBackend> =
            Arc::new(MockReasoningBackend::unavailable("connection refused"));
        let report = ContradictionEngine::new(Some(backend))
            .analyze(INCIDENT, WITNESS, &statutes())
            .unwrap();
        assert_eq!(report.status, AnalysisStatus::Success);
        assert_eq!(report.mode, AnalysisMode::Basic);
        assert_eq!(report.outcome, GenerationOutcome::BackendUnavailable);
        assert!(report.confidence < FULL_MODE_FLOOR);
        assert_eq!(
            report.states,
            vec![
                EngineState::Drafting,
                EngineState::ModelInvoked,
                EngineState::BackendUnavailable,
                EngineState::Finalized
            ]
        );
        assert!(report.recommendations.iter().any(|r| r.contains("Basic lexical analysis")));
    }

    #[test]
    fn basic_confidence_is_capped_even_for_identical_texts() {
        let report = ContradictionEngine::lexical_only()
            .analyze(INCIDENT, INCIDENT, &RetrievalResult::empty())
            .unwrap();
        assert!((report.overall_similarity - 1.0).abs() < f32::EPSILON);
        assert!(report.confidence <= BASIC_MODE_CAP);
    }

    #[test]
    fn backend_severity_is_ignored_and_recomputed() {
        let (engine, _) = engine_with(
            r#"[{"contradiction_type":"Time","source_text_A":"At 10 AM","source_text_B":"around 12 PM","explanation":"Times differ","severity":"Low"},
                {"contradiction_type":"location","source_text_A":"near the Market","source_text_B":"at the Bus Stop","explanation":"Places differ","severity":"High"},
                {"contradiction_type":"Motive","source_text_A":"x","source_text_B":"y","explanation":"z","severity":"High"}]"#,
        );
        let report = engine.analyze(INCIDENT, WITNESS, &statutes()).unwrap();
        assert_eq!(report.mode, AnalysisMode::Full);
        assert_eq!(report.outcome, GenerationOutcome::Parsed);
        assert_eq!(report.contradictions.len(), 3);
        assert_eq!(report.contradictions[0].severity, Severity::High);
        assert_eq!(report.contradictions[1].severity, Severity::Medium);
        assert_eq!(report.contradictions[1].contradiction_type, ContradictionType::Spatial);
        assert_eq!(report.contradictions[2].severity, Severity::Low);
        assert!(report.confidence >= FULL_MODE_FLOOR);
        assert_eq!(report.pairs[0].contradiction_count, 3);
    }

    #[test]
    fn repeated_runs_yield_identical_severities() {
        let response = r#"[{"contradiction_type":"Weapon","source_a":"incident","source_b":"witness_1","source_text_a":"knife","source_text_b":"stick","explanation":"x","severity":"Medium"}]"#;
        let (engine, _) = engine_with(response);
        let first = engine.analyze(INCIDENT, WITNESS, &statutes()).unwrap();
        let second = engine.analyze(INCIDENT, WITNESS, &statutes()).unwrap();
        assert_eq!(first.contradictions, second.contradictions);
        assert_eq!(first.contradictions[0].severity, Severity::High);
    }

    #[test]
    fn fenced_response_is_accepted() {
        let (engine, _) = engine_with("```json\n[]\n```");
        let report = engine.analyze(INCIDENT, WITNESS, &statutes()).unwrap();
        assert_eq!(report.outcome, GenerationOutcome::Parsed);
        assert!(report.contradictions.is_empty());
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("No material contradictions")));
    }

    #[test]
    fn malformed_response_yields_empty_valid_report() {
        let (engine, _) = engine_with("I am unable to comply with JSON today.");
        let report = engine.analyze(INCIDENT, WITNESS, &statutes()).unwrap();
        assert_eq!(report.status, AnalysisStatus::Success);
        assert_eq!(report.outcome, GenerationOutcome::ParseFailed);
        assert!(report.contradictions.is_empty());
        assert_eq!(report.confidence, PARSE_FAILED_CONFIDENCE);
        assert_eq!(
            report.states,
            vec![
                EngineState::Drafting,
                EngineState::ModelInvoked,
                EngineState::ParseFailed,
                EngineState::Finalized
            ]
        );
    }

    #[test]
    fn multi_witness_pairs_and_labels() {
        let response = r#"[
            {"contradiction_type":"Person","source_a":"witness_2","source_b":"witness_1","source_text_a":"by C","source_text_b":"by A","explanation":"Different assailant","statute_reference":"34"},
            {"contradiction_type":"Time","source_a":"incident","source_b":"witness_9","source_text_a":"10 AM","source_text_b":"noon","explanation":"Unknown witness"},
            {"contradiction_type":"Time","source_a":"witness_1","source_b":"witness_1","source_text_a":"a","source_text_b":"b","explanation":"Same document"}
        ]"#;
        let (engine, backend) = engine_with(response);
        let witnesses = vec![
            WITNESS.to_string(),
            "I saw C attack B at 12 PM at the Bus Stop.".to_string(),
        ];
        let report = engine.analyze(INCIDENT, witnesses, &statutes()).unwrap();

        // incident-w1, incident-w2, w1-w2
        assert_eq!(report.pairs.len(), 3);
        assert_eq!(report.pairs[2].source_a, "witness_1");
        assert_eq!(report.pairs[2].source_b, "witness_2");

        assert_eq!(report.contradictions.len(), 1);
        let c = &report.contradictions[0];
        assert_eq!(c.source_a, "witness_1");
        assert_eq!(c.source_b, "witness_2");
        assert_eq!(c.source_text_a, "by A");
        assert_eq!(c.statute_reference.as_deref(), Some("34"));
        assert_eq!(report.pairs[2].contradiction_count, 1);

        let prompt = backend.last_prompt().unwrap();
        assert!(prompt.contains("witness_2"));
        assert!(prompt.contains("Section 324"));
    }

    #[test]
    fn unlabelled_output_is_dropped_with_several_witnesses() {
        let response = r#"[{"contradiction_type":"Time","source_text_A":"a","source_text_B":"b"}]"#;
        let (engine, _) = engine_with(response);
        let report = engine
            .analyze(INCIDENT, vec![WITNESS.to_string(), WITNESS.to_string()], &statutes())
            .unwrap();
        assert!(report.contradictions.is_empty());
        assert_eq!(report.outcome, GenerationOutcome::Parsed);
    }

    #[test]
    fn statute_references_are_reported() {
        let report = ContradictionEngine::lexical_only()
            .analyze(INCIDENT, WITNESS, &statutes())
            .unwrap();
        assert_eq!(report.statute_references.len(), 1);
        assert_eq!(report.statute_references[0].section_id, "324");
    }

    #[test]
    fn timeout_fallback_records_invocation() {
        let (engine, backend) = engine_with("[]");
        let report = engine
            .analyze_after_backend_timeout(
                &StatementText::readable(INCIDENT),
                &[StatementText::readable(WITNESS)],
                &RetrievalResult::empty(),
            )
            .unwrap();
        assert_eq!(report.mode, AnalysisMode::Basic);
        assert!(report.confidence < FULL_MODE_FLOOR);
        assert_eq!(report.states[1], EngineState::ModelInvoked);
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn high_severity_contradictions_produce_recommendations() {
        let report = ContradictionEngine::lexical_only()
            .analyze(INCIDENT, WITNESS, &RetrievalResult::empty())
            .unwrap();
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.starts_with("Examine incident and witness_1 on the Time discrepancy")));
    }
}
