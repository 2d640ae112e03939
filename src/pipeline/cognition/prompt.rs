//! Reasoning prompt for contradiction analysis.

use crate::pipeline::retrieval::RetrievalResult;
use crate::pipeline::types::DocumentRole;

pub const SYSTEM_PROMPT: &str = "You are a Senior Judicial Magistrate assisting in preliminary \
case analysis. You compare statements strictly on their stated facts and never speculate \
beyond the text. You answer with JSON only.";

const NO_STATUTE_CONTEXT: &str = "(no statute context retrieved)";

/// Build the user prompt: labelled documents, statute context, output contract.
/// Only the documents passed in are shown to the model.
pub fn build_contradiction_prompt(
    documents: &[(DocumentRole, &str)],
    retrieval: &RetrievalResult,
) -> String {
    let context = if retrieval.is_empty() {
        NO_STATUTE_CONTEXT.to_string()
    } else {
        retrieval.context_text()
    };

    let documents: String = documents
        .iter()
        .map(|(role, text)| {
            format!(
                "<document label=\"{}\">\n{}\n</document>\n",
                role.label(),
                text.trim()
            )
        })
        .collect();

    format!(
        "Analyze contradictions between the incident report and the witness statements.

Relevant statute sections:
{context}

Instructions:
1. Extract the entities (Time, Place, Person, Action, Weapon) stated in each document.
2. Compare every witness statement against the incident report, and every witness statement \
against every other witness statement.
3. Flag each factual discrepancy between two documents.
4. Where a discrepancy bears on one of the statute sections above, cite its section number.
5. Output ONLY a JSON array. No markdown, no comments, no prose. Return [] when there are no \
contradictions.
   Each element must have the keys:
   contradiction_type  one of Time, Location, Person, Accused, Weapon, Action,
                       Event Description, Other
   source_a            label of the first document
   source_b            label of the second document
   source_text_a       exact excerpt from the first document
   source_text_b       exact excerpt from the second document
   explanation         one sentence
   statute_reference   section number or null

Documents:
{documents}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retrieval::{ScoredStatute, StatuteChunk};

    fn pair() -> [(DocumentRole, &'static str); 2] {
        [(DocumentRole::Incident, "a"), (DocumentRole::Witness(1), "b")]
    }

    #[test]
    fn prompt_labels_every_document() {
        let documents = [
            (DocumentRole::Incident, "the incident"),
            (DocumentRole::Witness(1), "first account"),
            (DocumentRole::Witness(2), "second account"),
        ];
        let prompt = build_contradiction_prompt(&documents, &RetrievalResult::empty());
        assert!(prompt.contains("<document label=\"incident\">\nthe incident"));
        assert!(prompt.contains("<document label=\"witness_1\">\nfirst account"));
        assert!(prompt.contains("<document label=\"witness_2\">\nsecond account"));
        assert!(prompt.contains(NO_STATUTE_CONTEXT));
    }

    #[test]
    fn prompt_embeds_statute_context() {
        let retrieval = RetrievalResult {
            entries: vec![ScoredStatute {
                chunk: StatuteChunk {
                    section_id: "324".into(),
                    title: "Hurt by dangerous weapons".into(),
                    body: "Whoever voluntarily causes hurt by a knife".into(),
                    embedding: vec![],
                },
                score: 0.8,
            }],
        };
        let prompt = build_contradiction_prompt(&pair(), &retrieval);
        assert!(prompt.contains("Section 324 (Hurt by dangerous weapons)"));
        assert!(!prompt.contains(NO_STATUTE_CONTEXT));
    }

    #[test]
    fn prompt_states_output_contract() {
        let prompt = build_contradiction_prompt(&pair(), &RetrievalResult::empty());
        let keys = [
            "contradiction_type",
            "source_text_a",
            "source_text_b",
            "explanation",
            "statute_reference",
        ];
        for key in keys {
            assert!(prompt.contains(key), "missing {key}");
        }
    }

    #[test]
    fn prompt_shows_only_given_documents() {
        let documents = [
            (DocumentRole::Incident, "the incident"),
            (DocumentRole::Witness(2), "second"),
        ];
        let prompt = build_contradiction_prompt(&documents, &RetrievalResult::empty());
        assert!(prompt.contains("<document label=\"witness_2\">"));
        assert!(!prompt.contains("<document label=\"witness_1\">"));
    }
}
