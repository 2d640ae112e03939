use serde::{Deserialize, Serialize};

/// One statute section with its embedding. Immutable once indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuteChunk {
    pub section_id: String,
    pub title: String,
    pub body: String,
    pub embedding: Vec<f32>,
}

impl StatuteChunk {
    /// Text that is embedded and shown to the reasoning backend.
    pub fn passage(&self) -> String {
        if self.title.is_empty() {
            format!("Section {}: {}", self.section_id, self.body)
        } else {
            format!("Section {} ({}): {}", self.section_id, self.title, self.body)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredStatute {
    pub chunk: StatuteChunk,
    pub score: f32,
}

/// Ranked statutes, non-increasing by score; length `min(k, index size)`.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub entries: Vec<ScoredStatute>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Passages joined for prompt context.
    pub fn context_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.chunk.passage())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn references(&self) -> Vec<StatuteReference> {
        self.entries
            .iter()
            .map(|e| StatuteReference {
                section_id: e.chunk.section_id.clone(),
                title: e.chunk.title.clone(),
                score: e.score,
            })
            .collect()
    }
}

/// Statute cited in a report (no body, no embedding).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatuteReference {
    pub section_id: String,
    pub title: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, title: &str) -> StatuteChunk {
        StatuteChunk {
            section_id: id.into(),
            title: title.into(),
            body: "Whoever commits murder shall be punished.".into(),
            embedding: vec![1.0],
        }
    }

    #[test]
    fn passage_includes_title_when_present() {
        assert_eq!(
            chunk("302", "Punishment for murder").passage(),
            "Section 302 (Punishment for murder): Whoever commits murder shall be punished."
        );
        assert!(chunk("302", "").passage().starts_with("Section 302: "));
    }

    #[test]
    fn context_and_references_follow_order() {
        let result = RetrievalResult {
            entries: vec![
                ScoredStatute { chunk: chunk("302", "Murder"), score: 0.9 },
                ScoredStatute { chunk: chunk("324", "Hurt by dangerous weapons"), score: 0.5 },
            ],
        };
        let ctx = result.context_text();
        assert!(ctx.find("302").unwrap() < ctx.find("324").unwrap());
        let refs = result.references();
        assert_eq!(refs[1].section_id, "324");
        assert_eq!(result.len(), 2);
    }
}
