use std::path::Path;

use serde_json::Value;

use super::RetrievalError;

/// One statute section as read from the corpus file, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSection {
    pub section_id: String,
    pub title: String,
    pub body: String,
}

const SECTION_KEYS: &[&str] = &["section", "Section", "section_number", "section_id"];
const TITLE_KEYS: &[&str] = &["title", "section_title", "description", "Description"];
const BODY_KEYS: &[&str] = &["law_text", "text", "body", "content"];
const PUNISHMENT_KEYS: &[&str] = &["punishment", "Punishment"];

/// Read and parse a corpus file.
pub fn load_corpus(path: &Path) -> Result<Vec<CorpusSection>, RetrievalError> {
    let raw = std::fs::read_to_string(path)?;
    parse_corpus(&raw)
}

/// Accepts a JSON array of sections or `{ "sections": [...] }`, with
/// several key spellings per field. Sections without any body text are
/// skipped. When an entry has no separate body, its title/description is
/// used as the body.
pub fn parse_corpus(raw: &str) -> Result<Vec<CorpusSection>, RetrievalError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| RetrievalError::CorpusParse(e.to_string()))?;

    let entries = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("sections") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => {
                return Err(RetrievalError::CorpusParse(
                    "expected an array or an object with a `sections` array".into(),
                ))
            }
        },
        _ => {
            return Err(RetrievalError::CorpusParse(
                "expected an array or an object with a `sections` array".into(),
            ))
        }
    };

    let mut sections = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;

    for (position, entry) in entries.iter().enumerate() {
        match parse_entry(entry, position) {
            Some(section) => sections.push(section),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, kept = sections.len(), "Corpus entries without body text skipped");
    }
    if sections.is_empty() {
        return Err(RetrievalError::EmptyCorpus);
    }
    Ok(sections)
}

fn parse_entry(entry: &Value, position: usize) -> Option<CorpusSection> {
    let object = entry.as_object()?;
    let field = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .filter_map(|k| object.get(*k))
            .find_map(value_as_text)
    };

    let section_id = field(SECTION_KEYS).unwrap_or_else(|| format!("unnumbered-{}", position + 1));
    let title = field(TITLE_KEYS).unwrap_or_default();
    let mut body = match field(BODY_KEYS) {
        Some(body) => body,
        None if !title.is_empty() => title.clone(),
        None => return None,
    };

    if let Some(punishment) = field(PUNISHMENT_KEYS) {
        body = format!("{body} Punishment: {punishment}");
    }

    Some(CorpusSection {
        section_id,
        title,
        body,
    })
}

/// Non-empty string, or a number rendered as text.
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_array() {
        let raw = r#"[{"section": "302", "title": "Punishment for murder", "law_text": "Whoever commits murder..."}]"#;
        let sections = parse_corpus(raw).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_id, "302");
        assert_eq!(sections[0].title, "Punishment for murder");
        assert_eq!(sections[0].body, "Whoever commits murder...");
    }

    #[test]
    fn parses_sections_object_and_key_variants() {
        let raw = r#"{"sections": [
            {"Section": 324, "Description": "Voluntarily causing hurt by dangerous weapons", "Punishment": "3 years"},
            {"section_number": "34", "section_title": "Common intention", "law_text": "When a criminal act is done by several persons"}
        ]}"#;
        let sections = parse_corpus(raw).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].section_id, "324");
        assert_eq!(
            sections[0].body,
            "Voluntarily causing hurt by dangerous weapons Punishment: 3 years"
        );
        assert_eq!(sections[1].section_id, "34");
        assert_eq!(sections[1].title, "Common intention");
    }

    #[test]
    fn entries_without_text_are_skipped() {
        let raw = r#"[{"section": "1"}, {"section": "2", "text": "Title and extent"}, "junk"]"#;
        let sections = parse_corpus(raw).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_id, "2");
    }

    #[test]
    fn missing_section_number_gets_positional_id() {
        let raw = r#"[{"text": "orphan clause"}]"#;
        assert_eq!(parse_corpus(raw).unwrap()[0].section_id, "unnumbered-1");
    }

    #[test]
    fn empty_corpus_is_an_error() {
        assert!(matches!(parse_corpus("[]"), Err(RetrievalError::EmptyCorpus)));
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        assert!(matches!(parse_corpus(r#"{"items": []}"#), Err(RetrievalError::CorpusParse(_))));
        assert!(matches!(parse_corpus("not json"), Err(RetrievalError::CorpusParse(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipc.json");
        std::fs::write(&path, r#"[{"section": "420", "law_text": "Cheating"}]"#).unwrap();
        assert_eq!(load_corpus(&path).unwrap()[0].section_id, "420");
    }
}
