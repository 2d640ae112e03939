//! Lexical comparison used when no reasoning backend is available.
//!
//! Token-set Jaccard similarity per document pair, plus two deterministic
//! rules: differing clock times (Time) and differing named places after a
//! location preposition (Location).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::severity::{canonical_type, severity_for};
use super::types::Contradiction;

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?m\b\.?")
        .expect("static clock-time pattern")
});

/// `near the Market`, `at the Bus Stop`, `in Connaught Place`.
static NAMED_PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:near|at|in|outside|behind)\s+(?i:the\s+)?([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*)")
        .expect("static named-place pattern")
});

/// Lower-cased token set. Splits on whitespace and punctuation only, so
/// combining marks in Indic scripts stay attached to their letters.
pub fn token_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '।')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard index of the two token sets. Two empty texts score 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let left = token_set(a);
    let right = token_set(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    intersection as f32 / union as f32
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mention {
    /// Text as it appears in the document.
    excerpt: String,
    /// Comparison key.
    key: String,
}

fn clock_times(text: &str) -> Vec<Mention> {
    CLOCK_TIME
        .captures_iter(text)
        .filter_map(|caps| {
            let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
            if hour == 0 || hour > 12 {
                return None;
            }
            let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
            let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
            let hour24 = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            Some(Mention {
                excerpt: caps.get(0)?.as_str().trim().to_string(),
                key: format!("{hour24:02}:{minute:02}"),
            })
        })
        .collect()
}

fn named_places(text: &str) -> Vec<Mention> {
    NAMED_PLACE
        .captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            Some(Mention {
                excerpt: caps.get(0)?.as_str().trim().to_string(),
                key: name.to_lowercase(),
            })
        })
        .collect()
}

/// Both documents mention the attribute, and no value is shared.
fn disagreement<'a>(a: &'a [Mention], b: &'a [Mention]) -> Option<(&'a Mention, &'a Mention)> {
    let (first_a, first_b) = (a.first()?, b.first()?);
    let keys_a: BTreeSet<&str> = a.iter().map(|m| m.key.as_str()).collect();
    if b.iter().any(|m| keys_a.contains(m.key.as_str())) {
        return None;
    }
    Some((first_a, first_b))
}

/// Rule-based contradictions between two labelled texts.
pub fn rule_based_contradictions(
    label_a: &str,
    text_a: &str,
    label_b: &str,
    text_b: &str,
) -> Vec<Contradiction> {
    let mut found = Vec::new();

    let (times_a, times_b) = (clock_times(text_a), clock_times(text_b));
    if let Some((a, b)) = disagreement(&times_a, &times_b) {
        found.push(contradiction(
            "Time",
            label_a,
            label_b,
            a,
            b,
            format!(
                "{label_a} places the event at {} while {label_b} places it at {}.",
                a.excerpt, b.excerpt
            ),
        ));
    }

    let (places_a, places_b) = (named_places(text_a), named_places(text_b));
    if let Some((a, b)) = disagreement(&places_a, &places_b) {
        found.push(contradiction(
            "Location",
            label_a,
            label_b,
            a,
            b,
            format!(
                "{label_a} names the location as '{}' while {label_b} says '{}'.",
                a.excerpt, b.excerpt
            ),
        ));
    }

    found
}

fn contradiction(
    label: &str,
    source_a: &str,
    source_b: &str,
    a: &Mention,
    b: &Mention,
    explanation: String,
) -> Contradiction {
    Contradiction {
        contradiction_type: canonical_type(label),
        label: label.to_string(),
        source_a: source_a.to_string(),
        source_b: source_b.to_string(),
        source_text_a: a.excerpt.clone(),
        source_text_b: b.excerpt.clone(),
        severity: severity_for(label),
        explanation,
        statute_reference: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cognition::types::{ContradictionType, Severity};

    const INCIDENT: &str = "At 10 AM near the Market, A attacked B with a knife.";
    const WITNESS: &str = "I saw B attacked around 12 PM at the Bus Stop by A.";

    #[test]
    fn jaccard_bounds() {
        assert_eq!(jaccard_similarity("a b c", "a b c"), 1.0);
        assert_eq!(jaccard_similarity("a b", "c d"), 0.0);
        assert_eq!(jaccard_similarity("", ""), 0.0);
        let s = jaccard_similarity(INCIDENT, WITNESS);
        assert!(s > 0.0 && s < 1.0);
    }

    #[test]
    fn tokens_ignore_case_and_punctuation() {
        let tokens = token_set("Market, market. MARKET!");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("market"));
    }

    #[test]
    fn devanagari_tokens_keep_vowel_signs() {
        let tokens = token_set("गवाह ने देखा।");
        assert!(tokens.contains("गवाह"));
        assert!(tokens.contains("देखा"));
    }

    #[test]
    fn clock_times_normalize_to_24h() {
        let keys: Vec<String> = clock_times("at 10 AM, then 12 p.m., then 12:30am and 7:05 PM")
            .into_iter()
            .map(|m| m.key)
            .collect();
        assert_eq!(keys, vec!["10:00", "12:00", "00:30", "19:05"]);
    }

    #[test]
    fn named_places_capture_capitalized_phrase() {
        let places = named_places(WITNESS);
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].key, "bus stop");
        assert_eq!(places[0].excerpt, "at the Bus Stop");
        // "At 10 AM" is not a place
        assert_eq!(named_places(INCIDENT)[0].key, "market");
        assert_eq!(named_places(INCIDENT).len(), 1);
    }

    #[test]
    fn incident_and_witness_disagree_on_time_and_place() {
        let found = rule_based_contradictions("incident", INCIDENT, "witness_1", WITNESS);
        let time = found
            .iter()
            .find(|c| c.contradiction_type == ContradictionType::Temporal)
            .unwrap();
        assert_eq!(time.severity, Severity::High);
        assert_eq!(time.source_text_a, "10 AM");
        assert_eq!(time.source_text_b, "12 PM");
        let place = found
            .iter()
            .find(|c| c.contradiction_type == ContradictionType::Spatial)
            .unwrap();
        assert_eq!(place.severity, Severity::Medium);
        assert_eq!(place.source_a, "incident");
        assert_eq!(place.source_b, "witness_1");
    }

    #[test]
    fn shared_time_is_not_a_contradiction() {
        let found = rule_based_contradictions(
            "witness_1",
            "It happened at 10 AM near the Market.",
            "witness_2",
            "Around 10:00 a.m. I was near the Market.",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn one_sided_mention_is_not_a_contradiction() {
        let found = rule_based_contradictions(
            "incident",
            "At 10 AM A attacked B.",
            "witness_1",
            "A attacked B.",
        );
        assert!(found.is_empty());
    }
}
