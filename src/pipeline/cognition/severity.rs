use super::types::{ContradictionType, Severity};

const HIGH_LABELS: &[&str] = &["time", "person", "accused", "weapon"];
const MEDIUM_LABELS: &[&str] = &["location", "event description", "action"];

/// Deterministic severity from a contradiction label.
///
/// `{Time, Person, Accused, Weapon}` are High, `{Location, Event Description,
/// Action}` are Medium, everything else is Low. Matching is case-insensitive
/// on the trimmed label; `Temporal` and `Spatial` are read as `Time` and
/// `Location`.
pub fn severity_for(label: &str) -> Severity {
    let normalized = normalize(label);
    let key = match normalized.as_str() {
        "temporal" => "time",
        "spatial" => "location",
        other => other,
    };

    if HIGH_LABELS.contains(&key) {
        Severity::High
    } else if MEDIUM_LABELS.contains(&key) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Map a free-form label onto a canonical contradiction type.
pub fn canonical_type(label: &str) -> ContradictionType {
    match normalize(label).as_str() {
        "time" | "temporal" | "date" | "timing" => ContradictionType::Temporal,
        "location" | "spatial" | "place" => ContradictionType::Spatial,
        "person" | "accused" | "victim" | "identity" => ContradictionType::Person,
        "event" | "event description" | "action" | "weapon" | "sequence" => {
            ContradictionType::Event
        }
        _ => ContradictionType::Other,
    }
}

/// Lower-case, trim, collapse inner whitespace and underscores.
fn normalize(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table() {
        assert_eq!(severity_for("Time"), Severity::High);
        assert_eq!(severity_for("Person"), Severity::High);
        assert_eq!(severity_for("Accused"), Severity::High);
        assert_eq!(severity_for("Weapon"), Severity::High);
        assert_eq!(severity_for("Location"), Severity::Medium);
        assert_eq!(severity_for("Event Description"), Severity::Medium);
        assert_eq!(severity_for("Action"), Severity::Medium);
        assert_eq!(severity_for("Unknown"), Severity::Low);
        assert_eq!(severity_for(""), Severity::Low);
    }

    #[test]
    fn severity_is_case_and_space_insensitive() {
        assert_eq!(severity_for("  time "), Severity::High);
        assert_eq!(severity_for("EVENT   description"), Severity::Medium);
        assert_eq!(severity_for("event_description"), Severity::Medium);
    }

    #[test]
    fn canonical_aliases_share_severity() {
        assert_eq!(severity_for("Temporal"), severity_for("Time"));
        assert_eq!(severity_for("Spatial"), severity_for("Location"));
    }

    #[test]
    fn severity_is_idempotent() {
        for label in ["Time", "Location", "Weapon", "Motive", "Temporal"] {
            assert_eq!(severity_for(label), severity_for(label));
        }
        // Temporal and Spatial keep their source label's severity
        assert_eq!(severity_for(canonical_type("Time").as_str()), Severity::High);
        assert_eq!(severity_for(canonical_type("Location").as_str()), Severity::Medium);
    }

    #[test]
    fn canonical_type_mapping() {
        assert_eq!(canonical_type("Time"), ContradictionType::Temporal);
        assert_eq!(canonical_type("Location"), ContradictionType::Spatial);
        assert_eq!(canonical_type("Accused"), ContradictionType::Person);
        assert_eq!(canonical_type("Weapon"), ContradictionType::Event);
        assert_eq!(canonical_type("Event Description"), ContradictionType::Event);
        assert_eq!(canonical_type("Motive"), ContradictionType::Other);
    }
}
