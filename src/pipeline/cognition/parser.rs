//! Lenient parsing of the reasoning backend's contradiction list.
//!
//! Wrapper markers (code fences, leading or trailing prose) are stripped.
//! Anything that does not then parse into the expected shape is rejected
//! as a whole; callers discard the response.

use serde::Deserialize;
use serde_json::Value;

use super::CognitionError;

/// One contradiction as proposed by the backend, before normalization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawContradiction {
    #[serde(alias = "type", alias = "contradictionType")]
    pub contradiction_type: String,
    #[serde(default, alias = "source_A", alias = "document_a")]
    pub source_a: Option<String>,
    #[serde(default, alias = "source_B", alias = "document_b")]
    pub source_b: Option<String>,
    #[serde(default, alias = "source_text_A", alias = "sourceExcerptA")]
    pub source_text_a: String,
    #[serde(default, alias = "source_text_B", alias = "sourceExcerptB")]
    pub source_text_b: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub statute_reference: Option<Value>,
    /// Accepted and ignored; severity is recomputed from the label.
    #[serde(default)]
    pub severity: Option<Value>,
}

impl RawContradiction {
    /// Statute reference as text; numbers and strings are both accepted.
    pub fn statute_reference_text(&self) -> Option<String> {
        match &self.statute_reference {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Parse a raw backend response into contradictions.
///
/// Accepts a bare array or an object wrapping it under `contradictions`.
pub fn parse_contradictions(response: &str) -> Result<Vec<RawContradiction>, CognitionError> {
    let payload = extract_json_payload(response)?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| CognitionError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("contradictions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(CognitionError::MalformedResponse(
                    "expected a JSON array of contradictions".into(),
                ))
            }
        },
        _ => {
            return Err(CognitionError::MalformedResponse(
                "expected a JSON array of contradictions".into(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let raw: RawContradiction = serde_json::from_value(item)
                .map_err(|e| CognitionError::MalformedResponse(format!("element {i}: {e}")))?;
            if raw.contradiction_type.trim().is_empty() {
                return Err(CognitionError::MalformedResponse(format!(
                    "element {i}: empty contradiction_type"
                )));
            }
            Ok(raw)
        })
        .collect()
}

/// Locate the JSON payload inside a response that may carry fences or prose.
fn extract_json_payload(response: &str) -> Result<&str, CognitionError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') || block.starts_with('[') {
                return Ok(block);
            }
        }
    }

    // Whichever structure opens first decides the closing delimiter
    let open_array = trimmed.find('[');
    let open_object = trimmed.find('{');
    let (start, close) = match (open_array, open_object) {
        (Some(a), Some(o)) if o < a => (o, '}'),
        (Some(a), _) => (a, ']'),
        (None, Some(o)) => (o, '}'),
        (None, None) => {
            return Err(CognitionError::MalformedResponse(
                "no JSON block found in response".into(),
            ))
        }
    };

    match trimmed.rfind(close) {
        Some(end) if end > start => Ok(&trimmed[start..=end]),
        _ => Err(CognitionError::MalformedResponse(
            "unterminated JSON block in response".into(),
        )),
    }
}
