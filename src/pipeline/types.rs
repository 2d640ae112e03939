use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

/// Media family of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Pdf,
    Unknown,
}

impl MediaKind {
    /// Best guess from the filename extension alone.
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("jpg" | "jpeg" | "png" | "tif" | "tiff" | "webp" | "gif" | "bmp") => Self::Image,
            _ => Self::Unknown,
        }
    }
}

/// Position of a document within an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentRole {
    Incident,
    /// 1-based witness index.
    Witness(usize),
}

impl DocumentRole {
    /// Stable label used in prompts, contradictions and reports.
    pub fn label(&self) -> String {
        match self {
            Self::Incident => "incident".to_string(),
            Self::Witness(n) => format!("witness_{n}"),
        }
    }

    /// Ledger document-type label.
    pub fn document_type(&self) -> &'static str {
        match self {
            Self::Incident => "incident_report",
            Self::Witness(_) => "witness_statement",
        }
    }

    /// Inverse of [`DocumentRole::label`].
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "incident" | "fir" | "incident_report" => Some(Self::Incident),
            other => other
                .strip_prefix("witness_")
                .or_else(|| other.strip_prefix("witness"))
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .map(Self::Witness),
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for DocumentRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

/// An uploaded document. Immutable once received; the byte buffer is
/// shared between the trust and perception branches without copying.
#[derive(Debug, Clone)]
pub struct Document {
    pub role: DocumentRole,
    pub filename: String,
    pub declared_kind: MediaKind,
    bytes: Arc<[u8]>,
}

impl Document {
    pub fn new(
        role: DocumentRole,
        filename: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let filename = filename.into();
        let declared_kind = MediaKind::from_filename(&filename);
        Self {
            role,
            filename,
            declared_kind,
            bytes: bytes.into(),
        }
    }

    pub fn incident(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(DocumentRole::Incident, filename, bytes)
    }

    pub fn witness(index: usize, filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(DocumentRole::Witness(index), filename, bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle to the shared byte buffer.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
