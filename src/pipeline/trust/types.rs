use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hash::ContentFingerprint;
use crate::config::LedgerMode;

/// Hex characters of the fingerprint embedded in derived transaction ids.
pub const TX_PREFIX_LEN: usize = 24;

/// Maximum metadata characters sent with an anchoring request.
pub const METADATA_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Outcome of one anchoring attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub fingerprint: String,
    pub algorithm: String,
    pub mode: LedgerMode,
    /// Never empty, even for failed attempts.
    pub transaction_id: String,
    pub block_number: Option<u64>,
    pub status: AnchorStatus,
    pub failure_reason: Option<String>,
    pub document_type: String,
    pub anchored_at: DateTime<Utc>,
}

impl AnchorRecord {
    pub fn confirmed(
        fingerprint: &ContentFingerprint,
        mode: LedgerMode,
        transaction_id: String,
        block_number: Option<u64>,
        document_type: &str,
    ) -> Self {
        Self {
            fingerprint: fingerprint.digest.clone(),
            algorithm: fingerprint.algorithm.clone(),
            mode,
            transaction_id,
            block_number,
            status: AnchorStatus::Confirmed,
            failure_reason: None,
            document_type: document_type.to_string(),
            anchored_at: Utc::now(),
        }
    }

    /// Failed attempt. Without a ledger-assigned id the record carries a
    /// deterministic `unsubmitted-<prefix>` id.
    pub fn failed(
        fingerprint: &ContentFingerprint,
        mode: LedgerMode,
        transaction_id: Option<String>,
        document_type: &str,
        reason: impl Into<String>,
    ) -> Self {
        let transaction_id = transaction_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| unsubmitted_transaction_id(fingerprint));
        Self {
            fingerprint: fingerprint.digest.clone(),
            algorithm: fingerprint.algorithm.clone(),
            mode,
            transaction_id,
            block_number: None,
            status: AnchorStatus::Failed,
            failure_reason: Some(reason.into()),
            document_type: document_type.to_string(),
            anchored_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == AnchorStatus::Confirmed
    }
}

pub fn mock_transaction_id(fingerprint: &ContentFingerprint) -> String {
    format!("mock-{}", fingerprint.prefix(TX_PREFIX_LEN))
}

pub fn unsubmitted_transaction_id(fingerprint: &ContentFingerprint) -> String {
    format!("unsubmitted-{}", fingerprint.prefix(TX_PREFIX_LEN))
}

/// Truncate on a character boundary.
pub fn metadata_excerpt(metadata: &str) -> String {
    metadata.chars().take(METADATA_EXCERPT_CHARS).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Found,
    NotFound,
    /// The ledger could not be queried.
    Unavailable,
}

/// Result of looking a fingerprint up on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub fingerprint: String,
    pub mode: LedgerMode,
    pub status: VerificationStatus,
    pub exists: bool,
    pub document_type: Option<String>,
    pub submitter: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub reason: Option<String>,
}

impl VerificationRecord {
    pub fn not_found(fingerprint: &ContentFingerprint, mode: LedgerMode) -> Self {
        Self {
            fingerprint: fingerprint.digest.clone(),
            mode,
            status: VerificationStatus::NotFound,
            exists: false,
            document_type: None,
            submitter: None,
            timestamp: None,
            transaction_id: None,
            reason: None,
        }
    }

    pub fn unavailable(
        fingerprint: &ContentFingerprint,
        mode: LedgerMode,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: VerificationStatus::Unavailable,
            reason: Some(reason.into()),
            ..Self::not_found(fingerprint, mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::trust::hash::hash;

    #[test]
    fn failed_record_without_tx_gets_unsubmitted_id() {
        let fp = hash(b"doc");
        let record = AnchorRecord::failed(&fp, LedgerMode::Live, None, "witness_statement", "down");
        assert_eq!(record.status, AnchorStatus::Failed);
        assert_eq!(record.transaction_id, format!("unsubmitted-{}", &fp.digest[..24]));
        assert_eq!(record.failure_reason.as_deref(), Some("down"));
    }

    #[test]
    fn failed_record_keeps_ledger_tx() {
        let fp = hash(b"doc");
        let record = AnchorRecord::failed(
            &fp,
            LedgerMode::Live,
            Some("0xabc".into()),
            "incident_report",
            "timeout",
        );
        assert_eq!(record.transaction_id, "0xabc");
    }

    #[test]
    fn empty_tx_is_replaced() {
        let fp = hash(b"doc");
        let record = AnchorRecord::failed(&fp, LedgerMode::Live, Some(String::new()), "x", "r");
        assert!(record.transaction_id.starts_with("unsubmitted-"));
    }

    #[test]
    fn metadata_excerpt_truncates_on_chars() {
        let long = "अ".repeat(600);
        assert_eq!(metadata_excerpt(&long).chars().count(), 500);
        assert_eq!(metadata_excerpt("short"), "short");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&AnchorStatus::Confirmed).unwrap(), "\"confirmed\"");
        assert_eq!(
            serde_json::to_string(&VerificationStatus::NotFound).unwrap(),
            "\"not_found\""
        );
    }
}
