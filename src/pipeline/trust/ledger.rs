use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use super::hash::ContentFingerprint;
use super::types::{
    mock_transaction_id, AnchorRecord, VerificationRecord, VerificationStatus,
};
use crate::config::LedgerMode;

/// Durable recording of content fingerprints.
///
/// Implementations are blocking and must never panic or raise: every
/// failure becomes a `Failed` record (anchor) or an `Unavailable`
/// verification.
pub trait LedgerAnchor: Send + Sync {
    fn mode(&self) -> LedgerMode;

    /// Anchor with an attached metadata excerpt (at most 500 characters are sent).
    fn anchor_with_metadata(
        &self,
        fingerprint: &ContentFingerprint,
        document_type: &str,
        metadata: &str,
    ) -> AnchorRecord;

    fn anchor(&self, fingerprint: &ContentFingerprint, document_type: &str) -> AnchorRecord {
        self.anchor_with_metadata(fingerprint, document_type, "")
    }

    fn verify(&self, fingerprint: &ContentFingerprint) -> VerificationRecord;
}

// ──────────────────────────────────────────────
// MockLedger
// ──────────────────────────────────────────────

const MOCK_SUBMITTER: &str = "mock-ledger";

/// Local ledger with reproducible transaction ids.
///
/// Anchors are remembered in-process so `verify` can answer for documents
/// anchored by the same process.
pub struct MockLedger {
    registry: Mutex<HashMap<String, AnchorRecord>>,
    latency: Option<Duration>,
    failure: Option<String>,
    /// Digest -> failure reason, for fingerprints that must not anchor.
    rejected: HashMap<String, String>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            latency: None,
            failure: None,
            rejected: HashMap::new(),
        }
    }

    /// Sleep before answering (exercises caller timeouts).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every anchor attempt fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new()
        }
    }

    /// Anchors of `fingerprint` fail with `reason`; every other fingerprint
    /// is confirmed.
    pub fn failing_for(mut self, fingerprint: &ContentFingerprint, reason: &str) -> Self {
        self.rejected.insert(fingerprint.digest.clone(), reason.to_string());
        self
    }

    pub fn anchored_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerAnchor for MockLedger {
    fn mode(&self) -> LedgerMode {
        LedgerMode::Mock
    }

    fn anchor_with_metadata(
        &self,
        fingerprint: &ContentFingerprint,
        document_type: &str,
        _metadata: &str,
    ) -> AnchorRecord {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let failure = self
            .failure
            .as_ref()
            .or_else(|| self.rejected.get(&fingerprint.digest));
        if let Some(reason) = failure {
            tracing::warn!(
                fingerprint = %fingerprint.prefix(16),
                reason = %reason,
                "Mock anchor failed"
            );
            return AnchorRecord::failed(
                fingerprint,
                LedgerMode::Mock,
                None,
                document_type,
                reason.clone(),
            );
        }

        let record = AnchorRecord::confirmed(
            fingerprint,
            LedgerMode::Mock,
            mock_transaction_id(fingerprint),
            None,
            document_type,
        );

        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(fingerprint.digest.clone())
            .or_insert_with(|| record.clone());

        tracing::debug!(
            fingerprint = %fingerprint.prefix(16),
            tx = %record.transaction_id,
            "Mock anchor recorded"
        );
        record
    }

    fn verify(&self, fingerprint: &ContentFingerprint) -> VerificationRecord {
        let registry = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match registry.get(&fingerprint.digest) {
            Some(record) => VerificationRecord {
                fingerprint: fingerprint.digest.clone(),
                mode: LedgerMode::Mock,
                status: VerificationStatus::Found,
                exists: true,
                document_type: Some(record.document_type.clone()),
                submitter: Some(MOCK_SUBMITTER.to_string()),
                timestamp: Some(record.anchored_at),
                transaction_id: Some(record.transaction_id.clone()),
                reason: None,
            },
            None => {
                let mut not_found = VerificationRecord::not_found(fingerprint, LedgerMode::Mock);
                not_found.reason = Some(format!(
                    "not anchored in this process (checked at {})",
                    Utc::now().to_rfc3339()
                ));
                not_found
            }
        }
    }
}
