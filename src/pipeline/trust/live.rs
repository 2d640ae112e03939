//! Evidence vault client over the Ethereum JSON-RPC API.
//!
//! Anchoring sends a signed legacy (EIP-155) transaction calling
//! `storeEvidence(bytes32,string,string)` on the vault contract, then polls
//! `eth_getTransactionReceipt` until the transaction is mined or the
//! confirmation deadline passes. Verification is a read-only `eth_call` to
//! `verifyEvidence(bytes32)`.
//!
//! Every request made while anchoring is bounded by the time left before the
//! deadline, so an anchor never outlives its configured timeout.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header};
use alloy_sol_types::{sol, SolCall};
use chrono::DateTime;
use k256::ecdsa::{SigningKey, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use zeroize::Zeroizing;

use super::hash::ContentFingerprint;
use super::ledger::LedgerAnchor;
use super::types::{metadata_excerpt, AnchorRecord, VerificationRecord, VerificationStatus};
use super::TrustError;
use crate::config::{LedgerMode, DEFAULT_LEDGER_GAS_LIMIT};

/// Upper bound for a single read-only round-trip.
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const NO_PARAMS: [(); 0] = [];

sol! {
    interface EvidenceVault {
        function storeEvidence(bytes32 evidenceHash, string documentType, string metadata) external;

        function verifyEvidence(bytes32 evidenceHash)
            external
            view
            returns (
                bool exists,
                string documentType,
                address submitter,
                uint256 timestamp,
                string metadata
            );
    }
}

pub struct JsonRpcLedger {
    rpc_url: String,
    client: reqwest::blocking::Client,
    contract: Address,
    signing_key: SigningKey,
    submitter: Address,
    gas_limit: u64,
    timeout: Duration,
    poll_interval: Duration,
    chain_id: OnceLock<u64>,
    /// Held from nonce lookup to broadcast; concurrent anchors never reuse
    /// a nonce.
    nonce_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// `private_key_hex` is a 32-byte secp256k1 secret key, optionally
    /// `0x`-prefixed. `contract` is the deployed vault address.
    pub fn new(
        rpc_url: &str,
        contract: &str,
        private_key_hex: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, TrustError> {
        let contract = Address::from_str(contract.trim())
            .map_err(|e| TrustError::InvalidAddress(format!("{contract:?}: {e}")))?;
        let signing_key = parse_signing_key(private_key_hex)?;
        let submitter = address_of(signing_key.verifying_key());

        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TrustError::Transport(e.to_string()))?;

        Ok(Self {
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            client,
            contract,
            signing_key,
            submitter,
            gas_limit: DEFAULT_LEDGER_GAS_LIMIT,
            timeout,
            poll_interval,
            chain_id: OnceLock::new(),
            nonce_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// EIP-55 checksummed address of the submitting account.
    pub fn submitter(&self) -> String {
        self.submitter.to_checksum(None)
    }

    fn chain_id(&self, deadline: Instant) -> Result<u64, TrustError> {
        if let Some(id) = self.chain_id.get() {
            return Ok(*id);
        }
        let id =
            quantity(&self.call_required::<_, String>("eth_chainId", NO_PARAMS, deadline)?)?;
        let _ = self.chain_id.set(id as u64);
        Ok(id as u64)
    }

    /// Build, sign and broadcast the `storeEvidence` transaction. Returns the
    /// transaction hash.
    fn submit(
        &self,
        fingerprint: &ContentFingerprint,
        document_type: &str,
        metadata: &str,
        deadline: Instant,
    ) -> Result<String, TrustError> {
        let call = EvidenceVault::storeEvidenceCall {
            evidenceHash: evidence_hash(fingerprint)?,
            documentType: document_type.to_string(),
            metadata: metadata_excerpt(metadata),
        };
        let _nonce_guard = self
            .nonce_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let chain_id = self.chain_id(deadline)?;

        let submitter = self.submitter.to_checksum(None);
        let nonce = quantity(&self.call_required::<_, String>(
            "eth_getTransactionCount",
            (submitter.as_str(), "pending"),
            deadline,
        )?)?;
        let gas_price =
            quantity(&self.call_required::<_, String>("eth_gasPrice", NO_PARAMS, deadline)?)?;

        let transaction = LegacyTransaction {
            nonce: nonce as u64,
            gas_price,
            gas_limit: self.gas_limit,
            to: self.contract,
            value: U256::ZERO,
            input: Bytes::from(call.abi_encode()),
            chain_id,
        };
        let raw = transaction.sign(&self.signing_key)?;
        tracing::debug!(nonce = transaction.nonce, chain_id, "Broadcasting storeEvidence");

        let tx_hash: String = self.call_required(
            "eth_sendRawTransaction",
            [format!("0x{}", hex::encode(&raw))],
            deadline,
        )?;
        if tx_hash.trim().is_empty() {
            return Err(TrustError::MalformedResponse("empty transaction hash".into()));
        }
        Ok(tx_hash)
    }

    /// Poll until the transaction is mined or the deadline. Transport errors
    /// while polling are retried; the last one is reported on timeout.
    fn await_receipt(&self, tx_hash: &str, deadline: Instant) -> Result<Option<u64>, TrustError> {
        let mut last_error: Option<String> = None;

        loop {
            if Instant::now() >= deadline {
                return Err(match last_error {
                    Some(e) => TrustError::Transport(format!(
                        "{e} (gave up after {}s)",
                        self.timeout.as_secs()
                    )),
                    None => TrustError::Timeout(self.timeout.as_secs()),
                });
            }

            let receipt = self.call::<_, TransactionReceipt>(
                "eth_getTransactionReceipt",
                [tx_hash],
                deadline,
            );
            match receipt {
                Ok(Some(receipt)) => {
                    let block_number = receipt.block_number.as_deref().map(quantity).transpose()?;
                    match receipt.status.as_deref().map(quantity).transpose()? {
                        Some(0) => return Err(TrustError::Rejected("transaction reverted".into())),
                        _ if block_number.is_some() => return Ok(block_number.map(|n| n as u64)),
                        _ => {}
                    }
                }
                Ok(None) => {}
                Err(TrustError::Transport(e)) => {
                    tracing::debug!(tx = %tx_hash, error = %e, "Receipt poll failed, retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(self.poll_interval.min(remaining));
        }
    }

    /// Like `call`, but a `null` result is malformed.
    fn call_required<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        deadline: Instant,
    ) -> Result<R, TrustError> {
        self.call(method, params, deadline)?
            .ok_or_else(|| TrustError::MalformedResponse(format!("{method} returned null")))
    }

    /// One JSON-RPC round-trip, bounded by the time left before `deadline`.
    fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        deadline: Instant,
    ) -> Result<Option<R>, TrustError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TrustError::Timeout(self.timeout.as_secs()));
        }

        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .timeout(remaining)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TrustError::Timeout(self.timeout.as_secs())
                } else {
                    TrustError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrustError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let parsed: RpcResponse<R> = response
            .json()
            .map_err(|e| TrustError::MalformedResponse(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(TrustError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(parsed.result)
    }

    fn read_vault(
        &self,
        fingerprint: &ContentFingerprint,
    ) -> Result<EvidenceVault::verifyEvidenceReturn, TrustError> {
        let call = EvidenceVault::verifyEvidenceCall {
            evidenceHash: evidence_hash(fingerprint)?,
        };
        let request = json!({
            "to": self.contract.to_checksum(None),
            "data": format!("0x{}", hex::encode(call.abi_encode())),
        });
        let deadline = Instant::now() + self.timeout.min(MAX_REQUEST_TIMEOUT);
        let output: String = self.call_required("eth_call", (request, "latest"), deadline)?;

        let bytes = decode_hex(&output)?;
        EvidenceVault::verifyEvidenceCall::abi_decode_returns(&bytes, true)
            .map_err(|e| TrustError::MalformedResponse(format!("verifyEvidence output: {e}")))
    }
}

impl LedgerAnchor for JsonRpcLedger {
    fn mode(&self) -> LedgerMode {
        LedgerMode::Live
    }

    fn anchor_with_metadata(
        &self,
        fingerprint: &ContentFingerprint,
        document_type: &str,
        metadata: &str,
    ) -> AnchorRecord {
        let _span = tracing::info_span!(
            "ledger_anchor",
            fingerprint = %fingerprint.prefix(16),
            document_type,
        )
        .entered();
        let deadline = Instant::now() + self.timeout;

        let tx_hash = match self.submit(fingerprint, document_type, metadata, deadline) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, "Ledger submission failed");
                return AnchorRecord::failed(
                    fingerprint,
                    LedgerMode::Live,
                    None,
                    document_type,
                    e.to_string(),
                );
            }
        };

        match self.await_receipt(&tx_hash, deadline) {
            Ok(block_number) => {
                tracing::info!(tx = %tx_hash, block = ?block_number, "Anchor confirmed");
                AnchorRecord::confirmed(
                    fingerprint,
                    LedgerMode::Live,
                    tx_hash,
                    block_number,
                    document_type,
                )
            }
            Err(e) => {
                tracing::warn!(tx = %tx_hash, error = %e, "Anchor not confirmed");
                AnchorRecord::failed(
                    fingerprint,
                    LedgerMode::Live,
                    Some(tx_hash),
                    document_type,
                    e.to_string(),
                )
            }
        }
    }

    fn verify(&self, fingerprint: &ContentFingerprint) -> VerificationRecord {
        match self.read_vault(fingerprint) {
            Ok(entry) if entry.exists => VerificationRecord {
                fingerprint: fingerprint.digest.clone(),
                mode: LedgerMode::Live,
                status: VerificationStatus::Found,
                exists: true,
                document_type: Some(entry.documentType),
                submitter: Some(entry.submitter.to_checksum(None)),
                timestamp: u64::try_from(entry.timestamp)
                    .ok()
                    .and_then(|ts| i64::try_from(ts).ok())
                    .and_then(|ts| DateTime::from_timestamp(ts, 0)),
                transaction_id: None,
                reason: None,
            },
            Ok(_) => VerificationRecord::not_found(fingerprint, LedgerMode::Live),
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint.prefix(16),
                    error = %e,
                    "Ledger verification failed"
                );
                VerificationRecord::unavailable(fingerprint, LedgerMode::Live, e.to_string())
            }
        }
    }
}

// ──────────────────────────────────────────────
// Transactions
// ──────────────────────────────────────────────

/// Pre-EIP-1559 transaction with EIP-155 replay protection.
struct LegacyTransaction {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: Address,
    value: U256,
    input: Bytes,
    chain_id: u64,
}

impl LegacyTransaction {
    /// `keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))`
    fn signing_hash(&self) -> B256 {
        keccak256(rlp_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &self.to,
            &self.value,
            &self.input,
            &self.chain_id,
            &0u8,
            &0u8,
        ]))
    }

    /// Raw signed transaction bytes, ready for `eth_sendRawTransaction`.
    fn sign(&self, key: &SigningKey) -> Result<Vec<u8>, TrustError> {
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(self.signing_hash().as_slice())
            .map_err(|e| TrustError::InvalidKey(format!("signing failed: {e}")))?;
        let (r, s) = signature.split_bytes();
        let v = u64::from(recovery_id.to_byte()) + 35 + self.chain_id * 2;

        Ok(rlp_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &self.to,
            &self.value,
            &self.input,
            &v,
            &U256::from_be_slice(&r),
            &U256::from_be_slice(&s),
        ]))
    }
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let mut payload = Vec::new();
    for field in fields {
        field.encode(&mut payload);
    }
    let mut out = Vec::with_capacity(payload.len() + 9);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);
    out
}

// ──────────────────────────────────────────────
// Keys and encoding
// ──────────────────────────────────────────────

fn parse_signing_key(private_key_hex: &str) -> Result<SigningKey, TrustError> {
    let trimmed = private_key_hex.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = Zeroizing::new(
        hex::decode(raw).map_err(|e| TrustError::InvalidKey(format!("not hex: {e}")))?,
    );
    SigningKey::from_slice(&bytes)
        .map_err(|e| TrustError::InvalidKey(format!("not a secp256k1 secret key: {e}")))
}

/// Last 20 bytes of keccak256 over the uncompressed public key (sans tag).
fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

fn evidence_hash(fingerprint: &ContentFingerprint) -> Result<B256, TrustError> {
    let bytes = hex::decode(&fingerprint.digest)
        .map_err(|e| TrustError::InvalidFingerprint(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(TrustError::InvalidFingerprint(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

/// Hex quantity (`0x2a`). An empty `0x` is zero.
fn quantity(value: &str) -> Result<u128, TrustError> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| TrustError::MalformedResponse(format!("bad quantity {value:?}: {e}")))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, TrustError> {
    let trimmed = value.trim();
    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| TrustError::MalformedResponse(format!("bad hex data: {e}")))
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    status: Option<String>,
    block_number: Option<String>,
}
