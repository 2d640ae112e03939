//! Trust layer: content fingerprints and ledger anchoring.
//!
//! Fingerprints are SHA-256 over the exact uploaded bytes. Anchoring never
//! raises to the caller; every attempt ends in an `AnchorRecord` whose status
//! is either `Confirmed` or `Failed`.

pub mod hash;
pub mod ledger;
pub mod live;
pub mod types;

pub use hash::*;
pub use ledger::*;
pub use live::JsonRpcLedger;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("Ledger transport error: {0}")]
    Transport(String),

    #[error("Ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Ledger response malformed: {0}")]
    MalformedResponse(String),

    #[error("Ledger confirmation timed out after {0}s")]
    Timeout(u64),

    #[error("Ledger rejected transaction: {0}")]
    Rejected(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
