use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Application-level constants
pub const APP_NAME: &str = "Nyaya-Drishti";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Statute passages retrieved per analysis.
pub const DEFAULT_TOP_K: usize = 3;

/// Ledger confirmation bound.
pub const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LEDGER_POLL_SECS: u64 = 2;
/// Gas limit for one `storeEvidence` transaction.
pub const DEFAULT_LEDGER_GAS_LIMIT: u64 = 500_000;
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_REASONING_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_RENDER_DPI: u32 = 300;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "nyaya_drishti=info,warn"
}

/// Get the application data directory
/// ~/NyayaDrishti/ on all platforms. Falls back to the working directory
/// when no home directory can be determined (containers, CI).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("NyayaDrishti")
}

/// Default location of the persisted statute index.
pub fn default_index_path() -> PathBuf {
    app_data_dir().join("index").join("statutes.index.json")
}

/// Default location of the statute corpus used for ingestion.
pub fn default_corpus_path() -> PathBuf {
    app_data_dir().join("data").join("ipc_chunks_final.json")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// How evidence fingerprints are anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    /// Deterministic local transaction ids, no network.
    Mock,
    /// Signed contract transaction over Ethereum JSON-RPC, polled for a receipt.
    Live,
}

impl LedgerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Live => "live",
        }
    }
}

/// Which embedding model backs the statute index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    Hashing,
    Ollama,
    Onnx,
}

#[derive(Clone)]
pub struct LedgerConfig {
    pub mode: LedgerMode,
    pub rpc_url: Option<String>,
    /// Deployed evidence vault contract, `0x`-prefixed.
    pub contract_address: Option<String>,
    /// Hex-encoded secp256k1 secret key of the submitting account.
    pub private_key: Option<Zeroizing<String>>,
    pub gas_limit: u64,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("mode", &self.mode)
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("gas_limit", &self.gas_limit)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub ollama_url: String,
    /// `None` leaves the reasoning backend unconfigured (basic analysis only).
    pub reasoning_model: Option<String>,
    /// `None` disables OCR (every extraction is degraded).
    pub vision_model: Option<String>,
    pub ocr_timeout: Duration,
    pub reasoning_timeout: Duration,
    pub embedder: EmbedderKind,
    pub embed_model: String,
    pub onnx_model_dir: PathBuf,
    pub index_path: PathBuf,
    pub corpus_path: PathBuf,
    pub render_dpi: u32,
    pub top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig {
                mode: LedgerMode::Mock,
                rpc_url: None,
                contract_address: None,
                private_key: None,
                gas_limit: DEFAULT_LEDGER_GAS_LIMIT,
                timeout: Duration::from_secs(DEFAULT_LEDGER_TIMEOUT_SECS),
                poll_interval: Duration::from_secs(DEFAULT_LEDGER_POLL_SECS),
            },
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            reasoning_model: None,
            vision_model: None,
            ocr_timeout: Duration::from_secs(DEFAULT_OCR_TIMEOUT_SECS),
            reasoning_timeout: Duration::from_secs(DEFAULT_REASONING_TIMEOUT_SECS),
            embedder: EmbedderKind::Hashing,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            onnx_model_dir: app_data_dir().join("models").join("all-MiniLM-L6-v2"),
            index_path: default_index_path(),
            corpus_path: default_corpus_path(),
            render_dpi: DEFAULT_RENDER_DPI,
            top_k: DEFAULT_TOP_K,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl AppConfig {
    /// Read `NYAYA_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(mode) = get("NYAYA_LEDGER_MODE") {
            config.ledger.mode = match mode.to_lowercase().as_str() {
                "mock" => LedgerMode::Mock,
                "live" => LedgerMode::Live,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "NYAYA_LEDGER_MODE",
                        value: mode,
                        reason: "expected `mock` or `live`".into(),
                    })
                }
            };
        }
        config.ledger.rpc_url = get("NYAYA_LEDGER_RPC_URL");
        config.ledger.contract_address = get("NYAYA_LEDGER_CONTRACT");
        config.ledger.private_key = get("NYAYA_LEDGER_PRIVATE_KEY").map(Zeroizing::new);
        if let Some(gas) = parse_u64(&get, "NYAYA_LEDGER_GAS_LIMIT")? {
            config.ledger.gas_limit = gas;
        }
        if let Some(secs) = parse_u64(&get, "NYAYA_LEDGER_TIMEOUT_SECS")? {
            config.ledger.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&get, "NYAYA_LEDGER_POLL_SECS")? {
            config.ledger.poll_interval = Duration::from_secs(secs.max(1));
        }

        if let Some(url) = get("NYAYA_OLLAMA_URL") {
            config.ollama_url = url;
        }
        config.reasoning_model = get("NYAYA_REASONING_MODEL");
        config.vision_model = get("NYAYA_VISION_MODEL");
        if let Some(secs) = parse_u64(&get, "NYAYA_OCR_TIMEOUT_SECS")? {
            config.ocr_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&get, "NYAYA_REASONING_TIMEOUT_SECS")? {
            config.reasoning_timeout = Duration::from_secs(secs);
        }

        if let Some(kind) = get("NYAYA_EMBEDDER") {
            config.embedder = match kind.to_lowercase().as_str() {
                "hashing" => EmbedderKind::Hashing,
                "ollama" => EmbedderKind::Ollama,
                "onnx" => EmbedderKind::Onnx,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "NYAYA_EMBEDDER",
                        value: kind,
                        reason: "expected `hashing`, `ollama` or `onnx`".into(),
                    })
                }
            };
        }
        if let Some(model) = get("NYAYA_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(dir) = get("NYAYA_ONNX_MODEL_DIR") {
            config.onnx_model_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("NYAYA_INDEX_PATH") {
            config.index_path = PathBuf::from(path);
        }
        if let Some(path) = get("NYAYA_CORPUS_PATH") {
            config.corpus_path = PathBuf::from(path);
        }
        if let Some(dpi) = parse_u64(&get, "NYAYA_RENDER_DPI")? {
            config.render_dpi = dpi.clamp(72, 600) as u32;
        }
        if let Some(k) = parse_u64(&get, "NYAYA_TOP_K")? {
            config.top_k = k.max(1) as usize;
        }

        Ok(config)
    }
}

fn parse_u64<G>(get: &G, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw,
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_folder() {
        assert!(app_data_dir().ends_with("NyayaDrishti"));
    }

    #[test]
    fn index_path_under_app_data() {
        assert!(default_index_path().starts_with(app_data_dir()));
    }

    #[test]
    fn empty_environment_gives_mock_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.ledger.mode, LedgerMode::Mock);
        assert_eq!(config.ledger.timeout, Duration::from_secs(120));
        assert!(config.reasoning_model.is_none());
        assert!(config.vision_model.is_none());
        assert_eq!(config.render_dpi, 300);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.embedder, EmbedderKind::Hashing);
    }

    #[test]
    fn live_mode_with_credentials() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NYAYA_LEDGER_MODE", "LIVE"),
            ("NYAYA_LEDGER_RPC_URL", "http://127.0.0.1:8545"),
            ("NYAYA_LEDGER_CONTRACT", "0x5fbdb2315678afecb367f032d93f642f64180aa3"),
            ("NYAYA_LEDGER_PRIVATE_KEY", "ab".repeat(32).as_str()),
            ("NYAYA_LEDGER_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.ledger.mode, LedgerMode::Live);
        assert_eq!(config.ledger.rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        assert_eq!(
            config.ledger.contract_address.as_deref(),
            Some("0x5fbdb2315678afecb367f032d93f642f64180aa3")
        );
        assert!(config.ledger.private_key.is_some());
        assert_eq!(config.ledger.gas_limit, DEFAULT_LEDGER_GAS_LIMIT);
        assert_eq!(config.ledger.timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_ledger_mode_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("NYAYA_LEDGER_MODE", "maybe")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "NYAYA_LEDGER_MODE", .. }
        ));
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let err =
            AppConfig::from_lookup(lookup(&[("NYAYA_OCR_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("NYAYA_OCR_TIMEOUT_SECS"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = AppConfig::from_lookup(lookup(&[("NYAYA_REASONING_MODEL", "  ")])).unwrap();
        assert!(config.reasoning_model.is_none());
    }

    #[test]
    fn debug_output_redacts_private_key() {
        let secret = "cd".repeat(32);
        let config =
            AppConfig::from_lookup(lookup(&[("NYAYA_LEDGER_PRIVATE_KEY", secret.as_str())]))
                .unwrap();
        let debug = format!("{:?}", config.ledger);
        assert!(!debug.contains(&secret));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn render_dpi_is_clamped() {
        let config = AppConfig::from_lookup(lookup(&[("NYAYA_RENDER_DPI", "5000")])).unwrap();
        assert_eq!(config.render_dpi, 600);
    }

    #[test]
    fn app_name_is_set() {
        assert_eq!(APP_NAME, "Nyaya-Drishti");
    }
}
