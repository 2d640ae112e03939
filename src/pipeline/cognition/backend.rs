use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::ollama::{LlmClient, OllamaError};

use super::CognitionError;

/// Generative reasoning capability used by the contradiction engine.
/// Output is advisory; callers parse and normalize it.
pub trait ReasoningBackend: Send + Sync {
    /// Human-readable backend identifier for logs and reports.
    fn name(&self) -> String;

    /// Produce a raw text completion. Any transport or backend failure is
    /// reported as `BackendUnavailable`.
    fn generate(&self, system: &str, prompt: &str) -> Result<String, CognitionError>;
}

/// Reasoning backed by a local Ollama model.
pub struct OllamaReasoner {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl OllamaReasoner {
    pub fn new(client: Arc<dyn LlmClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl ReasoningBackend for OllamaReasoner {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn generate(&self, system: &str, prompt: &str) -> Result<String, CognitionError> {
        self.client
            .generate(&self.model, prompt, system)
            .map_err(|e| match e {
                OllamaError::Timeout(secs) => {
                    CognitionError::BackendUnavailable(format!("timed out after {secs}s"))
                }
                other => CognitionError::BackendUnavailable(other.to_string()),
            })
    }
}

/// Scripted backend for tests. Records the last prompt it was given.
pub struct MockReasoningBackend {
    response: Result<String, String>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockReasoningBackend {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// A backend that is configured but unreachable.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ReasoningBackend for MockReasoningBackend {
    fn name(&self) -> String {
        "mock-reasoner".to_string()
    }

    fn generate(&self, _system: &str, prompt: &str) -> Result<String, CognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_prompt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(prompt.to_string());
        self.response
            .clone()
            .map_err(CognitionError::BackendUnavailable)
    }
}
