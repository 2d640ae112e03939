pub mod types;
pub mod trust; // Fingerprints + ledger anchoring
pub mod extraction; // OCR with graceful degradation
pub mod retrieval; // Statute index + similarity search
pub mod cognition; // Contradiction engine
pub mod report;
pub mod orchestrator;
pub mod evaluation; // Golden-case scoring

pub use orchestrator::{PipelineError, PipelineOrchestrator, PipelineSettings};
pub use report::EvidenceReport;
