//! KGRAG Common Library
//!
//! Shared code for the KGRAG gateway and console including:
//! - Knowledge schema and graph store abstraction
//! - Entity linking
//! - Fact extraction, ranking and prompt assembly
//! - Retrying generation client
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod graph;
pub mod inference;
pub mod knowledge;
pub mod linking;
pub mod metrics;
pub mod orchestrator;
pub mod schema;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use graph::{GraphStore, Neo4jHttpStore};
pub use inference::{GenerationTransport, HttpGenerationTransport};
pub use linking::{DictionaryLinker, EntityLinker};
pub use orchestrator::{Answer, AnswerOutcome, RetrievalOrchestrator, GENERATION_APOLOGY, NO_ENTITY_ANSWER};
pub use schema::KnowledgeSchema;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
