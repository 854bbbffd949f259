//! ============================================================================
//! LIYA-CORE: the companion's memory
//! ============================================================================
//! This crate handles everything behind the console loop:
//! - Flat JSON memory store with legacy migration and atomic rewrites
//! - Exact nearest-neighbour index over question embeddings
//! - Lookup-or-learn retrieval and rating feedback
//! - Question selection that never repeats within a session
//! - Ollama-backed embedding and generation providers
//! ============================================================================

pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod session;

// Re-export main types for convenience
pub use config::CompanionConfig;
pub use error::{DimensionMismatch, ProviderError, StoreError};
pub use memory::{
    Appended, AskedQuestions, Lookup, MemoryRecord, MemoryStore, Neighbor, NoMatchReason,
    QuestionPolicy, RecordId, RetrievalEngine, StoreStats, VectorIndex,
};
pub use providers::{EmbeddingProvider, OllamaClient, TextGenerator};
pub use session::{Prompt, Session};
