//! ============================================================================
//! Memory Module - Learned question/answer pairs and their retrieval
//! ============================================================================
//! ## Architecture
//! ```text
//! text → Embed → VectorIndex::nearest → RecordId → MemoryStore → answer
//!
//! unknown → teach(question, answer) → Embed → MemoryStore::append
//!                                               ↓
//!                                       VectorIndex::add
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use liya_core::memory::{Lookup, MemoryStore, RetrievalEngine};
//!
//! let store = MemoryStore::open("memory.json", embedder.as_ref()).await?;
//! let mut engine = RetrievalEngine::new(store, embedder);
//!
//! match engine.lookup("what's my cat called").await {
//!     Lookup::Match { id, answer, .. } => {
//!         println!("{}", answer);
//!         engine.apply_feedback(id, true)?;
//!     }
//!     Lookup::NoMatch(_) => {
//!         engine.teach("what's my cat called", "Biscuit").await?;
//!     }
//! }
//! ```
//! ============================================================================

mod engine;
mod index;
mod questions;
mod store;
mod types;

pub use engine::{Lookup, NoMatchReason, RetrievalEngine};
pub use index::{Neighbor, VectorIndex};
pub use questions::{AskedQuestions, QuestionPolicy};
pub use store::MemoryStore;
pub use types::{Appended, MemoryRecord, RecordId, StoreStats, DEFAULT_RATING};
