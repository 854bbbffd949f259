//! ============================================================================
//! Retrieval Engine - Lookup-or-learn over the store and its index
//! ============================================================================
//! ```text
//! query ─► embed ─► nearest neighbour ─► Match(answer) ─► feedback ─► rating
//!              │              │
//!              └─ failed ─────┴─ empty / too far ─► NoMatch ─► teach ─► append + index add
//! ```
//! The engine owns both the store and the index so every mutation keeps
//! them in step.
//! ============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::index::{Neighbor, VectorIndex};
use super::store::MemoryStore;
use super::types::{Appended, MemoryRecord, RecordId, DEFAULT_RATING};
use crate::error::{DimensionMismatch, ProviderError, StoreError};
use crate::providers::EmbeddingProvider;

/// Why a query produced no match
#[derive(Debug, Clone, PartialEq)]
pub enum NoMatchReason {
    /// Nothing has been indexed yet
    EmptyIndex,
    /// The query could not be embedded
    Unembedded(ProviderError),
    /// The nearest memory is farther than the configured threshold
    BeyondThreshold { distance: f32 },
    /// The query embedding has a different length than the indexed vectors
    DimensionMismatch(DimensionMismatch),
}

/// Result of looking up a query
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Match {
        id: RecordId,
        answer: String,
        distance: f32,
    },
    NoMatch(NoMatchReason),
}

impl Lookup {
    pub fn is_match(&self) -> bool {
        matches!(self, Lookup::Match { .. })
    }
}

/// Memory store plus the index derived from it
pub struct RetrievalEngine {
    store: MemoryStore,
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    match_threshold: Option<f32>,
}

impl RetrievalEngine {
    /// Wrap a loaded store and build its index
    pub fn new(store: MemoryStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let index = build_index(&store);
        info!(
            "Retrieval engine ready: {} memories, {} indexed",
            store.len(),
            index.len()
        );

        Self {
            store,
            index,
            embedder,
            match_threshold: None,
        }
    }

    /// Decline matches whose squared distance exceeds `threshold`.
    /// Without a threshold the nearest memory always matches.
    pub fn with_match_threshold(mut self, threshold: Option<f32>) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn match_threshold(&self) -> Option<f32> {
        self.match_threshold
    }

    /// Find the memory closest to `query`
    pub async fn lookup(&self, query: &str) -> Lookup {
        if self.index.is_empty() {
            debug!("Lookup on empty index");
            return Lookup::NoMatch(NoMatchReason::EmptyIndex);
        }

        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Cannot embed query, treating as unknown: {}", e);
                return Lookup::NoMatch(NoMatchReason::Unembedded(e));
            }
        };

        if let Some(expected) = self.index.dimension() {
            if vector.len() != expected {
                let mismatch = DimensionMismatch {
                    expected,
                    found: vector.len(),
                };
                warn!("Cannot search with query embedding: {}", mismatch);
                return Lookup::NoMatch(NoMatchReason::DimensionMismatch(mismatch));
            }
        }

        let Some(Neighbor { id, distance }) = self.index.nearest(&vector) else {
            return Lookup::NoMatch(NoMatchReason::EmptyIndex);
        };

        if let Some(threshold) = self.match_threshold {
            if distance > threshold {
                debug!("Nearest memory {} at {} exceeds threshold {}", id, distance, threshold);
                return Lookup::NoMatch(NoMatchReason::BeyondThreshold { distance });
            }
        }

        match self.store.get(id) {
            Some(record) => {
                debug!("Matched memory {} at distance {}", id, distance);
                Lookup::Match {
                    id,
                    answer: record.answer.clone(),
                    distance,
                }
            }
            None => {
                // Only reachable if the index outlived a store swap
                warn!("Index returned unknown memory {}", id);
                Lookup::NoMatch(NoMatchReason::EmptyIndex)
            }
        }
    }

    /// Up to `k` nearest memories for inspection
    pub async fn recall(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Neighbor, &MemoryRecord)>, ProviderError> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        Ok(self
            .index
            .search(&vector, k)
            .into_iter()
            .filter_map(|hit| self.store.get(hit.id).map(|record| (hit, record)))
            .collect())
    }

    /// Record whether the answer given for `id` was good. Every memory with
    /// the same question gets the new rating.
    pub fn apply_feedback(&mut self, id: RecordId, good: bool) -> Result<usize, StoreError> {
        let Some(question) = self.store.get(id).map(|r| r.question.clone()) else {
            warn!("Feedback for unknown memory {}", id);
            return Ok(0);
        };

        let rating = if good { 1.0 } else { 0.0 };
        self.store.update_rating_for_question(&question, rating)
    }

    /// Re-confirm a question the user answered again
    pub fn confirm(&mut self, question: &str) -> Result<usize, StoreError> {
        self.store.update_rating_for_question(question, DEFAULT_RATING)
    }

    /// Learn a new memory and make it searchable immediately
    pub async fn teach(&mut self, question: &str, answer: &str) -> Result<Appended, StoreError> {
        let mut appended = self
            .store
            .append(question, answer, self.embedder.as_ref())
            .await?;

        if appended.embedded {
            if let Some(record) = self.store.get(appended.id) {
                match self.index.add(appended.id, &record.vector) {
                    Ok(()) => appended.indexed = true,
                    Err(e) => warn!("New memory {} not searchable: {}", appended.id, e),
                }
            }
        }

        Ok(appended)
    }

    /// Discard the index and rebuild it from the store
    pub fn rebuild_index(&mut self) {
        self.index = build_index(&self.store);
    }
}

fn build_index(store: &MemoryStore) -> VectorIndex {
    VectorIndex::build(store.iter().map(|(id, r)| (id, r.vector.as_slice())))
}
