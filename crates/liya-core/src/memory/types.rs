//! ============================================================================
//! Memory Types - Records, identifiers and the on-disk entry formats
//! ============================================================================
//! The durable file is a JSON array. Current entries are 4-element arrays
//! `[vector, question, answer, rating]`; older files may still contain
//! objects of the form `{input, response, feedbackRating?}`.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Rating given to freshly taught or re-confirmed memories
pub const DEFAULT_RATING: f32 = 1.0;

/// Stable handle to a record in the store.
///
/// The store never removes records, so the position a record was appended at
/// identifies it for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub usize);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single learned question/answer pair
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    /// Embedding of the question (empty when the provider failed)
    pub vector: Vec<f32>,
    pub question: String,
    pub answer: String,
    /// Feedback score in [0.0, 1.0]
    pub rating: f32,
}

impl MemoryRecord {
    /// Create a record with the default rating
    pub fn new(vector: Vec<f32>, question: String, answer: String) -> Self {
        Self {
            vector,
            question,
            answer,
            rating: DEFAULT_RATING,
        }
    }

    /// Whether this record carries an embedding and can be indexed
    pub fn is_embedded(&self) -> bool {
        !self.vector.is_empty()
    }
}

/// Current on-disk form: `[vector, question, answer, rating]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredRecord(pub Vec<f32>, pub String, pub String, pub f32);

impl From<StoredRecord> for MemoryRecord {
    fn from(StoredRecord(vector, question, answer, rating): StoredRecord) -> Self {
        Self {
            vector,
            question,
            answer,
            rating,
        }
    }
}

impl From<&MemoryRecord> for StoredRecord {
    fn from(record: &MemoryRecord) -> Self {
        StoredRecord(
            record.vector.clone(),
            record.question.clone(),
            record.answer.clone(),
            record.rating,
        )
    }
}

/// Legacy on-disk form, migrated by re-embedding `input`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LegacyEntry {
    pub input: String,
    pub response: String,
    #[serde(rename = "feedbackRating", default)]
    pub feedback_rating: Option<f32>,
}

/// Summary of the store contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub embedded: usize,
    pub unembedded: usize,
    /// Dimensionality of the first embedded record
    pub dimension: Option<usize>,
    pub mean_rating: Option<f32>,
}

/// Outcome of teaching a new memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub id: RecordId,
    /// False when the embedding provider failed; the record is stored but
    /// invisible to search until the next load re-embeds it
    pub embedded: bool,
    /// True once the vector is in the search index. The store alone never
    /// indexes; `RetrievalEngine::teach` sets this.
    pub indexed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = MemoryRecord::new(vec![0.5, 0.25], "q".into(), "a".into());
        assert_eq!(record.rating, DEFAULT_RATING);
        assert!(record.is_embedded());

        let bare = MemoryRecord::new(vec![], "q".into(), "a".into());
        assert!(!bare.is_embedded());
    }

    #[test]
    fn test_stored_record_is_four_element_array() {
        let record = MemoryRecord::new(vec![1.0, 2.5], "name?".into(), "Ada".into());
        let json = serde_json::to_value(StoredRecord::from(&record)).unwrap();
        assert_eq!(json, serde_json::json!([[1.0, 2.5], "name?", "Ada", 1.0]));
    }

    #[test]
    fn test_legacy_entry_parsing() {
        let entry: LegacyEntry = serde_json::from_str(
            r#"{"input": "hi", "response": "hello", "feedbackRating": 0.0}"#,
        )
        .unwrap();
        assert_eq!(entry.input, "hi");
        assert_eq!(entry.feedback_rating, Some(0.0));

        let entry: LegacyEntry =
            serde_json::from_str(r#"{"input": "hi", "response": "hello"}"#).unwrap();
        assert_eq!(entry.feedback_rating, None);
    }
}
