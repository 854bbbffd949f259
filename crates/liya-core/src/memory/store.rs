//! ============================================================================
//! Memory Store - Flat JSON file of learned question/answer pairs
//! ============================================================================
//! The whole collection lives in memory and is rewritten after every
//! mutation. Writes go to a sibling `.tmp` file that is renamed over the
//! target, so a crash leaves either the previous or the new contents.
//! ============================================================================

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::types::{
    Appended, LegacyEntry, MemoryRecord, RecordId, StoreStats, StoredRecord, DEFAULT_RATING,
};
use crate::error::StoreError;
use crate::providers::EmbeddingProvider;

/// Ordered, append-only collection of memories backed by a JSON file
#[derive(Debug)]
pub struct MemoryStore {
    path: PathBuf,
    records: Vec<MemoryRecord>,
}

impl MemoryStore {
    /// Load the store at `path`, migrating legacy entries.
    ///
    /// A missing file yields an empty store. Corruption is returned as
    /// `StoreError::Corrupt`.
    pub async fn open(
        path: impl Into<PathBuf>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let (records, migrated) = load_records(&path, embedder).await?;

        let store = Self { path, records };
        if migrated {
            info!("Migrated memory store at {}", store.path.display());
            store.save()?;
        }

        info!(
            "Loaded {} memories from {}",
            store.records.len(),
            store.path.display()
        );
        Ok(store)
    }

    /// Like `open`, but when `recover` is set a corrupt file is moved aside
    /// and an empty store is started in its place
    pub async fn open_or_recover(
        path: impl Into<PathBuf>,
        embedder: &dyn EmbeddingProvider,
        recover: bool,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        match Self::open(path.clone(), embedder).await {
            Err(e) if recover && e.is_corrupt() => {
                let backup = backup_path(&path);
                std::fs::rename(&path, &backup).map_err(|io| StoreError::io(&path, io))?;
                warn!(
                    "{} - moved corrupt store to {} and starting empty",
                    e,
                    backup.display()
                );
                Ok(Self {
                    path,
                    records: Vec::new(),
                })
            }
            other => other,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize every record and replace the file contents
    pub fn save(&self) -> Result<(), StoreError> {
        let stored: Vec<StoredRecord> = self.records.iter().map(StoredRecord::from).collect();
        let json = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        debug!("Saved {} memories to {}", self.records.len(), self.path.display());
        Ok(())
    }

    /// Embed `question`, store the pair with the default rating and persist.
    ///
    /// A provider failure does not abort the append: the record is kept with
    /// an empty vector and reported as unembedded.
    pub async fn append(
        &mut self,
        question: &str,
        answer: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Appended, StoreError> {
        let vector = match embedder.embed(question).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Storing unembedded memory for {:?}: {}", question, e);
                Vec::new()
            }
        };

        let record = MemoryRecord::new(vector, question.to_string(), answer.to_string());
        let embedded = record.is_embedded();
        let id = RecordId(self.records.len());
        self.records.push(record);
        self.save()?;

        info!("Learned memory {} (embedded: {})", id, embedded);
        Ok(Appended {
            id,
            embedded,
            indexed: false,
        })
    }

    /// Set the rating of every record matching `predicate`, then persist.
    /// Returns how many records changed.
    pub fn update_rating<P>(&mut self, predicate: P, rating: f32) -> Result<usize, StoreError>
    where
        P: Fn(&MemoryRecord) -> bool,
    {
        let rating = clamp_rating(rating);
        let mut updated = 0;
        for record in self.records.iter_mut().filter(|r| predicate(r)) {
            record.rating = rating;
            updated += 1;
        }

        self.save()?;
        debug!("Set rating {} on {} memories", rating, updated);
        Ok(updated)
    }

    /// Set the rating of every record whose question equals `question`
    pub fn update_rating_for_question(
        &mut self,
        question: &str,
        rating: f32,
    ) -> Result<usize, StoreError> {
        self.update_rating(|r| r.question == question, rating)
    }

    pub fn get(&self, id: RecordId) -> Option<&MemoryRecord> {
        self.records.get(id.0)
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &MemoryRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (RecordId(i), r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct questions in insertion order
    pub fn questions(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .map(|r| r.question.as_str())
            .filter(|q| seen.insert(*q))
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let embedded = self.records.iter().filter(|r| r.is_embedded()).count();
        let mean_rating = if self.records.is_empty() {
            None
        } else {
            let sum: f32 = self.records.iter().map(|r| r.rating).sum();
            Some(sum / self.records.len() as f32)
        };

        StoreStats {
            total: self.records.len(),
            embedded,
            unembedded: self.records.len() - embedded,
            dimension: self
                .records
                .iter()
                .find(|r| r.is_embedded())
                .map(|r| r.vector.len()),
            mean_rating,
        }
    }
}

/// Read and migrate the file. The flag reports whether anything was
/// re-embedded and the file should be rewritten.
async fn load_records(
    path: &Path,
    embedder: &dyn EmbeddingProvider,
) -> Result<(Vec<MemoryRecord>, bool), StoreError> {
    if !path.exists() {
        debug!("No memory store at {}, starting empty", path.display());
        return Ok((Vec::new(), false));
    }

    let raw = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
    let entries: Vec<Value> = serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut records = Vec::with_capacity(entries.len());
    let mut migrated = false;

    for (position, entry) in entries.into_iter().enumerate() {
        match entry {
            Value::Object(_) => {
                let legacy: LegacyEntry =
                    serde_json::from_value(entry).map_err(|e| StoreError::Corrupt {
                        path: path.to_path_buf(),
                        reason: format!("legacy entry {}: {}", position, e),
                    })?;

                match embedder.embed(&legacy.input).await {
                    Ok(vector) => {
                        records.push(MemoryRecord {
                            vector,
                            question: legacy.input,
                            answer: legacy.response,
                            rating: loaded_rating(
                                legacy.feedback_rating.unwrap_or(DEFAULT_RATING),
                                position,
                            ),
                        });
                        migrated = true;
                    }
                    Err(e) => warn!("Dropping legacy entry {}: {}", position, e),
                }
            }
            Value::Array(_) => match serde_json::from_value::<StoredRecord>(entry) {
                Ok(stored) => {
                    let mut record = MemoryRecord::from(stored);
                    record.rating = loaded_rating(record.rating, position);
                    if record.is_embedded() {
                        records.push(record);
                        continue;
                    }
                    match embedder.embed(&record.question).await {
                        Ok(vector) => {
                            record.vector = vector;
                            records.push(record);
                            migrated = true;
                        }
                        Err(e) => warn!("Dropping unembedded entry {}: {}", position, e),
                    }
                }
                Err(e) => warn!("Skipping malformed entry {}: {}", position, e),
            },
            other => warn!("Skipping unexpected entry {}: {}", position, other),
        }
    }

    Ok((records, migrated))
}

fn clamp_rating(rating: f32) -> f32 {
    if rating.is_nan() {
        0.0
    } else {
        rating.clamp(0.0, 1.0)
    }
}

/// Ratings read from disk are pulled back into range
fn loaded_rating(rating: f32, position: usize) -> f32 {
    let clamped = clamp_rating(rating);
    if clamped != rating {
        warn!("Entry {} has rating {} out of range, using {}", position, rating, clamped);
    }
    clamped
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(
        ".corrupt-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    ));
    PathBuf::from(name)
}
