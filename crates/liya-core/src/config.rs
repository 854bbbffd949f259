//! ============================================================================
//! Companion Configuration
//! ============================================================================
//! Defaults suit a local Ollama install. Every field can be overridden from
//! the environment (the binary loads `.env` first):
//!
//!   LIYA_STORE_PATH            memory file (default ~/.liya/memory.json)
//!   LIYA_OLLAMA_URL            provider base URL
//!   LIYA_EMBED_MODEL           embedding model
//!   LIYA_GEN_MODEL             generation model
//!   LIYA_REQUEST_TIMEOUT_SECS  per-request timeout
//!   LIYA_MATCH_THRESHOLD       max squared L2 distance for a match
//!   LIYA_RECOVER_CORRUPT       back up a corrupt store and start empty
//! ============================================================================

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "gemma3:1b";
pub const DEFAULT_QUESTION_PROMPT: &str = "Ask a new question to learn more about the user.";
pub const DEFAULT_STORE_FILE: &str = "memory.json";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration for a companion session
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Explicit store path; `None` resolves via env var or home directory
    pub store_path: Option<PathBuf>,
    pub ollama_url: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub request_timeout: Duration,
    /// `None` keeps the nearest neighbour as a match no matter how far away
    pub match_threshold: Option<f32>,
    pub question_prompt: String,
    pub recover_corrupt_store: bool,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_MODEL.to_string(),
            generation_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            match_threshold: None,
            question_prompt: DEFAULT_QUESTION_PROMPT.to_string(),
            recover_corrupt_store: false,
        }
    }
}

impl CompanionConfig {
    /// Defaults overlaid with whatever the process environment provides
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("LIYA_STORE_PATH").filter(|p| !p.is_empty()) {
            config.store_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("LIYA_OLLAMA_URL").filter(|u| !u.is_empty()) {
            config.ollama_url = url;
        }
        if let Some(model) = lookup("LIYA_EMBED_MODEL").filter(|m| !m.is_empty()) {
            config.embedding_model = model;
        }
        if let Some(model) = lookup("LIYA_GEN_MODEL").filter(|m| !m.is_empty()) {
            config.generation_model = model;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "LIYA_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse_var::<f32>(&lookup, "LIYA_MATCH_THRESHOLD") {
            match validate_match_threshold(threshold) {
                Ok(threshold) => config.match_threshold = Some(threshold),
                Err(e) => warn!("Ignoring LIYA_MATCH_THRESHOLD: {}", e),
            }
        }
        if let Some(recover) = parse_var::<bool>(&lookup, "LIYA_RECOVER_CORRUPT") {
            config.recover_corrupt_store = recover;
        }

        config
    }

    /// Resolve the memory file path, creating `~/.liya` when falling back to it
    pub fn resolve_store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }

        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        let liya_dir = home.join(".liya");
        std::fs::create_dir_all(&liya_dir)
            .map_err(|e| anyhow!("Failed to create {}: {}", liya_dir.display(), e))?;
        Ok(liya_dir.join(DEFAULT_STORE_FILE))
    }
}

/// A match threshold must be a finite, non-negative squared distance
pub fn validate_match_threshold(threshold: f32) -> Result<f32> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(anyhow!(
            "match threshold must be finite and non-negative, got {}",
            threshold
        ))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
