//! Deterministic in-memory providers for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{EmbeddingProvider, TextGenerator};
use crate::error::ProviderError;

/// Embeds from a lookup table; unknown texts get a stable derived vector
#[derive(Default)]
pub struct FakeEmbedder {
    table: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn unavailable() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Three-component vector derived from the bytes of `text`
pub fn derived_vector(text: &str) -> Vec<f32> {
    let bytes = text.as_bytes();
    let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
    vec![
        bytes.len() as f32,
        (sum % 97) as f32,
        bytes.first().copied().unwrap_or(0) as f32,
    ]
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || self.failing.contains(text) {
            return Err(ProviderError::Unavailable("connection refused".into()));
        }
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| derived_vector(text)))
    }
}

/// Replays scripted completions in order
#[derive(Default)]
pub struct FakeGenerator {
    outputs: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: Mutex::new(questions.into_iter().map(|q| Ok(q.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_failure(&self, error: ProviderError) {
        self.outputs.lock().unwrap().push_back(Err(error));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("no scripted output".into())))
    }
}
