//! ============================================================================
//! Session - One conversation with the companion
//! ============================================================================
//! Bundles the retrieval engine with the per-session state (questions already
//! asked, RNG) and the text generator. Console I/O stays with the caller:
//! each method is one step of a turn.
//! ============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::CompanionConfig;
use crate::error::{ProviderError, StoreError};
use crate::memory::{
    Appended, AskedQuestions, Lookup, MemoryStore, QuestionPolicy, RecordId, RetrievalEngine,
};
use crate::providers::{EmbeddingProvider, TextGenerator};

/// The question to put to the user this turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// A stored question asked again; answering only re-confirms it
    Recall(String),
    /// A freshly generated question; the answer becomes a new memory
    Generated(String),
}

impl Prompt {
    pub fn question(&self) -> &str {
        match self {
            Prompt::Recall(q) | Prompt::Generated(q) => q,
        }
    }
}

pub struct Session<R = StdRng> {
    engine: RetrievalEngine,
    asked: AskedQuestions,
    generator: Arc<dyn TextGenerator>,
    question_prompt: String,
    rng: R,
}

impl Session<StdRng> {
    /// Load the configured store and start a session over it
    pub async fn start(
        config: &CompanionConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        let path = config.resolve_store_path()?;
        let store =
            MemoryStore::open_or_recover(&path, embedder.as_ref(), config.recover_corrupt_store)
                .await
                .with_context(|| format!("Failed to open memory store {}", path.display()))?;

        let engine =
            RetrievalEngine::new(store, embedder).with_match_threshold(config.match_threshold);

        info!("Session started with {} memories", engine.store().len());
        Ok(Self::new(engine, generator, &config.question_prompt))
    }

    pub fn new(
        engine: RetrievalEngine,
        generator: Arc<dyn TextGenerator>,
        question_prompt: &str,
    ) -> Self {
        Self::with_rng(engine, generator, question_prompt, StdRng::from_entropy())
    }
}

impl<R: Rng> Session<R> {
    pub fn with_rng(
        engine: RetrievalEngine,
        generator: Arc<dyn TextGenerator>,
        question_prompt: &str,
        rng: R,
    ) -> Self {
        Self {
            engine,
            asked: AskedQuestions::new(),
            generator,
            question_prompt: question_prompt.to_string(),
            rng,
        }
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    pub fn asked(&self) -> &AskedQuestions {
        &self.asked
    }

    pub async fn lookup(&self, query: &str) -> Lookup {
        self.engine.lookup(query).await
    }

    pub fn feedback(&mut self, id: RecordId, good: bool) -> Result<usize, StoreError> {
        self.engine.apply_feedback(id, good)
    }

    pub async fn teach(&mut self, question: &str, answer: &str) -> Result<Appended, StoreError> {
        self.engine.teach(question, answer).await
    }

    /// Choose this turn's question: an unasked stored one if any remain,
    /// otherwise a new one from the generator
    pub async fn next_question(&mut self) -> Result<Prompt, ProviderError> {
        if let Some(question) =
            QuestionPolicy::select(self.engine.store(), &mut self.asked, &mut self.rng)
        {
            debug!("Re-asking stored question {:?}", question);
            return Ok(Prompt::Recall(question));
        }

        let question = self.generator.generate(&self.question_prompt).await?;
        let question = question.trim();
        if question.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        debug!("Generated question {:?}", question);
        Ok(Prompt::Generated(question.to_string()))
    }

    /// The user answered a recalled question: no new memory, just bookkeeping
    pub fn answer_recall(&mut self, question: &str) -> Result<usize, StoreError> {
        self.asked.mark(question);
        self.engine.confirm(question)
    }

    /// The user answered a generated question: learn it as a new memory
    pub async fn answer_generated(
        &mut self,
        question: &str,
        answer: &str,
    ) -> Result<Appended, StoreError> {
        let appended = self.engine.teach(question, answer).await?;
        self.asked.mark(question);
        Ok(appended)
    }

    /// Answer whichever kind of prompt was posed
    pub async fn answer(&mut self, prompt: &Prompt, answer: &str) -> Result<(), StoreError> {
        match prompt {
            Prompt::Recall(q) => {
                self.answer_recall(q)?;
            }
            Prompt::Generated(q) => {
                self.answer_generated(q, answer).await?;
            }
        }
        Ok(())
    }
}
