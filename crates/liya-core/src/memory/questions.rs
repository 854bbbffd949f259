//! Question selection: which stored question to put to the user next.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use super::store::MemoryStore;

/// Questions already posed in this session
#[derive(Debug, Default, Clone)]
pub struct AskedQuestions {
    asked: HashSet<String>,
}

impl AskedQuestions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the question had already been asked
    pub fn mark(&mut self, question: &str) -> bool {
        self.asked.insert(question.to_string())
    }

    pub fn contains(&self, question: &str) -> bool {
        self.asked.contains(question)
    }

    pub fn len(&self) -> usize {
        self.asked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asked.is_empty()
    }
}

/// Uniform random choice among questions not yet asked
#[derive(Debug, Default, Clone, Copy)]
pub struct QuestionPolicy;

impl QuestionPolicy {
    /// Stored questions that have not been asked, in insertion order
    pub fn candidates<'a>(store: &'a MemoryStore, asked: &AskedQuestions) -> Vec<&'a str> {
        store
            .questions()
            .into_iter()
            .filter(|q| !asked.contains(q))
            .collect()
    }

    /// Pick an unasked question and mark it asked. `None` means every stored
    /// question has been used and a new one must be generated.
    pub fn select<R: Rng + ?Sized>(
        store: &MemoryStore,
        asked: &mut AskedQuestions,
        rng: &mut R,
    ) -> Option<String> {
        let candidates = Self::candidates(store, asked);
        let chosen = candidates.choose(rng)?.to_string();
        asked.mark(&chosen);
        Some(chosen)
    }
}
