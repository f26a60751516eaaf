use crate::error::EngineError;
use crate::tokenizer::Normalizer;
use crate::Document;
use indexmap::IndexMap;

/// Corpus frequency per normalized term, in order of first occurrence.
#[derive(Debug, Default)]
pub struct TermCounts {
    counts: IndexMap<String, u32>,
}

impl TermCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every surviving term of `text`.
    pub fn add_text(&mut self, text: &str, normalizer: &Normalizer) {
        for token in text.split_whitespace() {
            if let Some(term) = normalizer.term(token) {
                *self.counts.entry(term).or_insert(0) += 1;
            }
        }
    }

    pub fn get(&self, term: &str) -> u32 {
        self.counts.get(term).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Terms whose count is strictly greater than `min_occurrence`, first-occurrence order kept.
    pub fn into_terms(self, min_occurrence: u32) -> Vec<String> {
        self.counts
            .into_iter()
            .filter(|(_, count)| *count > min_occurrence)
            .map(|(term, _)| term)
            .collect()
    }
}

/// Build the ordered term list for `documents`.
///
/// Documents are scanned in the order given and tokens in text order; a term's
/// position is where it was first seen. The same input always yields the same list.
pub fn build_vocabulary(
    documents: &[Document],
    normalizer: &Normalizer,
    min_occurrence: u32,
) -> Result<Vec<String>, EngineError> {
    if min_occurrence < 1 {
        return Err(EngineError::InvalidConfig("min_occurrence must be at least 1".into()));
    }
    let mut counts = TermCounts::new();
    for doc in documents {
        counts.add_text(&doc.raw_text, normalizer);
    }
    tracing::debug!(distinct_terms = counts.len(), "counted corpus terms");
    Ok(counts.into_terms(min_occurrence))
}
