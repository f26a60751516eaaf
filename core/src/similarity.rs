use crate::error::EngineError;
use crate::{DocId, Document, StoredVector, Vocabulary};
use indexmap::IndexMap;
use serde::Serialize;

/// Cosine of the angle between two count vectors; 0 when either has zero magnitude.
///
/// Callers pass vectors of equal length; extra trailing entries of the longer
/// one are ignored by the dot product but still counted in its magnitude.
pub fn cosine(a: &[u32], b: &[u32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

fn magnitude(v: &[u32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarDocument {
    pub id: DocId,
    pub title: String,
    pub url: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ranking {
    pub query: DocId,
    pub query_title: String,
    pub vocabulary_version: u64,
    /// Descending by score; equal scores keep corpus order.
    pub hits: Vec<SimilarDocument>,
}

impl Ranking {
    pub fn ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|h| h.id).collect()
    }

    /// Title -> score in rank order, for logging.
    pub fn scores_by_title(&self) -> IndexMap<String, f64> {
        self.hits.iter().map(|h| (h.title.clone(), h.score)).collect()
    }
}

/// Check that `doc` carries a vector computed against `vocabulary`.
fn checked_vector<'a>(doc: &'a Document, vocabulary: &Vocabulary) -> Result<&'a StoredVector, EngineError> {
    let vector = doc.vector.as_ref().ok_or(EngineError::MissingVector(doc.id))?;
    if vector.vocabulary_version != vocabulary.version {
        return Err(EngineError::StaleVector {
            id: doc.id,
            expected: vocabulary.version,
            found: vector.vocabulary_version,
        });
    }
    if vector.counts.len() != vocabulary.len() {
        return Err(EngineError::DimensionMismatch {
            id: doc.id,
            expected: vocabulary.len(),
            found: vector.counts.len(),
        });
    }
    Ok(vector)
}

/// Rank every document except `query_id` by cosine similarity to it.
///
/// Only scores strictly above `cutoff` are kept. Any document whose vector does
/// not belong to `vocabulary` fails the whole query.
pub fn rank_similar(
    query_id: DocId,
    documents: &[Document],
    vocabulary: &Vocabulary,
    cutoff: f64,
) -> Result<Ranking, EngineError> {
    let query = documents
        .iter()
        .find(|d| d.id == query_id)
        .ok_or(EngineError::NotFound(query_id))?;
    let query_vector = checked_vector(query, vocabulary)?;

    let mut hits = Vec::with_capacity(documents.len().saturating_sub(1));
    for doc in documents.iter().filter(|d| d.id != query_id) {
        let vector = checked_vector(doc, vocabulary)?;
        let score = cosine(&query_vector.counts, &vector.counts);
        if score > cutoff {
            hits.push(SimilarDocument { id: doc.id, title: doc.title.clone(), url: doc.url.clone(), score });
        }
    }
    // stable: ties keep corpus order
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(Ranking {
        query: query_id,
        query_title: query.title.clone(),
        vocabulary_version: vocabulary.version,
        hits,
    })
}
