use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::similarity::{rank_similar, Ranking};
use crate::store::CorpusStore;
use crate::tokenizer::Normalizer;
use crate::vocabulary::build_vocabulary;
use crate::{DocId, Document, NewDocument, StoredVector, Vocabulary};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: Vec<DocId>,
    pub duplicates: usize,
    pub skipped_empty: usize,
    /// Headlines whose publication date could not be parsed.
    pub skipped_bad_date: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub version: u64,
    pub terms: usize,
    pub documents: usize,
}

/// Headline similarity engine over a [`CorpusStore`].
pub struct NewsEngine<S> {
    store: S,
    normalizer: Normalizer,
    config: EngineConfig,
}

impl<S: CorpusStore> NewsEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let normalizer = Normalizer::new(&config);
        Ok(Self { store, normalizer, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store new headlines, skipping ones without text, ones with an unparseable
    /// publication date and ones whose URL is already known.
    ///
    /// Title and text are trimmed of whitespace and stray quotes first, and dates
    /// are stored as RFC 3339. New documents have no vector until the next rebuild.
    pub fn ingest<I>(&self, docs: I) -> Result<IngestReport, EngineError>
    where
        I: IntoIterator<Item = NewDocument>,
    {
        let mut report = IngestReport::default();
        for doc in docs {
            let doc = doc.trimmed();
            if doc.raw_text.is_empty() {
                report.skipped_empty += 1;
                continue;
            }
            let doc = match doc.with_parsed_date() {
                Ok(doc) => doc,
                Err(raw) => {
                    tracing::warn!(published_at = %raw, "unparseable publication date, skipping");
                    report.skipped_bad_date += 1;
                    continue;
                }
            };
            match self.store.insert_document(doc)? {
                Some(id) => report.inserted.push(id),
                None => report.duplicates += 1,
            }
        }
        tracing::info!(
            inserted = report.inserted.len(),
            duplicates = report.duplicates,
            skipped_empty = report.skipped_empty,
            skipped_bad_date = report.skipped_bad_date,
            "ingested headlines"
        );
        Ok(report)
    }

    /// Rebuild the vocabulary from the whole corpus and re-vectorize every document.
    ///
    /// Nothing is written until every vector has been computed; the store then
    /// receives the vocabulary and all vectors in one commit.
    pub fn rebuild_vocabulary_and_vectors(&self) -> Result<RebuildReport, EngineError> {
        tracing::info!("creating news vocabulary");
        let docs = self.store.all_documents()?;
        let terms = build_vocabulary(&docs, &self.normalizer, self.config.min_occurrence)?;

        let previous = self.store.vocabulary()?;
        match &previous {
            Some(v) => tracing::info!(previous_version = v.version, "vocabulary exists, updating"),
            None => tracing::info!("vocabulary does not exist, creating"),
        }
        let version = previous.map_or(1, |v| v.version + 1);
        let vocabulary = Vocabulary::new(version, terms);

        tracing::info!(documents = docs.len(), "creating vector for each headline");
        let vectors: Vec<(DocId, StoredVector)> = docs
            .iter()
            .map(|doc| (doc.id, vocabulary.encode(&doc.raw_text, &self.normalizer)))
            .collect();
        self.store.commit_rebuild(&vocabulary, &vectors)?;

        let report = RebuildReport { version, terms: vocabulary.len(), documents: vectors.len() };
        tracing::info!(version, terms = report.terms, documents = report.documents, "rebuild complete");
        Ok(report)
    }

    /// Headlines similar to `id`, best first.
    pub fn find_similar(&self, id: DocId) -> Result<Ranking, EngineError> {
        let vocabulary = self.store.vocabulary()?.ok_or(EngineError::VocabularyMissing)?;
        let docs = self.store.all_documents()?;
        let ranking = rank_similar(id, &docs, &vocabulary, self.config.similarity_cutoff)?;
        tracing::info!(query = %ranking.query_title, "selected headline");
        tracing::info!(similarity = ?ranking.scores_by_title(), "similarity values");
        Ok(ranking)
    }

    pub fn document(&self, id: DocId) -> Result<Document, EngineError> {
        self.store.document(id)?.ok_or(EngineError::NotFound(id))
    }

    pub fn vocabulary(&self) -> Result<Vocabulary, EngineError> {
        self.store.vocabulary()?.ok_or(EngineError::VocabularyMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn headline(text: &str, url: &str) -> NewDocument {
        NewDocument {
            title: text.to_string(),
            raw_text: text.to_string(),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn engine() -> NewsEngine<MemoryStore> {
        NewsEngine::new(MemoryStore::new(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn ingest_skips_empty_and_duplicates() {
        let engine = engine();
        let report = engine
            .ingest(vec![
                headline("Flood hits valley", "https://a/1"),
                headline("   ", "https://a/2"),
                headline("Flood hits valley again", "https://a/1"),
            ])
            .unwrap();
        assert_eq!(report.inserted, vec![0]);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.skipped_empty, 1);
    }

    #[test]
    fn ingest_skips_unparseable_dates() {
        let engine = engine();
        let dated = |date: &str, url: &str| NewDocument {
            published_at: Some(date.to_string()),
            ..headline("Flood hits valley", url)
        };
        let report = engine
            .ingest(vec![dated("not a date", "https://a/1"), dated("Wed, 10 Apr 2024 17:52:00 +0545", "https://a/2")])
            .unwrap();
        assert_eq!(report.inserted, vec![0]);
        assert_eq!(report.skipped_bad_date, 1);
        let stored = engine.document(0).unwrap();
        assert_eq!(stored.url.as_deref(), Some("https://a/2"));
        assert_eq!(stored.published_at.as_deref(), Some("2024-04-10T17:52:00+05:45"));
    }

    #[test]
    fn find_similar_before_rebuild_is_rejected() {
        let engine = engine();
        engine.ingest(vec![headline("Flood hits valley", "https://a/1")]).unwrap();
        assert!(matches!(engine.find_similar(0), Err(EngineError::VocabularyMissing)));
    }

    #[test]
    fn rebuild_bumps_version_and_revectorizes_everything() {
        let engine = engine();
        engine
            .ingest(vec![headline("Flood hits valley", "https://a/1"), headline("Flood warning", "https://a/2")])
            .unwrap();
        let first = engine.rebuild_vocabulary_and_vectors().unwrap();
        assert_eq!(first, RebuildReport { version: 1, terms: 1, documents: 2 });

        engine.ingest(vec![headline("Valley warning", "https://a/3")]).unwrap();
        // the new document has no vector yet
        assert!(matches!(engine.find_similar(0), Err(EngineError::MissingVector(2))));

        let second = engine.rebuild_vocabulary_and_vectors().unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(engine.vocabulary().unwrap().terms, vec!["flood", "valley", "warn"]);
        for doc in engine.store().all_documents().unwrap() {
            let vector = doc.vector.unwrap();
            assert_eq!(vector.vocabulary_version, 2);
            assert_eq!(vector.counts.len(), 3);
        }
    }

    #[test]
    fn unknown_query_is_not_found() {
        let engine = engine();
        engine.ingest(vec![headline("Flood hits valley", "https://a/1")]).unwrap();
        engine.rebuild_vocabulary_and_vectors().unwrap();
        assert!(matches!(engine.find_similar(42), Err(EngineError::NotFound(42))));
        assert!(matches!(engine.document(42), Err(EngineError::NotFound(42))));
    }
}
