//! Bag-of-words vectorization and cosine ranking for a headline corpus.
//!
//! Raw headline text flows through the [`tokenizer`] into a corpus-wide
//! [`Vocabulary`], every document is encoded against it by [`vectorize`], and
//! [`similarity`] ranks the corpus against a query document. Persistence sits
//! behind the [`store::CorpusStore`] trait; [`engine::NewsEngine`] ties the
//! pieces together for the indexer and the server.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

pub mod config;
pub mod engine;
pub mod error;
pub mod persist;
pub mod similarity;
pub mod store;
pub mod tokenizer;
pub mod vectorize;
pub mod vocabulary;

pub use config::EngineConfig;
pub use engine::{IngestReport, NewsEngine, RebuildReport};
pub use error::{EngineError, StoreError};
pub use persist::SledStore;
pub use similarity::{cosine, rank_similar, Ranking, SimilarDocument};
pub use store::{CorpusStore, MemoryStore};
pub use tokenizer::{normalize, Normalizer};
pub use vectorize::vectorize;
pub use vocabulary::build_vocabulary;

pub type DocId = u32;

/// Identifier of the single persisted vocabulary record.
pub const VOCABULARY_ID: u32 = 1;

const QUOTES: &[char] = &['\'', '"', '`'];

/// A headline as handed over by the ingestion layer, before it has an id.
///
/// Accepts feed-style field names (`description`, `pub_date`, `news_source`) when deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewDocument {
    pub title: String,
    #[serde(alias = "description", alias = "body")]
    pub raw_text: String,
    pub url: Option<String>,
    #[serde(alias = "news_source")]
    pub source: Option<String>,
    #[serde(alias = "pub_date", alias = "timestamp")]
    pub published_at: Option<String>,
}

impl NewDocument {
    /// Strip surrounding whitespace and stray quote characters from title and text.
    pub fn trimmed(self) -> Self {
        let trim = |s: &str| s.trim().trim_matches(QUOTES).trim().to_string();
        Self {
            title: trim(&self.title),
            raw_text: trim(&self.raw_text),
            url: self.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
            published_at: self.published_at.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            ..self
        }
    }

    /// Replace the raw publication date with its RFC 3339 form.
    ///
    /// Returns the raw value as the error when it is neither RFC 2822 (feed
    /// `pubDate`) nor RFC 3339.
    pub fn with_parsed_date(self) -> Result<Self, String> {
        let published_at = match self.published_at {
            Some(raw) => match parse_published_at(&raw).and_then(|d| d.format(&Rfc3339).ok()) {
                Some(formatted) => Some(formatted),
                None => return Err(raw),
            },
            None => None,
        };
        Ok(Self { published_at, ..self })
    }
}

/// Parse a publication date, e.g. `Wed, 10 Apr 2024 17:52:00 +0545` or `2024-04-10T17:52:00Z`.
pub fn parse_published_at(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub raw_text: String,
    pub url: Option<String>,
    pub source: Option<String>,
    /// RFC 3339, normalized at ingest.
    pub published_at: Option<String>,
    /// `None` until the first rebuild after the document was ingested.
    pub vector: Option<StoredVector>,
}

impl Document {
    pub fn from_new(id: DocId, doc: NewDocument) -> Self {
        Self {
            id,
            title: doc.title,
            raw_text: doc.raw_text,
            url: doc.url,
            source: doc.source,
            published_at: doc.published_at,
            vector: None,
        }
    }
}

/// Term counts of one document, tied to the vocabulary version they were computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVector {
    pub vocabulary_version: u64,
    pub counts: Vec<u32>,
}

/// Ordered, versioned list of terms. Dimension `i` of every vector stamped
/// with `version` counts `terms[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub version: u64,
    pub terms: Vec<String>,
    pub built_at: String,
}

impl Vocabulary {
    pub fn new(version: u64, terms: Vec<String>) -> Self {
        let built_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        Self { version, terms, built_at }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Encode `raw_text` against this vocabulary and stamp the result with its version.
    pub fn encode(&self, raw_text: &str, normalizer: &Normalizer) -> StoredVector {
        StoredVector {
            vocabulary_version: self.version,
            counts: vectorize(raw_text, normalizer, &self.terms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_feed_field_names() {
        let doc: NewDocument = serde_json::from_str(
            r#"{"title":"'Budget unveiled'","description":"Finance minister presents budget","url":"https://a/1","pub_date":"Wed, 10 Apr 2024 17:52:00 +0545"}"#,
        )
        .unwrap();
        assert_eq!(doc.raw_text, "Finance minister presents budget");
        assert_eq!(doc.published_at.as_deref(), Some("Wed, 10 Apr 2024 17:52:00 +0545"));
        assert_eq!(doc.trimmed().title, "Budget unveiled");
    }

    #[test]
    fn feed_dates_are_normalized_to_rfc3339() {
        let doc = NewDocument { published_at: Some(" Wed, 10 Apr 2024 17:52:00 +0545 ".into()), ..Default::default() };
        let doc = doc.trimmed().with_parsed_date().unwrap();
        assert_eq!(doc.published_at.as_deref(), Some("2024-04-10T17:52:00+05:45"));

        let doc = NewDocument { published_at: Some("2024-04-10T12:07:00Z".into()), ..Default::default() };
        assert_eq!(doc.with_parsed_date().unwrap().published_at.as_deref(), Some("2024-04-10T12:07:00Z"));
    }

    #[test]
    fn unparseable_dates_are_rejected() {
        let doc = NewDocument { published_at: Some("not a date".into()), ..Default::default() };
        assert_eq!(doc.with_parsed_date().unwrap_err(), "not a date");
        let undated = NewDocument::default().with_parsed_date().unwrap();
        assert_eq!(undated.published_at, None);
    }

    #[test]
    fn trimming_drops_blank_urls() {
        let doc = NewDocument { raw_text: "  \"`quoted`\"  ".into(), url: Some("  ".into()), ..Default::default() };
        let doc = doc.trimmed();
        assert_eq!(doc.raw_text, "quoted");
        assert_eq!(doc.url, None);
    }
}
