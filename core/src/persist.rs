use crate::error::StoreError;
use crate::store::CorpusStore;
use crate::{DocId, Document, NewDocument, StoredVector, Vocabulary, VOCABULARY_ID};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

// Key layout inside the single `corpus` tree:
//   d + be(id)         -> bincode DocRecord
//   v + be(id)         -> JSON StoredVector
//   u + url            -> be(id)
//   #vocabulary/{ID}   -> JSON Vocabulary
//   #next_id           -> be(next id)
const DOC_PREFIX: u8 = b'd';
const VECTOR_PREFIX: u8 = b'v';
const URL_PREFIX: u8 = b'u';
const NEXT_ID_KEY: &[u8] = b"#next_id";

#[derive(Debug, Serialize, Deserialize)]
struct DocRecord {
    title: String,
    raw_text: String,
    url: Option<String>,
    source: Option<String>,
    published_at: Option<String>,
}

impl DocRecord {
    fn into_document(self, id: DocId, vector: Option<StoredVector>) -> Document {
        Document {
            id,
            title: self.title,
            raw_text: self.raw_text,
            url: self.url,
            source: self.source,
            published_at: self.published_at,
            vector,
        }
    }
}

impl From<NewDocument> for DocRecord {
    fn from(doc: NewDocument) -> Self {
        Self {
            title: doc.title,
            raw_text: doc.raw_text,
            url: doc.url,
            source: doc.source,
            published_at: doc.published_at,
        }
    }
}

fn id_key(prefix: u8, id: DocId) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(prefix);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn url_key(url: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(url.len() + 1);
    key.push(URL_PREFIX);
    key.extend_from_slice(url.as_bytes());
    key
}

fn vocabulary_key() -> Vec<u8> {
    format!("#vocabulary/{VOCABULARY_ID}").into_bytes()
}

fn decode_id(raw: &[u8]) -> Result<DocId, StoreError> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("{} byte id", raw.len())))?;
    Ok(DocId::from_be_bytes(bytes))
}

/// Corpus store backed by an embedded sled database.
///
/// Rebuild commits are applied as one batch, so readers see either the old
/// vocabulary with the old vectors or the new ones with the new vectors.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        Self::from_db(db)
    }

    /// A store that lives only as long as this process.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree("corpus")?;
        Ok(Self { db, tree })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn load_vector(&self, id: DocId) -> Result<Option<StoredVector>, StoreError> {
        match self.tree.get(id_key(VECTOR_PREFIX, id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }
}

impl CorpusStore for SledStore {
    fn all_documents(&self) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        for item in self.tree.scan_prefix([DOC_PREFIX]) {
            let (key, value) = item?;
            let id = decode_id(&key[1..])?;
            let record: DocRecord = bincode::deserialize(&value)?;
            docs.push(record.into_document(id, self.load_vector(id)?));
        }
        Ok(docs)
    }

    fn document(&self, id: DocId) -> Result<Option<Document>, StoreError> {
        match self.tree.get(id_key(DOC_PREFIX, id))? {
            Some(raw) => {
                let record: DocRecord = bincode::deserialize(&raw)?;
                Ok(Some(record.into_document(id, self.load_vector(id)?)))
            }
            None => Ok(None),
        }
    }

    fn insert_document(&self, doc: NewDocument) -> Result<Option<DocId>, StoreError> {
        let url = doc.url.clone();
        let encoded = bincode::serialize(&DocRecord::from(doc))?;

        let outcome = self.tree.transaction(|tx| {
            if let Some(url) = &url {
                if tx.get(url_key(url))?.is_some() {
                    return Ok(None);
                }
            }
            let id = match tx.get(NEXT_ID_KEY)? {
                Some(raw) => decode_id(&raw).map_err(ConflictableTransactionError::Abort)?,
                None => 0,
            };
            tx.insert(id_key(DOC_PREFIX, id), encoded.clone())?;
            if let Some(url) = &url {
                tx.insert(url_key(url), &id.to_be_bytes()[..])?;
            }
            tx.insert(NEXT_ID_KEY, &(id + 1).to_be_bytes()[..])?;
            Ok(Some(id))
        });

        match outcome {
            Ok(id) => Ok(id),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn vocabulary(&self) -> Result<Option<Vocabulary>, StoreError> {
        match self.tree.get(vocabulary_key())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn persist_vocabulary(&self, vocabulary: &Vocabulary) -> Result<(), StoreError> {
        let existed = self.tree.insert(vocabulary_key(), serde_json::to_vec(vocabulary)?)?.is_some();
        tracing::debug!(existed, version = vocabulary.version, "vocabulary persisted");
        Ok(())
    }

    fn persist_vector(&self, id: DocId, vector: &StoredVector) -> Result<(), StoreError> {
        if !self.tree.contains_key(id_key(DOC_PREFIX, id))? {
            return Err(StoreError::UnknownDocument(id));
        }
        self.tree.insert(id_key(VECTOR_PREFIX, id), serde_json::to_vec(vector)?)?;
        Ok(())
    }

    fn commit_rebuild(&self, vocabulary: &Vocabulary, vectors: &[(DocId, StoredVector)]) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for (id, vector) in vectors {
            if !self.tree.contains_key(id_key(DOC_PREFIX, *id))? {
                return Err(StoreError::UnknownDocument(*id));
            }
            batch.insert(id_key(VECTOR_PREFIX, *id), serde_json::to_vec(vector)?);
        }
        batch.insert(vocabulary_key(), serde_json::to_vec(vocabulary)?);
        self.tree.apply_batch(batch)?;
        self.flush()
    }
}
