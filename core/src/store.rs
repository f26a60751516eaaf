use crate::error::StoreError;
use crate::{DocId, Document, NewDocument, StoredVector, Vocabulary};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Persistence boundary for documents, their vectors and the vocabulary singleton.
pub trait CorpusStore: Send + Sync {
    /// Every document in corpus (ascending id) order.
    fn all_documents(&self) -> Result<Vec<Document>, StoreError>;

    fn document(&self, id: DocId) -> Result<Option<Document>, StoreError>;

    /// Store a new document. Returns `None` if one with the same URL already exists.
    fn insert_document(&self, doc: NewDocument) -> Result<Option<DocId>, StoreError>;

    fn vocabulary(&self) -> Result<Option<Vocabulary>, StoreError>;

    /// Create or replace the vocabulary singleton.
    fn persist_vocabulary(&self, vocabulary: &Vocabulary) -> Result<(), StoreError>;

    /// Replace the vector of an existing document.
    fn persist_vector(&self, id: DocId, vector: &StoredVector) -> Result<(), StoreError>;

    /// Write a rebuilt vocabulary together with every document vector computed from it.
    ///
    /// Implementations should apply this atomically; the default does not.
    fn commit_rebuild(&self, vocabulary: &Vocabulary, vectors: &[(DocId, StoredVector)]) -> Result<(), StoreError> {
        for (id, vector) in vectors {
            self.persist_vector(*id, vector)?;
        }
        self.persist_vocabulary(vocabulary)
    }
}

#[derive(Default)]
struct MemoryInner {
    docs: BTreeMap<DocId, Document>,
    urls: HashMap<String, DocId>,
    vocabulary: Option<Vocabulary>,
    next_id: DocId,
}

/// In-process store. Cheap to build; used by tests and tools.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorpusStore for MemoryStore {
    fn all_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.inner.read().docs.values().cloned().collect())
    }

    fn document(&self, id: DocId) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.read().docs.get(&id).cloned())
    }

    fn insert_document(&self, doc: NewDocument) -> Result<Option<DocId>, StoreError> {
        let mut inner = self.inner.write();
        if let Some(url) = &doc.url {
            if inner.urls.contains_key(url) {
                return Ok(None);
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        if let Some(url) = &doc.url {
            inner.urls.insert(url.clone(), id);
        }
        inner.docs.insert(id, Document::from_new(id, doc));
        Ok(Some(id))
    }

    fn vocabulary(&self) -> Result<Option<Vocabulary>, StoreError> {
        Ok(self.inner.read().vocabulary.clone())
    }

    fn persist_vocabulary(&self, vocabulary: &Vocabulary) -> Result<(), StoreError> {
        self.inner.write().vocabulary = Some(vocabulary.clone());
        Ok(())
    }

    fn persist_vector(&self, id: DocId, vector: &StoredVector) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let doc = inner.docs.get_mut(&id).ok_or(StoreError::UnknownDocument(id))?;
        doc.vector = Some(vector.clone());
        Ok(())
    }

    fn commit_rebuild(&self, vocabulary: &Vocabulary, vectors: &[(DocId, StoredVector)]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some((id, _)) = vectors.iter().find(|(id, _)| !inner.docs.contains_key(id)) {
            return Err(StoreError::UnknownDocument(*id));
        }
        for (id, vector) in vectors {
            if let Some(doc) = inner.docs.get_mut(id) {
                doc.vector = Some(vector.clone());
            }
        }
        inner.vocabulary = Some(vocabulary.clone());
        Ok(())
    }
}
