//! In-memory positional inverted index.
//!
//! Every term maps to a posting list sorted by document id. A document's
//! postings are built outside the lock and spliced in under one short write
//! lock, so a reader sees either all of a document's terms or none of them.

use crate::error::IndexError;
use crate::models::DocumentId;
use crate::tokenizer::Token;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub document_id: DocumentId,
    /// Ascending token positions of the term within the document.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

#[derive(Default)]
struct IndexState {
    terms: HashMap<String, Vec<Posting>>,
    documents: HashMap<DocumentId, Vec<String>>,
}

#[derive(Default)]
pub struct InvertedIndex {
    state: RwLock<IndexState>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, id: &DocumentId, tokens: &[Token]) -> Result<(), IndexError> {
        let mut grouped: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for token in tokens {
            grouped.entry(token.term.as_str()).or_default().push(token.position);
        }

        let prepared: Vec<(String, Posting)> = grouped
            .into_iter()
            .map(|(term, mut positions)| {
                positions.sort_unstable();
                positions.dedup();
                (
                    term.to_string(),
                    Posting {
                        document_id: id.clone(),
                        positions,
                    },
                )
            })
            .collect();
        let term_names = prepared.iter().map(|(term, _)| term.clone()).collect();

        let mut guard = self.state.write();
        let IndexState { terms, documents } = &mut *guard;
        if documents.contains_key(id) {
            return Err(IndexError::DuplicateDocument(id.clone()));
        }

        for (term, posting) in prepared {
            let list = terms.entry(term).or_default();
            match list.binary_search_by(|existing| existing.document_id.cmp(id)) {
                Ok(slot) => list[slot] = posting,
                Err(slot) => list.insert(slot, posting),
            }
        }
        documents.insert(id.clone(), term_names);

        Ok(())
    }

    /// Drops every posting of `id`. Returns whether the document was indexed.
    pub fn remove_document(&self, id: &DocumentId) -> bool {
        let mut guard = self.state.write();
        let IndexState { terms, documents } = &mut *guard;
        let Some(document_terms) = documents.remove(id) else {
            return false;
        };

        for term in document_terms {
            let emptied = match terms.get_mut(&term) {
                Some(list) => {
                    if let Ok(slot) = list.binary_search_by(|existing| existing.document_id.cmp(id)) {
                        list.remove(slot);
                    }
                    list.is_empty()
                }
                None => false,
            };
            if emptied {
                terms.remove(&term);
            }
        }

        true
    }

    pub fn lookup(&self, term: &str) -> Vec<Posting> {
        self.reader().postings(term).to_vec()
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.reader().document_frequency(term)
    }

    pub fn document_count(&self) -> usize {
        self.reader().document_count()
    }

    pub fn term_count(&self) -> usize {
        self.state.read().terms.len()
    }

    pub fn contains_document(&self, id: &DocumentId) -> bool {
        self.state.read().documents.contains_key(id)
    }

    pub fn clear(&self) {
        let mut guard = self.state.write();
        guard.terms.clear();
        guard.documents.clear();
    }

    /// A consistent view for the duration of one query.
    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader {
            state: self.state.read(),
        }
    }
}

pub struct IndexReader<'a> {
    state: RwLockReadGuard<'a, IndexState>,
}

impl IndexReader<'_> {
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.state
            .terms
            .get(term)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings(term).len()
    }

    pub fn document_count(&self) -> usize {
        self.state.documents.len()
    }
}
