use crate::config::ScoringConfig;
use crate::error::SearchError;
use crate::excerpt::build_excerpt;
use crate::index::{IndexReader, InvertedIndex, Posting};
use crate::models::{DocumentId, DocumentStatus, ScoredResult, SearchPage};
use crate::query::{parse_query, ParsedQuery, PhraseTerm};
use crate::tokenizer::Tokenizer;
use crate::traits::DocumentStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Cooperative cancellation for a running query.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn check(&self) -> Result<(), SearchError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(SearchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SearchError::TimedOut),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    pub document_id: DocumentId,
    pub score: f64,
}

/// Scores every document that satisfies the query against one index snapshot.
///
/// Without phrases a document needs at least one term clause. With phrases it
/// must satisfy all of them; term clauses then only add score. Results are
/// ordered by score descending, then by document id.
pub fn rank(
    reader: &IndexReader<'_>,
    query: &ParsedQuery,
    config: &ScoringConfig,
    cancel: &CancelFlag,
) -> Result<Vec<RankedDocument>, SearchError> {
    let total = reader.document_count() as f64;
    let mut term_scores: HashMap<&DocumentId, f64> = HashMap::new();

    for term in query.terms() {
        cancel.check()?;
        let postings = reader.postings(term);
        if postings.is_empty() {
            continue;
        }
        let idf = (1.0 + total / postings.len() as f64).ln();
        for posting in postings {
            *term_scores.entry(&posting.document_id).or_default() +=
                f64::from(posting.frequency()) * idf;
        }
    }

    let phrases: Vec<&[PhraseTerm]> = query.phrases().collect();
    let mut ranked: Vec<RankedDocument> = if phrases.is_empty() {
        term_scores
            .into_iter()
            .map(|(document_id, score)| RankedDocument {
                document_id: document_id.clone(),
                score,
            })
            .collect()
    } else {
        let mut required: Option<Vec<&DocumentId>> = None;
        for phrase in &phrases {
            cancel.check()?;
            let satisfied = phrase_matches(reader, phrase, cancel)?;
            required = Some(match required {
                None => satisfied,
                Some(previous) => intersect_sorted(&previous, &satisfied),
            });
        }

        let bonus = config.phrase_bonus * phrases.len() as f64;
        required
            .unwrap_or_default()
            .into_iter()
            .map(|document_id| RankedDocument {
                document_id: document_id.clone(),
                score: term_scores.get(document_id).copied().unwrap_or(0.0) + bonus,
            })
            .collect()
    };

    ranked.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.document_id.cmp(&right.document_id))
    });
    Ok(ranked)
}

/// Documents, in id order, holding every phrase term at its relative offset.
fn phrase_matches<'a>(
    reader: &'a IndexReader<'_>,
    phrase: &[PhraseTerm],
    cancel: &CancelFlag,
) -> Result<Vec<&'a DocumentId>, SearchError> {
    let lists: Vec<&[Posting]> = phrase
        .iter()
        .map(|part| reader.postings(&part.term))
        .collect();
    if lists.iter().any(|list| list.is_empty()) {
        return Ok(Vec::new());
    }

    let mut cursors = vec![0usize; lists.len()];
    let mut matches = Vec::new();

    'candidates: for head in lists[0] {
        let mut aligned: Vec<&[u32]> = vec![head.positions.as_slice()];
        for (list, cursor) in lists.iter().zip(cursors.iter_mut()).skip(1) {
            cancel.check()?;
            while *cursor < list.len() && list[*cursor].document_id < head.document_id {
                *cursor += 1;
            }
            match list.get(*cursor) {
                Some(posting) if posting.document_id == head.document_id => {
                    aligned.push(posting.positions.as_slice());
                }
                Some(_) => continue 'candidates,
                None => break 'candidates,
            }
        }

        if positions_align(&aligned, phrase) {
            matches.push(&head.document_id);
        }
    }

    Ok(matches)
}

/// Walks the head positions once, advancing one cursor per following term.
fn positions_align(positions: &[&[u32]], phrase: &[PhraseTerm]) -> bool {
    let mut cursors = vec![0usize; positions.len()];

    'starts: for &start in positions[0] {
        let base = start - phrase[0].offset.min(start);
        for index in 1..positions.len() {
            let target = base + phrase[index].offset;
            let list = positions[index];
            let cursor = &mut cursors[index];
            while *cursor < list.len() && list[*cursor] < target {
                *cursor += 1;
            }
            if *cursor >= list.len() {
                return false;
            }
            if list[*cursor] != target {
                continue 'starts;
            }
        }
        return true;
    }

    false
}

fn intersect_sorted<'a>(left: &[&'a DocumentId], right: &[&'a DocumentId]) -> Vec<&'a DocumentId> {
    let mut merged = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                merged.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged
}

pub struct QueryEngine {
    index: Arc<InvertedIndex>,
    tokenizer: Arc<Tokenizer>,
    store: Arc<dyn DocumentStore>,
    config: ScoringConfig,
}

impl QueryEngine {
    pub fn new(
        index: Arc<InvertedIndex>,
        tokenizer: Arc<Tokenizer>,
        store: Arc<dyn DocumentStore>,
        config: ScoringConfig,
    ) -> Self {
        Self {
            index,
            tokenizer,
            store,
            config,
        }
    }

    /// Ranks against one index snapshot, then fills up to `top_k` results from
    /// documents whose stored record is still indexed.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        cancel: &CancelFlag,
    ) -> Result<SearchPage, SearchError> {
        let started = Instant::now();
        let parsed = parse_query(query, &self.tokenizer)?;
        if parsed.is_empty() {
            return Ok(SearchPage::default());
        }

        let top_k = top_k.clamp(1, self.config.max_top_k.max(1));
        let ranked = {
            let reader = self.index.reader();
            rank(&reader, &parsed, &self.config, cancel)?
        };
        let total = ranked.len();

        let mut results = Vec::with_capacity(top_k.min(total));
        for hit in ranked {
            if results.len() == top_k {
                break;
            }
            cancel.check()?;
            let Some(document) = self.store.get(&hit.document_id).await? else {
                continue;
            };
            if document.status != DocumentStatus::Indexed {
                continue;
            }

            let tokens = self.tokenizer.tokenize(&document.text);
            let excerpt = build_excerpt(&document.text, &tokens, &parsed, &self.config);
            results.push(ScoredResult {
                document_id: hit.document_id,
                filename: document.filename,
                score: hit.score,
                excerpt,
            });
        }

        debug!(
            query,
            total,
            returned = results.len(),
            took_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(SearchPage { total, results })
    }
}
