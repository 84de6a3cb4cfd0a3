use crate::config::TokenizerConfig;
use crate::extractor::PAGE_BOUNDARY;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Letters and digits, optionally joined by a single inner apostrophe, hyphen, dot or underscore.
    static ref WORD: Regex =
        Regex::new(r"[\p{L}\p{M}\p{N}]+(?:['’\-._][\p{L}\p{M}\p{N}]+)*").expect("valid regex");

    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "can't", "cannot", "could", "couldn't", "did",
        "didn't", "do", "does", "doesn't", "doing", "don't", "down", "during", "each", "few",
        "for", "from", "further", "had", "hadn't", "has", "hasn't", "have", "haven't", "having",
        "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "i'm",
        "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "let's", "me", "more",
        "most", "my", "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
        "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
        "shouldn't", "so", "some", "such", "than", "that", "that's", "the", "their", "theirs",
        "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
        "to", "too", "under", "until", "up", "very", "was", "wasn't", "we", "were", "weren't",
        "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
        "won't", "would", "wouldn't", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect();
}

fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(term)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    /// Zero-based token index, not a byte offset.
    pub position: u32,
    /// Byte span of the word in the source text.
    pub start: usize,
    pub end: usize,
}

pub struct Tokenizer {
    stemmer: Option<Stemmer>,
    stopwords: bool,
    phrase_across_pages: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            stemmer: config
                .stemming
                .then(|| Stemmer::create(Algorithm::English)),
            stopwords: config.stopwords,
            phrase_across_pages: config.phrase_across_pages,
        }
    }

    /// Splits `text` into normalized terms.
    ///
    /// Positions advance once per word and once per whitespace-delimited chunk
    /// that holds no word at all (a lone `-`, say), so phrase adjacency reflects
    /// the input text. Dropped stopwords keep their position too. A page
    /// boundary also advances the position unless phrases may span pages.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        let mut chunk_start: Option<usize> = None;

        for (offset, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(start) = chunk_start.take() {
                    self.push_chunk(text, start, offset, &mut position, &mut tokens);
                }
                if ch == PAGE_BOUNDARY && !self.phrase_across_pages {
                    position += 1;
                }
            } else if chunk_start.is_none() {
                chunk_start = Some(offset);
            }
        }

        if let Some(start) = chunk_start {
            self.push_chunk(text, start, text.len(), &mut position, &mut tokens);
        }

        tokens
    }

    pub fn normalize(&self, word: &str) -> String {
        self.stem(fold(word))
    }

    fn stem(&self, folded: String) -> String {
        match &self.stemmer {
            Some(stemmer) => stemmer.stem(&folded).into_owned(),
            None => folded,
        }
    }

    fn push_chunk(
        &self,
        text: &str,
        start: usize,
        end: usize,
        position: &mut u32,
        tokens: &mut Vec<Token>,
    ) {
        let chunk = &text[start..end];
        let mut consumed = false;

        for word in WORD.find_iter(chunk) {
            let folded = fold(word.as_str());
            if folded.is_empty() {
                continue;
            }
            consumed = true;
            if self.stopwords && is_stopword(&folded) {
                *position += 1;
                continue;
            }
            tokens.push(Token {
                term: self.stem(folded),
                position: *position,
                start: start + word.start(),
                end: start + word.end(),
            });
            *position += 1;
        }

        if !consumed {
            *position += 1;
        }
    }
}

fn fold(word: &str) -> String {
    word.nfkc().collect::<String>().to_lowercase()
}
