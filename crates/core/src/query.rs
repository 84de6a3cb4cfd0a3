use crate::error::SearchError;
use crate::tokenizer::Tokenizer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseTerm {
    pub term: String,
    /// Distance in positions from the first term of the phrase.
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Optional; contributes to ranking.
    Term(String),
    /// Mandatory; terms must appear in order at their relative offsets.
    Phrase(Vec<PhraseTerm>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub clauses: Vec<Clause>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Term(term) => Some(term.as_str()),
            Clause::Phrase(_) => None,
        })
    }

    pub fn phrases(&self) -> impl Iterator<Item = &[PhraseTerm]> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Phrase(terms) => Some(terms.as_slice()),
            Clause::Term(_) => None,
        })
    }

    fn push_term(&mut self, term: String) {
        let clause = Clause::Term(term);
        if !self.clauses.contains(&clause) {
            self.clauses.push(clause);
        }
    }
}

/// Splits a query into phrase clauses (`"..."`) and bare term clauses.
///
/// Clause text goes through the index tokenizer, so query terms are normalized
/// exactly like document terms. Runs that normalize to nothing are dropped.
pub fn parse_query(query: &str, tokenizer: &Tokenizer) -> Result<ParsedQuery, SearchError> {
    let mut parsed = ParsedQuery::default();
    let mut rest = query;
    let mut consumed = 0usize;

    while let Some(open) = rest.find('"') {
        for token in tokenizer.tokenize(&rest[..open]) {
            parsed.push_term(token.term);
        }

        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('"') else {
            return Err(SearchError::QuerySyntax {
                position: consumed + open,
                message: "unterminated quote".to_string(),
            });
        };

        let tokens = tokenizer.tokenize(&after_open[..close]);
        if let Some(first) = tokens.first().map(|token| token.position) {
            let phrase = tokens
                .into_iter()
                .map(|token| PhraseTerm {
                    term: token.term,
                    offset: token.position - first,
                })
                .collect();
            parsed.clauses.push(Clause::Phrase(phrase));
        }

        let advance = open + 1 + close + 1;
        consumed += advance;
        rest = &rest[advance..];
    }

    for token in tokenizer.tokenize(rest) {
        parsed.push_term(token.term);
    }

    Ok(parsed)
}
