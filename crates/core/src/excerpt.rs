use crate::config::ScoringConfig;
use crate::query::ParsedQuery;
use crate::tokenizer::Token;
use std::collections::{HashMap, HashSet};

const ELLIPSIS: &str = "…";
const MAX_RADIUS: usize = 4096;

/// Renders the densest window of matches in `text` with highlight markers.
///
/// `tokens` must come from tokenizing `text` with the index tokenizer.
pub fn build_excerpt(
    text: &str,
    tokens: &[Token],
    query: &ParsedQuery,
    config: &ScoringConfig,
) -> String {
    if tokens.is_empty() {
        return String::new();
    }

    let matched = mark_matches(tokens, query);
    let width = (config.excerpt_radius.min(MAX_RADIUS) * 2 + 1) as u32;
    let (window_start, window_end) = choose_window(tokens, &matched, width);

    let first = tokens
        .iter()
        .position(|token| token.position >= window_start)
        .unwrap_or(0);
    let last = tokens
        .iter()
        .rposition(|token| token.position <= window_end)
        .unwrap_or(first)
        .max(first);

    let mut excerpt = String::new();
    if first > 0 {
        excerpt.push_str(ELLIPSIS);
        excerpt.push(' ');
    }

    let mut open = false;
    for index in first..=last {
        let token = &tokens[index];
        if index > first {
            let gap = &text[tokens[index - 1].end..token.start];
            let merge = open && matched[index] && gap.trim().is_empty();
            if open && !merge {
                excerpt.push_str(&config.highlight_close);
                open = false;
            }
            push_collapsed(&mut excerpt, gap);
        }
        if matched[index] && !open {
            excerpt.push_str(&config.highlight_open);
            open = true;
        }
        excerpt.push_str(&text[token.start..token.end]);
    }
    if open {
        excerpt.push_str(&config.highlight_close);
    }

    if last + 1 < tokens.len() {
        excerpt.push(' ');
        excerpt.push_str(ELLIPSIS);
    }

    excerpt
}

fn mark_matches(tokens: &[Token], query: &ParsedQuery) -> Vec<bool> {
    let terms: HashSet<&str> = query.terms().collect();
    let mut matched: Vec<bool> = tokens
        .iter()
        .map(|token| terms.contains(token.term.as_str()))
        .collect();

    let by_position: HashMap<u32, usize> = tokens
        .iter()
        .enumerate()
        .map(|(index, token)| (token.position, index))
        .collect();

    for phrase in query.phrases() {
        let Some(head) = phrase.first() else {
            continue;
        };
        for (index, token) in tokens.iter().enumerate() {
            if token.term != head.term {
                continue;
            }
            let occurrence: Option<Vec<usize>> = phrase
                .iter()
                .map(|part| {
                    by_position
                        .get(&(token.position + part.offset))
                        .copied()
                        .filter(|slot| tokens[*slot].term == part.term)
                })
                .collect();
            if let Some(slots) = occurrence {
                matched[index] = true;
                for slot in slots {
                    matched[slot] = true;
                }
            }
        }
    }

    matched
}

/// Returns the inclusive position range of the first densest window.
fn choose_window(tokens: &[Token], matched: &[bool], width: u32) -> (u32, u32) {
    let hits: Vec<u32> = tokens
        .iter()
        .zip(matched)
        .filter(|(_, hit)| **hit)
        .map(|(token, _)| token.position)
        .collect();

    if hits.is_empty() {
        let start = tokens[0].position;
        return (start, start.saturating_add(width - 1));
    }

    let mut best = (0usize, 0usize);
    let mut end = 0usize;
    for start in 0..hits.len() {
        while end < hits.len() && hits[end] < hits[start].saturating_add(width) {
            end += 1;
        }
        if end - start > best.1 - best.0 {
            best = (start, end);
        }
    }

    let cluster_first = hits[best.0];
    let cluster_last = hits[best.1 - 1];
    let slack = width.saturating_sub(cluster_last - cluster_first + 1);
    let window_start = cluster_first.saturating_sub(slack / 2);
    (window_start, window_start.saturating_add(width - 1))
}

fn push_collapsed(target: &mut String, gap: &str) {
    if gap.is_empty() {
        return;
    }
    if gap.chars().all(char::is_whitespace) {
        target.push(' ');
        return;
    }
    let collapsed = gap.split_whitespace().collect::<Vec<_>>().join(" ");
    if gap.starts_with(char::is_whitespace) {
        target.push(' ');
    }
    target.push_str(&collapsed);
    if gap.ends_with(char::is_whitespace) {
        target.push(' ');
    }
}
