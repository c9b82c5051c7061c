//! Query-driven keyword extraction and hybrid candidate gating.
//!
//! Vector search recall is broadened with an over-fetched candidate set;
//! the gate then keeps candidates whose text actually mentions the
//! content-bearing query terms before reranking.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const MAX_TERMS: usize = 10;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "for", "to", "in", "on", "at", "by", "with", "from",
    "about", "what", "which", "who", "whom", "whose", "is", "are", "was", "were", "be", "been",
    "being", "do", "does", "did", "can", "could", "should", "would", "may", "might", "will",
    "shall", "we", "our", "us", "you", "your", "they", "their", "it", "its", "this", "that",
    "these", "those", "please", "show", "tell", "give", "list", "explain", "how", "why", "when",
];

fn phrase_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("static regex"))
}

fn word_split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w]+").expect("static regex"))
}

/// Content-bearing terms from a query: quoted phrases first, then
/// non-stopword words of length >= 3, deduplicated, in order, capped.
pub fn extract_query_terms(query: &str) -> Vec<String> {
    let query = query.trim();

    let phrases: Vec<String> = phrase_regex()
        .captures_iter(query)
        .map(|cap| cap[1].trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    let without_quotes = phrase_regex().replace_all(query, " ").to_lowercase();
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let words = word_split_regex()
        .split(&without_quotes)
        .filter(|w| w.len() >= 3 && !stopwords.contains(w))
        .map(str::to_string);

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for token in phrases.into_iter().chain(words) {
        if seen.insert(token.clone()) {
            ordered.push(token);
            if ordered.len() == MAX_TERMS {
                break;
            }
        }
    }
    ordered
}

/// Keep candidates whose text mentions the query terms.
///
/// With two or more terms, all must appear (AND); with one, any hit passes.
/// If the gate would throw everything away, the original candidates are
/// kept: an over-aggressive gate must not empty the set.
pub fn keyword_gate<T, F>(candidates: Vec<T>, terms: &[String], text_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if candidates.is_empty() || terms.is_empty() {
        return candidates;
    }

    let require_all = terms.len() >= 2;
    let passes = |candidate: &T| {
        let text = text_of(candidate).to_lowercase();
        let hits = terms.iter().filter(|term| text.contains(term.as_str())).count();
        if require_all {
            hits == terms.len()
        } else {
            hits >= 1
        }
    };

    let flags: Vec<bool> = candidates.iter().map(|c| passes(c)).collect();
    if !flags.iter().any(|&keep| keep) {
        return candidates;
    }

    candidates
        .into_iter()
        .zip(flags)
        .filter(|(_, keep)| *keep)
        .map(|(candidate, _)| candidate)
        .collect()
}
