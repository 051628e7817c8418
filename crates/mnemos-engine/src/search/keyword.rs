//! Keyword search: BM25 over fact content and attribute values

use super::{ScoredFact, SearchEngine};
use mnemos_core::{Fact, Result};
use mnemos_store::FactStore;
use std::collections::{HashMap, HashSet};

const K1: f64 = 1.2;
const B: f64 = 0.75;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "on", "at", "to", "for", "with", "is", "was",
    "are", "were", "be", "i", "me", "my", "you", "your", "it", "that", "this", "what", "did",
    "do", "does", "have", "has", "had",
];

/// Lowercase alphanumeric tokens, stopwords and single characters removed
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

impl SearchEngine {
    /// Exact term matching, useful for names and technical terms that
    /// embeddings place poorly
    pub(crate) async fn keyword_search(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredFact>> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let facts = self.stores.facts.facts_for_user(user_id).await?;
        Ok(bm25(facts, &query_terms))
    }
}

/// BM25 scoring, normalized so the best hit scores 1.0
pub(crate) fn bm25(facts: Vec<Fact>, query_terms: &[String]) -> Vec<ScoredFact> {
    if facts.is_empty() {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = facts
        .iter()
        .map(|f| tokenize(&f.searchable_text()))
        .collect();
    let n = docs.len() as f64;
    let avg_len = docs.iter().map(|d| d.len()).sum::<usize>() as f64 / n;

    let mut doc_freq: HashMap<&str, f64> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc.iter().map(|t| t.as_str()).collect();
        for term in unique {
            *doc_freq.entry(term).or_default() += 1.0;
        }
    }

    let mut scored = Vec::new();
    for (fact, doc) in facts.into_iter().zip(docs.iter()) {
        let doc_len = doc.len() as f64;
        let mut term_freq: HashMap<&str, f64> = HashMap::new();
        for term in doc {
            *term_freq.entry(term.as_str()).or_default() += 1.0;
        }

        let mut score = 0.0;
        for term in query_terms {
            let tf = match term_freq.get(term.as_str()) {
                Some(tf) => *tf,
                None => continue,
            };
            let df = doc_freq.get(term.as_str()).copied().unwrap_or(0.0);
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let denom = tf + K1 * (1.0 - B + B * doc_len / avg_len.max(1.0));
            score += idf * tf * (K1 + 1.0) / denom;
        }
        if score > 0.0 {
            scored.push(ScoredFact { fact, score });
        }
    }

    // Normalize to [0, 1] against the best hit
    if let Some(max) = scored
        .iter()
        .map(|s| s.score)
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
    {
        if max > 0.0 {
            for s in &mut scored {
                s.score /= max;
            }
        }
    }
    scored
}
