//! Categorical search: facts whose category path matches query terms

use super::keyword::tokenize;
use super::{CategoryMatch, ScoredFact, SearchEngine, SearchFilters};
use mnemos_core::Result;
use mnemos_store::FactStore;
use std::collections::HashSet;

impl SearchEngine {
    /// Match query terms against the 4-level category paths
    ///
    /// Terms come from an explicit category filter when one is given;
    /// otherwise query tokens are intersected with the registered category
    /// vocabulary, so "show me food facts" resolves to the `food` topic.
    /// Every match scores 1.0; ordering falls to the recency tie-break.
    pub(crate) async fn categorical_search(
        &self,
        user_id: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredFact>> {
        let (terms, mode) = match &filters.category {
            Some(filter) => (filter.terms.clone(), filter.mode),
            None => {
                let vocab: HashSet<String> = self
                    .hierarchy
                    .read()
                    .await
                    .vocabulary()
                    .into_iter()
                    .collect();
                let terms: Vec<String> = tokenize(query)
                    .into_iter()
                    .filter(|t| vocab.contains(t))
                    .collect();
                (terms, CategoryMatch::Any)
            }
        };
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let facts = self.stores.facts.facts_for_user(user_id).await?;
        Ok(facts
            .into_iter()
            .filter(|f| match mode {
                CategoryMatch::Any => f.category.intersects(&terms),
                CategoryMatch::All => f.category.contains_all(&terms),
            })
            .map(|fact| ScoredFact { fact, score: 1.0 })
            .collect())
    }
}
