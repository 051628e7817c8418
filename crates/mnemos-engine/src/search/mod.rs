//! Search strategies over the fact store
//!
//! Six strategies behind one entry point, [`SearchEngine::search`]:
//! semantic, keyword, categorical, temporal, graph and hybrid. When the
//! caller does not pin a strategy, a [`selector::StrategySelector`] picks
//! one from the query shape. Every strategy returns scores in [0, 1] and
//! never mutates a fact.

mod categorical;
mod graph_search;
mod hybrid;
mod keyword;
mod semantic;
pub mod selector;
mod temporal;

pub use selector::{ProviderStrategySelector, RuleBasedSelector, StrategySelector};
pub use temporal::{parse_time_expression, TimeWindow};

use crate::graph::EntityGraph;
use crate::providers::embedding::EmbeddingProvider;
use crate::Stores;
use chrono::{DateTime, Utc};
use mnemos_core::{CategoryHierarchy, Error, Fact, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// The closed set of search strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Semantic,
    Keyword,
    Categorical,
    Temporal,
    Graph,
    Hybrid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Semantic => "semantic",
            Strategy::Keyword => "keyword",
            Strategy::Categorical => "categorical",
            Strategy::Temporal => "temporal",
            Strategy::Graph => "graph",
            Strategy::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Strategy> {
        match s.trim().to_lowercase().as_str() {
            "semantic" => Some(Strategy::Semantic),
            "keyword" => Some(Strategy::Keyword),
            "categorical" => Some(Strategy::Categorical),
            "temporal" => Some(Strategy::Temporal),
            "graph" => Some(Strategy::Graph),
            "hybrid" => Some(Strategy::Hybrid),
            _ => None,
        }
    }
}

/// A strategy picked for a query, with optional hybrid weights
#[derive(Debug, Clone)]
pub struct StrategyChoice {
    pub strategy: Strategy,
    /// Constituent weights when `strategy` is `Hybrid`; None means the
    /// engine's configured default mix
    pub weights: Option<Vec<(Strategy, f64)>>,
}

impl StrategyChoice {
    pub fn single(strategy: Strategy) -> Self {
        Self {
            strategy,
            weights: None,
        }
    }

    pub fn hybrid_default() -> Self {
        Self::single(Strategy::Hybrid)
    }

    pub fn hybrid(weights: Vec<(Strategy, f64)>) -> Self {
        Self {
            strategy: Strategy::Hybrid,
            weights: Some(weights),
        }
    }
}

/// How category filter terms combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMatch {
    /// At least one term matches a path level
    Any,
    /// Every term matches some path level
    All,
}

/// Restrict results to facts whose category path matches the terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub terms: Vec<String>,
    pub mode: CategoryMatch,
}

impl CategoryFilter {
    pub fn any(terms: Vec<String>) -> Self {
        Self {
            terms,
            mode: CategoryMatch::Any,
        }
    }

    pub fn all(terms: Vec<String>) -> Self {
        Self {
            terms,
            mode: CategoryMatch::All,
        }
    }

    fn matches(&self, fact: &Fact) -> bool {
        match self.mode {
            CategoryMatch::Any => fact.category.intersects(&self.terms),
            CategoryMatch::All => fact.category.contains_all(&self.terms),
        }
    }
}

/// Optional filters applied on top of any strategy
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub category: Option<CategoryFilter>,
    /// Restrict to facts created inside this window (inclusive)
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl SearchFilters {
    fn matches(&self, fact: &Fact) -> bool {
        if let Some(filter) = &self.category {
            if !filter.matches(fact) {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if fact.created_at < start || fact.created_at > end {
                return false;
            }
        }
        true
    }
}

/// A fact with its relevance score in [0, 1]
#[derive(Debug, Clone)]
pub struct ScoredFact {
    pub fact: Fact,
    pub score: f64,
}

/// Tunables for the search engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum cosine similarity for semantic results
    pub min_similarity: f32,

    /// Maximum traversal depth for graph search
    pub graph_max_depth: usize,

    /// Per-hop score decay for graph search
    pub graph_decay: f64,

    /// Default hybrid mix when the selector does not provide one
    pub default_hybrid_weights: Vec<(Strategy, f64)>,

    /// Deadline for the query embedding call
    pub embed_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.7,
            graph_max_depth: 3,
            graph_decay: 0.6,
            default_hybrid_weights: vec![(Strategy::Semantic, 0.7), (Strategy::Keyword, 0.3)],
            embed_timeout: Duration::from_secs(10),
        }
    }
}

/// Executes search strategies against the stores
pub struct SearchEngine {
    pub(crate) stores: Stores,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) hierarchy: Arc<RwLock<CategoryHierarchy>>,
    pub(crate) graph: EntityGraph,
    selector: Arc<dyn StrategySelector>,
    pub(crate) config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        stores: Stores,
        embedder: Arc<dyn EmbeddingProvider>,
        hierarchy: Arc<RwLock<CategoryHierarchy>>,
        graph: EntityGraph,
        selector: Arc<dyn StrategySelector>,
        config: SearchConfig,
    ) -> Self {
        Self {
            stores,
            embedder,
            hierarchy,
            graph,
            selector,
            config,
        }
    }

    /// Run a search, auto-selecting the strategy when `strategy` is None
    ///
    /// Results are ordered by score descending; ties break by recency of
    /// last mention, then by fact ID for a stable order.
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        strategy: Option<Strategy>,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<ScoredFact>> {
        if limit == 0 {
            return Err(Error::InvalidInput("limit must be positive".to_string()));
        }
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("empty query".to_string()));
        }

        let choice = match strategy {
            Some(strategy) => StrategyChoice::single(strategy),
            None => self.selector.select(query).await,
        };
        debug!(
            user_id,
            query,
            strategy = choice.strategy.as_str(),
            "executing search"
        );

        let mut results = self.dispatch(user_id, query, &choice, filters).await?;
        results.retain(|r| filters.matches(&r.fact));
        Ok(order_and_truncate(results, limit))
    }

    async fn dispatch(
        &self,
        user_id: &str,
        query: &str,
        choice: &StrategyChoice,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredFact>> {
        match choice.strategy {
            Strategy::Semantic => self.semantic_search(user_id, query).await,
            Strategy::Keyword => self.keyword_search(user_id, query).await,
            Strategy::Categorical => self.categorical_search(user_id, query, filters).await,
            Strategy::Temporal => self.temporal_search(user_id, query, filters).await,
            Strategy::Graph => self.graph_search(user_id, query).await,
            Strategy::Hybrid => {
                let weights = choice
                    .weights
                    .clone()
                    .unwrap_or_else(|| self.config.default_hybrid_weights.clone());
                self.hybrid_search(user_id, query, &weights, filters).await
            }
        }
    }
}

/// Order by score descending, breaking ties by recency then ID
pub(crate) fn order_and_truncate(mut results: Vec<ScoredFact>, limit: usize) -> Vec<ScoredFact> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.fact.last_mentioned_at.cmp(&a.fact.last_mentioned_at))
            .then_with(|| a.fact.id.cmp(&b.fact.id))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::CategoryPath;

    #[test]
    fn test_strategy_parse_round_trip() {
        for s in [
            Strategy::Semantic,
            Strategy::Keyword,
            Strategy::Categorical,
            Strategy::Temporal,
            Strategy::Graph,
            Strategy::Hybrid,
        ] {
            assert_eq!(Strategy::parse(s.as_str()), Some(s));
        }
        assert_eq!(Strategy::parse("psychic"), None);
    }

    #[test]
    fn test_order_and_truncate_tie_breaks_by_recency() {
        let mut old = Fact::new("u", "old", CategoryPath::default(), 0.5);
        old.last_mentioned_at = Utc::now() - chrono::Duration::hours(1);
        let new = Fact::new("u", "new", CategoryPath::default(), 0.5);

        let results = order_and_truncate(
            vec![
                ScoredFact {
                    fact: old,
                    score: 0.5,
                },
                ScoredFact {
                    fact: new,
                    score: 0.5,
                },
            ],
            10,
        );
        assert_eq!(results[0].fact.content, "new");
    }

    #[test]
    fn test_category_filter_modes() {
        let fact = Fact::new(
            "u",
            "x",
            CategoryPath::new(mnemos_core::Domain::Preferences, "food", "cuisine", ""),
            0.5,
        );

        assert!(CategoryFilter::any(vec!["food".into(), "music".into()]).matches(&fact));
        assert!(!CategoryFilter::all(vec!["food".into(), "music".into()]).matches(&fact));
        assert!(CategoryFilter::all(vec!["preferences".into(), "food".into()]).matches(&fact));
    }
}
