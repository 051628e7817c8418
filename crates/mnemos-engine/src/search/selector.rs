//! Automatic strategy selection from query shape

use super::keyword::tokenize;
use super::temporal::parse_time_expression;
use super::{Strategy, StrategyChoice};
use crate::providers::extraction::ExtractionProvider;
use async_trait::async_trait;
use chrono::Utc;
use mnemos_core::CategoryHierarchy;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Picks a strategy for a query the caller did not pin one for
///
/// Selection never fails: a selector that cannot decide answers with the
/// hybrid default.
#[async_trait]
pub trait StrategySelector: Send + Sync {
    async fn select(&self, query: &str) -> StrategyChoice;
}

/// Deterministic selection from surface features of the query
///
/// Rules, first match wins:
/// 1. a parseable time expression routes to temporal
/// 2. relationship phrasing ("related to", "connected") routes to graph
/// 3. category-browse phrasing ("show me ... facts") routes to categorical
/// 4. a short bare term list with no verbs routes to keyword
/// 5. soft recency words ("recent", "lately") get a temporal-weighted
///    hybrid mix
/// 6. everything else gets the default hybrid mix
pub struct RuleBasedSelector {
    hierarchy: Arc<RwLock<CategoryHierarchy>>,
}

const VERBS: &[&str] = &[
    "like", "likes", "love", "loves", "prefer", "prefers", "hate", "hates", "know", "knows",
    "want", "wants", "work", "works", "live", "lives", "went", "go", "goes", "eat", "eats",
    "play", "plays", "use", "uses",
];

const RECENCY_WORDS: &[&str] = &["recent", "recently", "lately"];

impl RuleBasedSelector {
    pub fn new(hierarchy: Arc<RwLock<CategoryHierarchy>>) -> Self {
        Self { hierarchy }
    }

    async fn decide(&self, query: &str) -> StrategyChoice {
        let lower = query.to_lowercase();

        if parse_time_expression(query, Utc::now()).is_some() {
            return StrategyChoice::single(Strategy::Temporal);
        }
        if lower.contains("related to")
            || lower.contains("connected")
            || lower.contains("relationship")
        {
            return StrategyChoice::single(Strategy::Graph);
        }

        let tokens = tokenize(&lower);
        if lower.starts_with("show me")
            || lower.starts_with("list")
            || (lower.contains("facts") && {
                let vocab = self.hierarchy.read().await.vocabulary();
                tokens.iter().any(|t| vocab.contains(t))
            })
        {
            return StrategyChoice::single(Strategy::Categorical);
        }

        // Bare term lists ("Python FastAPI TypeScript") want exact matching
        let word_count = query.split_whitespace().count();
        if word_count <= 4
            && !tokens.is_empty()
            && !tokens.iter().any(|t| VERBS.contains(&t.as_str()))
            && !lower.contains('?')
        {
            return StrategyChoice::single(Strategy::Keyword);
        }

        if RECENCY_WORDS.iter().any(|w| tokens.iter().any(|t| t == w)) {
            return StrategyChoice::hybrid(vec![
                (Strategy::Temporal, 0.4),
                (Strategy::Semantic, 0.4),
                (Strategy::Categorical, 0.2),
            ]);
        }

        StrategyChoice::hybrid_default()
    }
}

#[async_trait]
impl StrategySelector for RuleBasedSelector {
    async fn select(&self, query: &str) -> StrategyChoice {
        let choice = self.decide(query).await;
        debug!(query, strategy = choice.strategy.as_str(), "selected strategy");
        choice
    }
}

/// Ask the extraction provider to pick; fall back to the rule table when
/// the provider is down or answers nonsense
pub struct ProviderStrategySelector {
    provider: Arc<dyn ExtractionProvider>,
    fallback: RuleBasedSelector,
}

impl ProviderStrategySelector {
    pub fn new(provider: Arc<dyn ExtractionProvider>, fallback: RuleBasedSelector) -> Self {
        Self { provider, fallback }
    }
}

#[async_trait]
impl StrategySelector for ProviderStrategySelector {
    async fn select(&self, query: &str) -> StrategyChoice {
        match self.provider.select_strategy(query).await {
            Ok(choice) => choice,
            Err(err) => {
                debug!(error = %err, "provider selection failed, using rules");
                self.fallback.select(query).await
            }
        }
    }
}
