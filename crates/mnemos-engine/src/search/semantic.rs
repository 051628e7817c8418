//! Semantic search: cosine similarity against fact embeddings

use super::{ScoredFact, SearchEngine};
use crate::providers::embedding::cosine_similarity;
use crate::providers::with_timeout;
use mnemos_core::Result;
use mnemos_store::FactStore;
use tracing::warn;

impl SearchEngine {
    /// Standalone semantic search; degrades to keyword search when the
    /// embedding provider is down so the caller still gets an answer
    pub(crate) async fn semantic_search(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredFact>> {
        match self.semantic_scores(user_id, query).await {
            Ok(results) => Ok(results),
            Err(err) if err.is_provider_failure() => {
                warn!(error = %err, "embedding provider failed, degrading to keyword search");
                self.keyword_search(user_id, query).await
            }
            Err(err) => Err(err),
        }
    }

    /// Strict variant used inside hybrid search, where a failed constituent
    /// is excluded rather than substituted
    pub(crate) async fn semantic_scores(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredFact>> {
        let query_vec =
            with_timeout(self.config.embed_timeout, self.embedder.embed(query)).await?;

        let facts = self.stores.facts.facts_for_user(user_id).await?;
        let min = self.config.min_similarity;

        let mut results = Vec::new();
        for fact in facts {
            // Facts ingested under a degraded embedding provider have no
            // vector; they stay reachable via the other strategies
            let Some(embedding) = &fact.embedding else {
                continue;
            };
            let similarity = cosine_similarity(&query_vec, embedding).max(0.0);
            if similarity >= min {
                results.push(ScoredFact {
                    score: similarity as f64,
                    fact,
                });
            }
        }
        Ok(results)
    }
}
