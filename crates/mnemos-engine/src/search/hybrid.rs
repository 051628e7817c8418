//! Hybrid search: weighted combination of constituent strategies

use super::{ScoredFact, SearchEngine, SearchFilters, Strategy};
use futures::future::join_all;
use mnemos_core::{Error, FactId, Result};
use std::collections::HashMap;
use tracing::warn;

impl SearchEngine {
    /// Run the weighted constituents concurrently and merge their scores
    ///
    /// A constituent that fails with a provider-class error is excluded and
    /// its weight redistributed over the rest; hard errors (storage, bad
    /// input) propagate. Combined scores stay in [0, 1].
    pub(crate) async fn hybrid_search(
        &self,
        user_id: &str,
        query: &str,
        weights: &[(Strategy, f64)],
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredFact>> {
        let weights: Vec<(Strategy, f64)> = weights
            .iter()
            .filter(|(s, w)| *s != Strategy::Hybrid && *w > 0.0)
            .copied()
            .collect();
        if weights.is_empty() {
            return Err(Error::InvalidInput(
                "hybrid search needs at least one weighted constituent".to_string(),
            ));
        }

        let runs = join_all(weights.iter().map(|(strategy, weight)| async move {
            let result = self.constituent(user_id, query, *strategy, filters).await;
            (*strategy, *weight, result)
        }))
        .await;

        let mut sets = Vec::new();
        for (strategy, weight, result) in runs {
            match result {
                Ok(results) => sets.push((weight, results)),
                Err(err) if err.is_hard() => return Err(err),
                Err(err) => {
                    warn!(
                        strategy = strategy.as_str(),
                        error = %err,
                        "hybrid constituent failed, excluding it"
                    );
                }
            }
        }
        Ok(combine_weighted(sets))
    }

    async fn constituent(
        &self,
        user_id: &str,
        query: &str,
        strategy: Strategy,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredFact>> {
        match strategy {
            // Strict semantic: inside hybrid a provider failure excludes
            // the constituent instead of silently substituting keyword
            Strategy::Semantic => self.semantic_scores(user_id, query).await,
            Strategy::Keyword => self.keyword_search(user_id, query).await,
            Strategy::Categorical => self.categorical_search(user_id, query, filters).await,
            Strategy::Temporal => self.temporal_search(user_id, query, filters).await,
            Strategy::Graph => self.graph_search(user_id, query).await,
            Strategy::Hybrid => Ok(Vec::new()), // filtered out above
        }
    }
}

/// Min-max normalize each result set, then sum weighted scores per fact
///
/// Weights are renormalized over the sets actually present, so a dropped
/// constituent cannot push combined scores out of [0, 1].
pub(crate) fn combine_weighted(sets: Vec<(f64, Vec<ScoredFact>)>) -> Vec<ScoredFact> {
    let total_weight: f64 = sets.iter().map(|(w, _)| w).sum();
    if total_weight <= 0.0 {
        return Vec::new();
    }

    let mut combined: HashMap<FactId, ScoredFact> = HashMap::new();
    for (weight, results) in sets {
        let weight = weight / total_weight;
        let (min, max) = results.iter().fold((f64::MAX, f64::MIN), |(lo, hi), r| {
            (lo.min(r.score), hi.max(r.score))
        });

        for result in results {
            let normalized = if max > min {
                (result.score - min) / (max - min)
            } else {
                1.0
            };
            combined
                .entry(result.fact.id)
                .and_modify(|e| e.score += weight * normalized)
                .or_insert(ScoredFact {
                    fact: result.fact,
                    score: weight * normalized,
                });
        }
    }
    combined.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::{CategoryPath, Fact};
    use proptest::prelude::*;

    fn scored(fact: &Fact, score: f64) -> ScoredFact {
        ScoredFact {
            fact: fact.clone(),
            score,
        }
    }

    #[test]
    fn test_combine_sums_weighted_scores() {
        let a = Fact::new("u", "a", CategoryPath::default(), 0.8);
        let b = Fact::new("u", "b", CategoryPath::default(), 0.8);

        let combined = combine_weighted(vec![
            (0.7, vec![scored(&a, 1.0), scored(&b, 0.0)]),
            (0.3, vec![scored(&a, 1.0)]),
        ]);

        let score_of = |id| {
            combined
                .iter()
                .find(|r| r.fact.id == id)
                .map(|r| r.score)
                .unwrap()
        };
        // a tops both sets: full weight from each
        assert!((score_of(a.id) - 1.0).abs() < 1e-9);
        assert!((score_of(b.id) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_result_set_normalizes_to_one() {
        let a = Fact::new("u", "a", CategoryPath::default(), 0.8);
        let combined = combine_weighted(vec![(1.0, vec![scored(&a, 0.42)])]);
        assert!((combined[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_yields_nothing() {
        let a = Fact::new("u", "a", CategoryPath::default(), 0.8);
        assert!(combine_weighted(vec![(0.0, vec![scored(&a, 1.0)])]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_combined_scores_stay_in_unit_interval(
            scores_a in prop::collection::vec(0.0f64..=1.0, 0..8),
            scores_b in prop::collection::vec(0.0f64..=1.0, 0..8),
            weight_a in 0.01f64..=1.0,
            weight_b in 0.01f64..=1.0,
        ) {
            let set_a: Vec<ScoredFact> = scores_a
                .iter()
                .map(|s| scored(&Fact::new("u", "x", CategoryPath::default(), 0.5), *s))
                .collect();
            let set_b: Vec<ScoredFact> = scores_b
                .iter()
                .map(|s| scored(&Fact::new("u", "x", CategoryPath::default(), 0.5), *s))
                .collect();

            let combined = combine_weighted(vec![(weight_a, set_a), (weight_b, set_b)]);
            for result in combined {
                prop_assert!(result.score >= 0.0);
                prop_assert!(result.score <= 1.0 + 1e-9);
            }
        }
    }
}
