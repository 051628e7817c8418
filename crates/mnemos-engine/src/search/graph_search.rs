//! Graph search: facts reached by walking entity links from a query root

use super::{ScoredFact, SearchEngine};
use mnemos_core::{Entity, Result};
use mnemos_store::{EntityStore, FactStore, LinkStore};
use std::collections::HashSet;
use tracing::debug;

impl SearchEngine {
    /// Walk the link graph outward from an entity the query names and
    /// surface the facts behind the links, scores decaying per hop
    ///
    /// Root resolution: the longest entity name appearing in the query. If
    /// no entity matches, the best keyword hit stands in; a hit with no
    /// links is returned as-is so the caller still gets the direct answer.
    pub(crate) async fn graph_search(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredFact>> {
        let root = match self.resolve_root(user_id, query).await? {
            RootResolution::Entity(entity) => entity,
            RootResolution::FactOnly(hit) => return Ok(vec![hit]),
            RootResolution::Nothing => return Ok(Vec::new()),
        };
        debug!(user_id, root = %root.name, "graph search root resolved");

        let steps = self
            .graph
            .bfs(user_id, &root, self.config.graph_max_depth, None)
            .await?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for step in steps {
            let Some(link) = step.via_link else {
                continue;
            };
            if !seen.insert(link.originating_fact_id) {
                continue;
            }
            let Some(fact) = self
                .stores
                .facts
                .get_fact(user_id, link.originating_fact_id)
                .await?
            else {
                continue;
            };
            results.push(ScoredFact {
                fact,
                // BFS visits shallow entities first, so the first score a
                // fact gets is its highest
                score: self.config.graph_decay.powi(step.depth as i32),
            });
        }
        Ok(results)
    }

    async fn resolve_root(&self, user_id: &str, query: &str) -> Result<RootResolution> {
        let lower = query.to_lowercase();
        let entities = self.stores.entities.entities_for_user(user_id).await?;
        let named = entities
            .into_iter()
            .filter(|e| !e.name.is_empty() && lower.contains(&e.name.to_lowercase()))
            .max_by_key(|e| e.name.len());
        if let Some(entity) = named {
            return Ok(RootResolution::Entity(entity));
        }

        // No entity in the query; anchor on the best keyword hit instead
        let hits = self.keyword_search(user_id, query).await?;
        let Some(top) = hits.into_iter().next() else {
            return Ok(RootResolution::Nothing);
        };
        let links = self
            .stores
            .links
            .links_originating_from(user_id, top.fact.id)
            .await?;
        let Some(link) = links.first() else {
            return Ok(RootResolution::FactOnly(top));
        };
        match self
            .stores
            .entities
            .get_entity(user_id, link.source_entity_id)
            .await?
        {
            Some(entity) => Ok(RootResolution::Entity(entity)),
            None => Ok(RootResolution::FactOnly(top)),
        }
    }
}

enum RootResolution {
    Entity(Entity),
    FactOnly(ScoredFact),
    Nothing,
}
