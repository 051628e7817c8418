//! Entity link graph: resolve-or-create, idempotent links, BFS traversal

use crate::Stores;
use mnemos_core::{Entity, EntityId, EntityLink, Error, FactId, LinkType, Result};
use mnemos_store::{EntityStore, FactStore, LinkStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Tunables for link creation and traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Strength assigned to a newly created link
    pub initial_link_strength: f64,

    /// Strength added on each repeated observation of a link
    pub link_reinforce_increment: f64,

    /// Hard ceiling on traversal depth
    pub max_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            initial_link_strength: 0.5,
            link_reinforce_increment: 0.1,
            max_depth: 3,
        }
    }
}

/// An entity reached by a traversal, with how it was reached
#[derive(Debug, Clone)]
pub struct TraversedEntity {
    pub entity: Entity,
    /// Hops from the root; the root itself is depth 0
    pub depth: usize,
    /// Entity names from the root to this entity, inclusive
    pub path: Vec<String>,
}

/// One BFS expansion step; root steps carry no link
#[derive(Debug, Clone)]
pub(crate) struct TraversalStep {
    pub entity: Entity,
    pub via_link: Option<EntityLink>,
    pub depth: usize,
    pub path: Vec<String>,
}

/// Operations on the per-user entity link graph
#[derive(Clone)]
pub struct EntityGraph {
    stores: Stores,
    config: GraphConfig,
}

impl EntityGraph {
    pub fn new(stores: Stores, config: GraphConfig) -> Self {
        Self { stores, config }
    }

    /// Find the entity by its case-insensitive (name, type) key, creating
    /// it when absent
    pub async fn resolve_or_create_entity(
        &self,
        user_id: &str,
        name: &str,
        entity_type: &str,
    ) -> Result<Entity> {
        if let Some(existing) = self
            .stores
            .entities
            .find_entity(user_id, name, entity_type)
            .await?
        {
            return Ok(existing);
        }

        let entity = Entity::new(user_id, name, entity_type);
        self.stores.entities.put_entity(&entity).await?;
        info!(user_id, name, entity_type, "created entity");
        Ok(entity)
    }

    /// Case-insensitive name lookup across all entity types
    ///
    /// Used to resolve traversal roots, where the caller knows a name but
    /// not a type.
    pub async fn find_entity_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Entity>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .stores
            .entities
            .entities_for_user(user_id)
            .await?
            .into_iter()
            .find(|e| e.name.to_lowercase() == wanted))
    }

    /// Create the (source, target, type) link, or reinforce it if it
    /// already exists; repeated evidence never weakens a link
    pub async fn create_or_reinforce_link(
        &self,
        user_id: &str,
        source: EntityId,
        target: EntityId,
        link_type: LinkType,
        bidirectional: bool,
        originating_fact: FactId,
    ) -> Result<EntityLink> {
        if let Some(mut link) = self
            .stores
            .links
            .find_link(user_id, source, target, link_type)
            .await?
        {
            link.reinforce(self.config.link_reinforce_increment);
            self.stores.links.put_link(&link).await?;
            debug!(user_id, link_type = %link_type, strength = link.strength, "reinforced link");
            return Ok(link);
        }

        let mut link = EntityLink::new(
            user_id,
            source,
            target,
            link_type,
            self.config.initial_link_strength,
            originating_fact,
        );
        if bidirectional {
            link = link.bidirectional();
        }
        self.stores.links.put_link(&link).await?;
        debug!(user_id, link_type = %link_type, "created link");
        Ok(link)
    }

    /// Level-order traversal from a named root entity
    ///
    /// Depth is capped by the config ceiling. Direction is honored: a
    /// non-bidirectional link is only followed source to target. Every
    /// link followed gets its access stats bumped.
    pub async fn traverse(
        &self,
        user_id: &str,
        root_name: &str,
        max_depth: usize,
        link_filter: Option<LinkType>,
    ) -> Result<Vec<TraversedEntity>> {
        let root = self
            .find_entity_by_name(user_id, root_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("entity {root_name}")))?;

        let steps = self.bfs(user_id, &root, max_depth, link_filter).await?;
        Ok(steps
            .into_iter()
            .map(|s| TraversedEntity {
                entity: s.entity,
                depth: s.depth,
                path: s.path,
            })
            .collect())
    }

    /// BFS expansion shared by [`EntityGraph::traverse`] and graph search
    pub(crate) async fn bfs(
        &self,
        user_id: &str,
        root: &Entity,
        max_depth: usize,
        link_filter: Option<LinkType>,
    ) -> Result<Vec<TraversalStep>> {
        let max_depth = max_depth.min(self.config.max_depth);
        let links = self.stores.links.links_for_user(user_id).await?;

        let mut visited: HashSet<EntityId> = HashSet::from([root.id]);
        let mut queue: VecDeque<(EntityId, usize, Vec<String>)> =
            VecDeque::from([(root.id, 0, vec![root.name.clone()])]);
        let mut steps = vec![TraversalStep {
            entity: root.clone(),
            via_link: None,
            depth: 0,
            path: vec![root.name.clone()],
        }];
        let mut followed: Vec<EntityLink> = Vec::new();

        while let Some((current, depth, path)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for link in &links {
                if let Some(filter) = link_filter {
                    if link.link_type != filter {
                        continue;
                    }
                }
                let Some(neighbor) = link.neighbor_of(current) else {
                    continue;
                };
                if !visited.insert(neighbor) {
                    continue;
                }

                let Some(entity) = self.stores.entities.get_entity(user_id, neighbor).await?
                else {
                    // Dangling link endpoint; skip rather than fail the walk
                    warn!(user_id, link_id = %link.id, "link points at missing entity");
                    continue;
                };

                let mut next_path = path.clone();
                next_path.push(entity.name.clone());
                queue.push_back((neighbor, depth + 1, next_path.clone()));
                steps.push(TraversalStep {
                    entity,
                    via_link: Some(link.clone()),
                    depth: depth + 1,
                    path: next_path,
                });
                followed.push(link.clone());
            }
        }

        // Persist access stats for every link the walk passed through
        for mut link in followed {
            link.record_access();
            self.stores.links.put_link(&link).await?;
        }

        Ok(steps)
    }

    /// Delete an entity and every link touching it
    ///
    /// Links whose originating fact still exists are logged before removal;
    /// the fact itself stays.
    pub async fn delete_entity(&self, user_id: &str, id: EntityId) -> Result<bool> {
        let touching = self.stores.links.links_touching(user_id, id).await?;
        for link in touching {
            if self
                .stores
                .facts
                .get_fact(user_id, link.originating_fact_id)
                .await?
                .is_some()
            {
                warn!(
                    user_id,
                    link_id = %link.id,
                    fact_id = %link.originating_fact_id,
                    "cascading link delete, originating fact survives"
                );
            }
            self.stores.links.delete_link(user_id, link.id).await?;
        }
        self.stores.entities.delete_entity(user_id, id).await
    }

    /// Delete a fact and the links its extraction produced
    ///
    /// Entities stay: they may be supported by other facts.
    pub async fn delete_fact(&self, user_id: &str, id: FactId) -> Result<bool> {
        let removed = self.stores.facts.delete_fact(user_id, id).await?;
        if !removed {
            return Ok(false);
        }

        for link in self.stores.links.links_originating_from(user_id, id).await? {
            self.stores.links.delete_link(user_id, link.id).await?;
            debug!(user_id, link_id = %link.id, "deleted link with its originating fact");
        }
        Ok(true)
    }
}
