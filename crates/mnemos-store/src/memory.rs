//! In-memory implementation of the three stores, for tests

use crate::{EntityStore, FactStore, LinkStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemos_core::{Entity, EntityId, EntityLink, Fact, FactId, LinkId, LinkType, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

type PerUser<K, V> = RwLock<HashMap<String, HashMap<K, V>>>;

/// In-memory store backed by per-user hash maps
#[derive(Default)]
pub struct MemoryStore {
    facts: PerUser<FactId, Fact>,
    entities: PerUser<EntityId, Entity>,
    links: PerUser<LinkId, EntityLink>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn put_fact(&self, fact: &Fact) -> Result<()> {
        let mut facts = self.facts.write().await;
        facts
            .entry(fact.user_id.clone())
            .or_default()
            .insert(fact.id, fact.clone());
        Ok(())
    }

    async fn get_fact(&self, user_id: &str, id: FactId) -> Result<Option<Fact>> {
        let facts = self.facts.read().await;
        Ok(facts.get(user_id).and_then(|m| m.get(&id)).cloned())
    }

    async fn facts_for_user(&self, user_id: &str) -> Result<Vec<Fact>> {
        let facts = self.facts.read().await;
        let mut result: Vec<Fact> = facts
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        // Match the rocks store's time-ordered scans
        result.sort_by_key(|f| f.created_at);
        Ok(result)
    }

    async fn facts_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Fact>> {
        Ok(self
            .facts_for_user(user_id)
            .await?
            .into_iter()
            .filter(|f| f.created_at >= start && f.created_at <= end)
            .collect())
    }

    async fn delete_fact(&self, user_id: &str, id: FactId) -> Result<bool> {
        let mut facts = self.facts.write().await;
        Ok(facts
            .get_mut(user_id)
            .map(|m| m.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn fact_count(&self, user_id: &str) -> Result<usize> {
        let facts = self.facts.read().await;
        Ok(facts.get(user_id).map(|m| m.len()).unwrap_or(0))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        let mut entities = self.entities.write().await;
        entities
            .entry(entity.user_id.clone())
            .or_default()
            .insert(entity.id, entity.clone());
        Ok(())
    }

    async fn get_entity(&self, user_id: &str, id: EntityId) -> Result<Option<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities.get(user_id).and_then(|m| m.get(&id)).cloned())
    }

    async fn find_entity(
        &self,
        user_id: &str,
        name: &str,
        entity_type: &str,
    ) -> Result<Option<Entity>> {
        let wanted = (name.trim().to_lowercase(), entity_type.trim().to_lowercase());
        let entities = self.entities.read().await;
        Ok(entities
            .get(user_id)
            .and_then(|m| m.values().find(|e| e.dedup_key() == wanted))
            .cloned())
    }

    async fn entities_for_user(&self, user_id: &str) -> Result<Vec<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_entity(&self, user_id: &str, id: EntityId) -> Result<bool> {
        let mut entities = self.entities.write().await;
        Ok(entities
            .get_mut(user_id)
            .map(|m| m.remove(&id).is_some())
            .unwrap_or(false))
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn put_link(&self, link: &EntityLink) -> Result<()> {
        let mut links = self.links.write().await;
        links
            .entry(link.user_id.clone())
            .or_default()
            .insert(link.id, link.clone());
        Ok(())
    }

    async fn get_link(&self, user_id: &str, id: LinkId) -> Result<Option<EntityLink>> {
        let links = self.links.read().await;
        Ok(links.get(user_id).and_then(|m| m.get(&id)).cloned())
    }

    async fn find_link(
        &self,
        user_id: &str,
        source: EntityId,
        target: EntityId,
        link_type: LinkType,
    ) -> Result<Option<EntityLink>> {
        let links = self.links.read().await;
        Ok(links
            .get(user_id)
            .and_then(|m| {
                m.values().find(|l| {
                    l.source_entity_id == source
                        && l.target_entity_id == target
                        && l.link_type == link_type
                })
            })
            .cloned())
    }

    async fn links_for_user(&self, user_id: &str) -> Result<Vec<EntityLink>> {
        let links = self.links.read().await;
        Ok(links
            .get(user_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_link(&self, user_id: &str, id: LinkId) -> Result<bool> {
        let mut links = self.links.write().await;
        Ok(links
            .get_mut(user_id)
            .map(|m| m.remove(&id).is_some())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::{CategoryPath, Domain};

    #[tokio::test]
    async fn test_fact_round_trip() {
        let store = MemoryStore::new();
        let fact = Fact::new("user-1", "x", CategoryPath::default(), 0.5);

        store.put_fact(&fact).await.unwrap();
        let retrieved = store.get_fact("user-1", fact.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, fact.id);
    }

    #[tokio::test]
    async fn test_find_entity_is_case_insensitive() {
        let store = MemoryStore::new();
        let entity = Entity::new("user-1", "Jack", "person");
        store.put_entity(&entity).await.unwrap();

        let found = store
            .find_entity("user-1", "jack", "PERSON")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, entity.id);
    }

    #[tokio::test]
    async fn test_links_touching_includes_both_ends() {
        let store = MemoryStore::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();

        store
            .put_link(&EntityLink::new("u", a, b, LinkType::Knows, 0.5, FactId::new()))
            .await
            .unwrap();
        store
            .put_link(&EntityLink::new("u", c, a, LinkType::Knows, 0.5, FactId::new()))
            .await
            .unwrap();
        store
            .put_link(&EntityLink::new("u", b, c, LinkType::Knows, 0.5, FactId::new()))
            .await
            .unwrap();

        let touching = store.links_touching("u", a).await.unwrap();
        assert_eq!(touching.len(), 2);
    }

    #[tokio::test]
    async fn test_facts_sorted_by_creation() {
        let store = MemoryStore::new();
        let mut first = Fact::new("u", "first", CategoryPath::default(), 0.5);
        first.created_at = Utc::now() - chrono::Duration::hours(2);
        let second = Fact::new("u", "second", CategoryPath::default(), 0.5);

        store.put_fact(&second).await.unwrap();
        store.put_fact(&first).await.unwrap();

        let facts = store.facts_for_user("u").await.unwrap();
        assert_eq!(facts[0].content, "first");
        assert_eq!(facts[1].content, "second");
    }
}
