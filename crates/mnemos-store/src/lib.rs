//! Durable stores for the mnemos memory engine
//!
//! Three async store traits ([`FactStore`], [`EntityStore`], [`LinkStore`])
//! with two implementations:
//!
//! - [`RocksStore`]: RocksDB with a column family per record kind plus
//!   lookup indexes, for production
//! - [`MemoryStore`]: `RwLock<HashMap>` maps, for tests
//!
//! All mutations are scoped to a single user's key space, so cross-user
//! contention does not occur.

pub mod keys;
mod memory;
mod rocks;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemos_core::{Entity, EntityId, EntityLink, Fact, FactId, LinkId, LinkType, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the RocksDB-backed store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the storage directory
    pub path: String,

    /// Enable write-ahead logging for durability
    pub enable_wal: bool,

    /// Sync writes to disk immediately (slower but more durable)
    pub sync_writes: bool,

    /// Maximum write buffer size in bytes
    pub write_buffer_size: usize,

    /// Enable compression for stored data
    pub enable_compression: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/memory".to_string(),
            enable_wal: true,
            sync_writes: false,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            enable_compression: true,
        }
    }
}

impl StoreConfig {
    /// Create config for testing with a temporary directory
    pub fn for_testing(path: &Path) -> Self {
        Self {
            path: path.to_string_lossy().to_string(),
            enable_wal: true,
            sync_writes: false,
            write_buffer_size: 4 * 1024 * 1024, // 4MB for tests
            enable_compression: false,
        }
    }
}

/// Durable table of atomic memory facts
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Store or overwrite a fact (merge-on-dedup updates go through here)
    async fn put_fact(&self, fact: &Fact) -> Result<()>;

    /// Get a fact by ID
    async fn get_fact(&self, user_id: &str, id: FactId) -> Result<Option<Fact>>;

    /// All facts for a user
    async fn facts_for_user(&self, user_id: &str) -> Result<Vec<Fact>>;

    /// Facts created inside a time window (inclusive)
    async fn facts_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Fact>>;

    /// Facts created at or after `since` (the dedup recency window read)
    async fn facts_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Fact>> {
        self.facts_in_range(user_id, since, Utc::now()).await
    }

    /// Delete a fact; returns false if it did not exist
    async fn delete_fact(&self, user_id: &str, id: FactId) -> Result<bool>;

    /// Number of facts for a user
    async fn fact_count(&self, user_id: &str) -> Result<usize>;
}

/// Durable table of named entities
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Store or overwrite an entity
    async fn put_entity(&self, entity: &Entity) -> Result<()>;

    /// Get an entity by ID
    async fn get_entity(&self, user_id: &str, id: EntityId) -> Result<Option<Entity>>;

    /// Case-insensitive lookup by name + entity type
    async fn find_entity(
        &self,
        user_id: &str,
        name: &str,
        entity_type: &str,
    ) -> Result<Option<Entity>>;

    /// All entities for a user
    async fn entities_for_user(&self, user_id: &str) -> Result<Vec<Entity>>;

    /// Delete an entity; returns false if it did not exist
    async fn delete_entity(&self, user_id: &str, id: EntityId) -> Result<bool>;

    /// Number of entities for a user
    async fn entity_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.entities_for_user(user_id).await?.len())
    }
}

/// Durable table of directed entity links
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Store or overwrite a link
    async fn put_link(&self, link: &EntityLink) -> Result<()>;

    /// Get a link by ID
    async fn get_link(&self, user_id: &str, id: LinkId) -> Result<Option<EntityLink>>;

    /// Lookup by the unique (source, target, type) triple
    async fn find_link(
        &self,
        user_id: &str,
        source: EntityId,
        target: EntityId,
        link_type: LinkType,
    ) -> Result<Option<EntityLink>>;

    /// All links for a user
    async fn links_for_user(&self, user_id: &str) -> Result<Vec<EntityLink>>;

    /// Links where the entity is source or target
    async fn links_touching(&self, user_id: &str, entity: EntityId) -> Result<Vec<EntityLink>> {
        Ok(self
            .links_for_user(user_id)
            .await?
            .into_iter()
            .filter(|l| l.source_entity_id == entity || l.target_entity_id == entity)
            .collect())
    }

    /// Links whose extraction originated from the given fact
    async fn links_originating_from(
        &self,
        user_id: &str,
        fact_id: FactId,
    ) -> Result<Vec<EntityLink>> {
        Ok(self
            .links_for_user(user_id)
            .await?
            .into_iter()
            .filter(|l| l.originating_fact_id == fact_id)
            .collect())
    }

    /// Delete a link; returns false if it did not exist
    async fn delete_link(&self, user_id: &str, id: LinkId) -> Result<bool>;

    /// Number of links for a user
    async fn link_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.links_for_user(user_id).await?.len())
    }
}

/// Convenience super-trait for types that implement all three stores
pub trait MemoryBackend: FactStore + EntityStore + LinkStore {}

impl<T: FactStore + EntityStore + LinkStore> MemoryBackend for T {}
