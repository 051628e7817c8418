//! RocksDB-backed implementation of the three stores

use crate::keys;
use crate::{EntityStore, FactStore, LinkStore, StoreConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mnemos_core::{Entity, EntityId, EntityLink, Error, Fact, FactId, LinkId, LinkType, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Column family names
mod cf {
    pub const FACTS: &str = "facts";
    pub const FACT_INDEX: &str = "fact_index";
    pub const ENTITIES: &str = "entities";
    pub const ENTITY_NAME_INDEX: &str = "entity_name_index";
    pub const LINKS: &str = "links";
    pub const LINK_UNIQUE_INDEX: &str = "link_unique_index";
}

const ALL_CFS: [&str; 6] = [
    cf::FACTS,
    cf::FACT_INDEX,
    cf::ENTITIES,
    cf::ENTITY_NAME_INDEX,
    cf::LINKS,
    cf::LINK_UNIQUE_INDEX,
];

/// One RocksDB holding facts, entities and links in separate column families
pub struct RocksStore {
    db: Arc<rocksdb::DB>,
    config: StoreConfig,
}

impl RocksStore {
    /// Open or create the store at the configured path
    pub fn open(config: StoreConfig) -> Result<Self> {
        info!("Opening memory store at {}", config.path);

        let mut db_opts = rocksdb::Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.write_buffer_size);

        if config.enable_wal {
            db_opts.set_wal_dir(&config.path);
        } else {
            db_opts.set_manual_wal_flush(true);
        }

        if config.enable_compression {
            db_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        }

        let cf_descriptors: Vec<rocksdb::ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| {
                let mut cf_opts = rocksdb::Options::default();
                if config.enable_compression {
                    cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                }
                rocksdb::ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = rocksdb::DB::open_cf_descriptors(&db_opts, &config.path, cf_descriptors)
            .map_err(|e| Error::Storage(format!("Failed to open memory store: {}", e)))?;

        info!("Memory store opened");

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::Storage(format!("Failed to flush: {}", e)))?;
        debug!("Memory store flushed");
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Internal(format!("Column family not found: {}", name)))
    }

    fn encode<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| Error::Serialization(format!("Failed to serialize {}: {}", what, e)))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::Deserialization(format!("Failed to deserialize {}: {}", what, e)))
    }

    fn write(&self, batch: rocksdb::WriteBatch, what: &str) -> Result<()> {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", what, e)))
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8], what: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();

        for item in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, value) = item.map_err(|e| Error::Storage(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push(Self::decode(&value, what)?);
        }

        Ok(records)
    }

    fn uuid_from_index(value: &[u8], what: &str) -> Result<Uuid> {
        let bytes: [u8; 16] = value
            .try_into()
            .map_err(|_| Error::Internal(format!("Invalid {} index value", what)))?;
        Ok(Uuid::from_bytes(bytes))
    }
}

#[async_trait]
impl FactStore for RocksStore {
    async fn put_fact(&self, fact: &Fact) -> Result<()> {
        let facts_cf = self.cf(cf::FACTS)?;
        let index_cf = self.cf(cf::FACT_INDEX)?;

        let value = Self::encode(fact, "fact")?;
        let millis = fact.created_at.timestamp_millis();

        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(facts_cf, keys::fact_key(&fact.user_id, millis, fact.id), &value);
        batch.put_cf(index_cf, keys::fact_index_key(fact.id), millis.to_be_bytes());
        self.write(batch, "fact")?;

        debug!("Stored fact {} for user {}", fact.id, fact.user_id);
        Ok(())
    }

    async fn get_fact(&self, user_id: &str, id: FactId) -> Result<Option<Fact>> {
        let index_cf = self.cf(cf::FACT_INDEX)?;
        let facts_cf = self.cf(cf::FACTS)?;

        let millis = match self
            .db
            .get_cf(index_cf, keys::fact_index_key(id))
            .map_err(|e| Error::Storage(format!("Failed to read fact index: {}", e)))?
        {
            Some(v) => {
                let bytes: [u8; 8] = v
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Internal("Invalid fact index value".to_string()))?;
                i64::from_be_bytes(bytes)
            }
            None => return Ok(None),
        };

        match self
            .db
            .get_cf(facts_cf, keys::fact_key(user_id, millis, id))
            .map_err(|e| Error::Storage(format!("Failed to read fact: {}", e)))?
        {
            Some(value) => Ok(Some(Self::decode(&value, "fact")?)),
            None => Ok(None),
        }
    }

    async fn facts_for_user(&self, user_id: &str) -> Result<Vec<Fact>> {
        self.scan(cf::FACTS, &keys::fact_prefix(user_id), "fact")
    }

    async fn facts_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Fact>> {
        let facts: Vec<Fact> = self.scan(cf::FACTS, &keys::fact_prefix(user_id), "fact")?;
        Ok(facts
            .into_iter()
            .filter(|f| f.created_at >= start && f.created_at <= end)
            .collect())
    }

    async fn delete_fact(&self, user_id: &str, id: FactId) -> Result<bool> {
        let fact = match self.get_fact(user_id, id).await? {
            Some(f) => f,
            None => return Ok(false),
        };

        let facts_cf = self.cf(cf::FACTS)?;
        let index_cf = self.cf(cf::FACT_INDEX)?;

        let millis = fact.created_at.timestamp_millis();
        let mut batch = rocksdb::WriteBatch::default();
        batch.delete_cf(facts_cf, keys::fact_key(user_id, millis, id));
        batch.delete_cf(index_cf, keys::fact_index_key(id));
        self.write(batch, "fact delete")?;

        debug!("Deleted fact {} for user {}", id, user_id);
        Ok(true)
    }

    async fn fact_count(&self, user_id: &str) -> Result<usize> {
        Ok(self.facts_for_user(user_id).await?.len())
    }
}

#[async_trait]
impl EntityStore for RocksStore {
    async fn put_entity(&self, entity: &Entity) -> Result<()> {
        let entities_cf = self.cf(cf::ENTITIES)?;
        let name_cf = self.cf(cf::ENTITY_NAME_INDEX)?;

        let value = Self::encode(entity, "entity")?;

        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(entities_cf, keys::entity_key(&entity.user_id, entity.id), &value);
        batch.put_cf(
            name_cf,
            keys::entity_name_key(&entity.user_id, &entity.name, &entity.entity_type),
            entity.id.as_uuid().as_bytes(),
        );
        self.write(batch, "entity")?;

        debug!("Stored entity '{}' for user {}", entity.name, entity.user_id);
        Ok(())
    }

    async fn get_entity(&self, user_id: &str, id: EntityId) -> Result<Option<Entity>> {
        let entities_cf = self.cf(cf::ENTITIES)?;
        match self
            .db
            .get_cf(entities_cf, keys::entity_key(user_id, id))
            .map_err(|e| Error::Storage(format!("Failed to read entity: {}", e)))?
        {
            Some(value) => Ok(Some(Self::decode(&value, "entity")?)),
            None => Ok(None),
        }
    }

    async fn find_entity(
        &self,
        user_id: &str,
        name: &str,
        entity_type: &str,
    ) -> Result<Option<Entity>> {
        let name_cf = self.cf(cf::ENTITY_NAME_INDEX)?;
        let id = match self
            .db
            .get_cf(name_cf, keys::entity_name_key(user_id, name, entity_type))
            .map_err(|e| Error::Storage(format!("Failed to read entity name index: {}", e)))?
        {
            Some(v) => EntityId::from_uuid(Self::uuid_from_index(&v, "entity name")?),
            None => return Ok(None),
        };

        self.get_entity(user_id, id).await
    }

    async fn entities_for_user(&self, user_id: &str) -> Result<Vec<Entity>> {
        self.scan(cf::ENTITIES, &keys::entity_prefix(user_id), "entity")
    }

    async fn delete_entity(&self, user_id: &str, id: EntityId) -> Result<bool> {
        let entity = match self.get_entity(user_id, id).await? {
            Some(e) => e,
            None => return Ok(false),
        };

        let entities_cf = self.cf(cf::ENTITIES)?;
        let name_cf = self.cf(cf::ENTITY_NAME_INDEX)?;

        let mut batch = rocksdb::WriteBatch::default();
        batch.delete_cf(entities_cf, keys::entity_key(user_id, id));
        batch.delete_cf(
            name_cf,
            keys::entity_name_key(user_id, &entity.name, &entity.entity_type),
        );
        self.write(batch, "entity delete")?;

        debug!("Deleted entity '{}' for user {}", entity.name, user_id);
        Ok(true)
    }
}

#[async_trait]
impl LinkStore for RocksStore {
    async fn put_link(&self, link: &EntityLink) -> Result<()> {
        let links_cf = self.cf(cf::LINKS)?;
        let unique_cf = self.cf(cf::LINK_UNIQUE_INDEX)?;

        let value = Self::encode(link, "link")?;

        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(links_cf, keys::link_key(&link.user_id, link.id), &value);
        batch.put_cf(
            unique_cf,
            keys::link_unique_key(
                &link.user_id,
                link.source_entity_id,
                link.target_entity_id,
                link.link_type,
            ),
            link.id.as_uuid().as_bytes(),
        );
        self.write(batch, "link")?;

        debug!("Stored link {} for user {}", link.id, link.user_id);
        Ok(())
    }

    async fn get_link(&self, user_id: &str, id: LinkId) -> Result<Option<EntityLink>> {
        let links_cf = self.cf(cf::LINKS)?;
        match self
            .db
            .get_cf(links_cf, keys::link_key(user_id, id))
            .map_err(|e| Error::Storage(format!("Failed to read link: {}", e)))?
        {
            Some(value) => Ok(Some(Self::decode(&value, "link")?)),
            None => Ok(None),
        }
    }

    async fn find_link(
        &self,
        user_id: &str,
        source: EntityId,
        target: EntityId,
        link_type: LinkType,
    ) -> Result<Option<EntityLink>> {
        let unique_cf = self.cf(cf::LINK_UNIQUE_INDEX)?;
        let id = match self
            .db
            .get_cf(unique_cf, keys::link_unique_key(user_id, source, target, link_type))
            .map_err(|e| Error::Storage(format!("Failed to read link index: {}", e)))?
        {
            Some(v) => LinkId::from_uuid(Self::uuid_from_index(&v, "link")?),
            None => return Ok(None),
        };

        self.get_link(user_id, id).await
    }

    async fn links_for_user(&self, user_id: &str) -> Result<Vec<EntityLink>> {
        self.scan(cf::LINKS, &keys::link_prefix(user_id), "link")
    }

    async fn delete_link(&self, user_id: &str, id: LinkId) -> Result<bool> {
        let link = match self.get_link(user_id, id).await? {
            Some(l) => l,
            None => return Ok(false),
        };

        let links_cf = self.cf(cf::LINKS)?;
        let unique_cf = self.cf(cf::LINK_UNIQUE_INDEX)?;

        let mut batch = rocksdb::WriteBatch::default();
        batch.delete_cf(links_cf, keys::link_key(user_id, id));
        batch.delete_cf(
            unique_cf,
            keys::link_unique_key(
                user_id,
                link.source_entity_id,
                link.target_entity_id,
                link.link_type,
            ),
        );
        self.write(batch, "link delete")?;

        debug!("Deleted link {} for user {}", id, user_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mnemos_core::{CategoryPath, Domain};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::for_testing(temp_dir.path());
        let store = RocksStore::open(config).unwrap();
        (store, temp_dir)
    }

    fn sample_fact(user_id: &str, content: &str) -> Fact {
        Fact::new(
            user_id,
            content,
            CategoryPath::new(Domain::Preferences, "food", "cuisine", ""),
            0.8,
        )
    }

    #[tokio::test]
    async fn test_store_and_get_fact() {
        let (store, _dir) = create_test_store();

        let fact = sample_fact("user-1", "Loves Italian food");
        store.put_fact(&fact).await.unwrap();

        let retrieved = store.get_fact("user-1", fact.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, fact.id);
        assert_eq!(retrieved.content, "Loves Italian food");
        assert_eq!(retrieved.category.domain, Domain::Preferences);
    }

    #[tokio::test]
    async fn test_facts_are_user_scoped() {
        let (store, _dir) = create_test_store();

        store.put_fact(&sample_fact("alice", "A")).await.unwrap();
        store.put_fact(&sample_fact("alice", "B")).await.unwrap();
        store.put_fact(&sample_fact("bob", "C")).await.unwrap();

        assert_eq!(store.facts_for_user("alice").await.unwrap().len(), 2);
        assert_eq!(store.facts_for_user("bob").await.unwrap().len(), 1);
        assert_eq!(store.fact_count("alice").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_facts_in_range() {
        let (store, _dir) = create_test_store();

        let mut old = sample_fact("user-1", "old");
        old.created_at = Utc::now() - Duration::days(3);
        store.put_fact(&old).await.unwrap();
        store.put_fact(&sample_fact("user-1", "fresh")).await.unwrap();

        let window_start = Utc::now() - Duration::hours(24);
        let recent = store.facts_since("user-1", window_start).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "fresh");
    }

    #[tokio::test]
    async fn test_delete_fact() {
        let (store, _dir) = create_test_store();

        let fact = sample_fact("user-1", "to delete");
        store.put_fact(&fact).await.unwrap();

        assert!(store.delete_fact("user-1", fact.id).await.unwrap());
        assert!(store.get_fact("user-1", fact.id).await.unwrap().is_none());
        assert!(!store.delete_fact("user-1", fact.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_entity_case_insensitive() {
        let (store, _dir) = create_test_store();

        let entity = Entity::new("user-1", "Tokyo", "place");
        store.put_entity(&entity).await.unwrap();

        let found = store
            .find_entity("user-1", "TOKYO", "Place")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, entity.id);
        assert_eq!(found.name, "Tokyo");

        assert!(store
            .find_entity("user-2", "Tokyo", "place")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_link_by_triple() {
        let (store, _dir) = create_test_store();

        let source = EntityId::new();
        let target = EntityId::new();
        let link = EntityLink::new("user-1", source, target, LinkType::Loves, 0.6, FactId::new());
        store.put_link(&link).await.unwrap();

        let found = store
            .find_link("user-1", source, target, LinkType::Loves)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, link.id);

        assert!(store
            .find_link("user-1", target, source, LinkType::Loves)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_links_originating_from_fact() {
        let (store, _dir) = create_test_store();

        let fact_id = FactId::new();
        let link = EntityLink::new(
            "user-1",
            EntityId::new(),
            EntityId::new(),
            LinkType::Knows,
            0.5,
            fact_id,
        );
        let other = EntityLink::new(
            "user-1",
            EntityId::new(),
            EntityId::new(),
            LinkType::Knows,
            0.5,
            FactId::new(),
        );
        store.put_link(&link).await.unwrap();
        store.put_link(&other).await.unwrap();

        let originating = store
            .links_originating_from("user-1", fact_id)
            .await
            .unwrap();
        assert_eq!(originating.len(), 1);
        assert_eq!(originating[0].id, link.id);
    }

    #[tokio::test]
    async fn test_facts_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let fact = sample_fact("user-1", "durable");

        {
            let store = RocksStore::open(StoreConfig::for_testing(temp_dir.path())).unwrap();
            store.put_fact(&fact).await.unwrap();
            store.flush().unwrap();
        }

        let store = RocksStore::open(StoreConfig::for_testing(temp_dir.path())).unwrap();
        let retrieved = store.get_fact("user-1", fact.id).await.unwrap().unwrap();
        assert_eq!(retrieved.content, "durable");
    }
}
