//! Key layout for the RocksDB-backed stores
//!
//! All record keys are scoped to a user with a length-prefixed user id so a
//! prefix iterator scans exactly one user's key space. Fact keys embed the
//! creation timestamp (big-endian) for time-ordered iteration. Unique-key
//! indexes (entity name, link triple) store an 8-byte xxh3 of the normalized
//! key material.

use mnemos_core::{EntityId, FactId, LinkId, LinkType};
use xxhash_rust::xxh3::xxh3_64;

/// Key prefixes, one per column-family record kind
pub mod prefix {
    pub const FACT: u8 = 0x01;
    pub const FACT_INDEX: u8 = 0x02;
    pub const ENTITY: u8 = 0x03;
    pub const ENTITY_NAME: u8 = 0x04;
    pub const LINK: u8 = 0x05;
    pub const LINK_UNIQUE: u8 = 0x06;
}

/// Prefix byte + length-prefixed user id
fn user_scoped(p: u8, user_id: &str) -> Vec<u8> {
    let user = user_id.as_bytes();
    let mut key = Vec::with_capacity(1 + 2 + user.len());
    key.push(p);
    key.extend_from_slice(&(user.len() as u16).to_be_bytes());
    key.extend_from_slice(user);
    key
}

/// Fact record key: user + created_at millis + fact uuid
pub fn fact_key(user_id: &str, created_at_millis: i64, id: FactId) -> Vec<u8> {
    let mut key = user_scoped(prefix::FACT, user_id);
    key.extend_from_slice(&created_at_millis.to_be_bytes());
    key.extend_from_slice(id.as_uuid().as_bytes());
    key
}

/// Prefix for scanning all facts of a user, time-ordered
pub fn fact_prefix(user_id: &str) -> Vec<u8> {
    user_scoped(prefix::FACT, user_id)
}

/// Fact lookup index key: fact uuid -> created_at millis
pub fn fact_index_key(id: FactId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 16);
    key.push(prefix::FACT_INDEX);
    key.extend_from_slice(id.as_uuid().as_bytes());
    key
}

/// Entity record key: user + entity uuid
pub fn entity_key(user_id: &str, id: EntityId) -> Vec<u8> {
    let mut key = user_scoped(prefix::ENTITY, user_id);
    key.extend_from_slice(id.as_uuid().as_bytes());
    key
}

/// Prefix for scanning all entities of a user
pub fn entity_prefix(user_id: &str) -> Vec<u8> {
    user_scoped(prefix::ENTITY, user_id)
}

/// Unique entity name index key: user + xxh3(lower(name) | lower(type))
pub fn entity_name_key(user_id: &str, name: &str, entity_type: &str) -> Vec<u8> {
    let material = format!(
        "{}|{}",
        name.trim().to_lowercase(),
        entity_type.trim().to_lowercase()
    );
    let mut key = user_scoped(prefix::ENTITY_NAME, user_id);
    key.extend_from_slice(&xxh3_64(material.as_bytes()).to_be_bytes());
    key
}

/// Link record key: user + link uuid
pub fn link_key(user_id: &str, id: LinkId) -> Vec<u8> {
    let mut key = user_scoped(prefix::LINK, user_id);
    key.extend_from_slice(id.as_uuid().as_bytes());
    key
}

/// Prefix for scanning all links of a user
pub fn link_prefix(user_id: &str) -> Vec<u8> {
    user_scoped(prefix::LINK, user_id)
}

/// Unique link triple index key: user + xxh3(source | target | type)
pub fn link_unique_key(
    user_id: &str,
    source: EntityId,
    target: EntityId,
    link_type: LinkType,
) -> Vec<u8> {
    let mut material = Vec::with_capacity(16 + 16 + 16);
    material.extend_from_slice(source.as_uuid().as_bytes());
    material.extend_from_slice(target.as_uuid().as_bytes());
    material.extend_from_slice(link_type.as_str().as_bytes());

    let mut key = user_scoped(prefix::LINK_UNIQUE, user_id);
    key.extend_from_slice(&xxh3_64(&material).to_be_bytes());
    key
}
