//! Named entities and the typed links between them

use crate::id::{EntityId, FactId, LinkId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named object or concept referenced by one or more facts
///
/// `(user_id, lowercase name, lowercase entity_type)` is unique per user;
/// the ingestion pipeline resolves-or-creates rather than duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,

    /// Owning user
    pub user_id: String,

    /// Display name, original casing preserved
    pub name: String,

    /// Free-form type: person, place, project, skill, ...
    pub entity_type: String,

    /// Typed attributes; multi-valued attributes live as an ordered list
    /// under one key, never as separate entities
    pub attributes: BTreeMap<String, Vec<String>>,

    /// When the entity was first mentioned
    pub created_at: DateTime<Utc>,

    /// When the entity was last touched by ingestion
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity
    pub fn new(user_id: &str, name: &str, entity_type: &str) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            entity_type: entity_type.trim().to_lowercase(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The case-insensitive uniqueness key for this entity
    pub fn dedup_key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.entity_type.clone())
    }

    /// Append a value under an attribute, skipping exact duplicates
    ///
    /// Returns true if the value was actually added.
    pub fn append_attribute(&mut self, key: &str, value: &str) -> bool {
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();
        if value.is_empty() {
            return false;
        }

        let values = self.attributes.entry(key).or_default();
        if values.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            return false;
        }
        values.push(value);
        self.updated_at = Utc::now();
        true
    }

    /// Merge another attribute map in, append-unique per key
    pub fn merge_attributes(&mut self, other: &BTreeMap<String, Vec<String>>) {
        for (key, values) in other {
            for value in values {
                self.append_attribute(key, value);
            }
        }
    }

    /// Values under an attribute name
    pub fn attribute(&self, key: &str) -> &[String] {
        self.attributes
            .get(&key.trim().to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// The closed set of relationship types between entities
///
/// Strings outside the set parse to [`LinkType::RelatedTo`] so an unknown
/// value is caught at construction instead of persisted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Loves,
    Fears,
    Knows,
    Likes,
    Dislikes,
    Attended,
    Uses,
    Prefers,
    LivesIn,
    WorksAt,
    /// Fallback for relationships outside the closed set
    RelatedTo,
}

impl LinkType {
    /// Canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Loves => "loves",
            LinkType::Fears => "fears",
            LinkType::Knows => "knows",
            LinkType::Likes => "likes",
            LinkType::Dislikes => "dislikes",
            LinkType::Attended => "attended",
            LinkType::Uses => "uses",
            LinkType::Prefers => "prefers",
            LinkType::LivesIn => "lives_in",
            LinkType::WorksAt => "works_at",
            LinkType::RelatedTo => "related_to",
        }
    }

    /// Parse a relationship string, falling back to `RelatedTo`
    pub fn parse(s: &str) -> LinkType {
        match s.trim().to_lowercase().as_str() {
            "loves" => LinkType::Loves,
            "fears" => LinkType::Fears,
            "knows" => LinkType::Knows,
            "likes" => LinkType::Likes,
            "dislikes" | "hates" => LinkType::Dislikes,
            "attended" => LinkType::Attended,
            "uses" => LinkType::Uses,
            "prefers" => LinkType::Prefers,
            "lives_in" | "lives in" => LinkType::LivesIn,
            "works_at" | "works at" => LinkType::WorksAt,
            _ => LinkType::RelatedTo,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed, typed, weighted relationship between two entities
///
/// `(source, target, link_type)` is unique per user. A bidirectional link is
/// navigable both ways without a mirrored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityLink {
    /// Unique identifier
    pub id: LinkId,

    /// Owning user
    pub user_id: String,

    /// Source entity
    pub source_entity_id: EntityId,

    /// Target entity
    pub target_entity_id: EntityId,

    /// Relationship type
    pub link_type: LinkType,

    /// Evidence strength in [0, 1]; never lowered by repetition
    pub strength: f64,

    /// Whether traversal may follow this link in both directions
    pub bidirectional: bool,

    /// The fact whose extraction produced this link
    pub originating_fact_id: FactId,

    /// Times a graph traversal has passed through this link
    pub access_count: u32,

    /// Last traversal through this link
    pub last_accessed_at: DateTime<Utc>,

    /// When the link was created
    pub created_at: DateTime<Utc>,
}

impl EntityLink {
    /// Create a new link
    pub fn new(
        user_id: &str,
        source: EntityId,
        target: EntityId,
        link_type: LinkType,
        strength: f64,
        originating_fact_id: FactId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LinkId::new(),
            user_id: user_id.to_string(),
            source_entity_id: source,
            target_entity_id: target,
            link_type,
            strength: strength.clamp(0.0, 1.0),
            bidirectional: false,
            originating_fact_id,
            access_count: 0,
            last_accessed_at: now,
            created_at: now,
        }
    }

    /// Builder: mark as navigable in both directions
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Reinforce the link on repeated evidence; strength is monotone,
    /// capped at 1.0
    pub fn reinforce(&mut self, increment: f64) {
        self.strength = (self.strength + increment.max(0.0)).min(1.0);
    }

    /// Record a traversal through this link
    pub fn record_access(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = Utc::now();
    }

    /// The entity reached by following this link away from `from`,
    /// honoring direction and the bidirectional flag
    pub fn neighbor_of(&self, from: EntityId) -> Option<EntityId> {
        if self.source_entity_id == from {
            Some(self.target_entity_id)
        } else if self.bidirectional && self.target_entity_id == from {
            Some(self.source_entity_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_dedup_key_is_case_insensitive() {
        let a = Entity::new("user-1", "Tokyo", "Place");
        let b = Entity::new("user-1", "tokyo", "place");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_append_attribute_is_append_unique() {
        let mut entity = Entity::new("user-1", "Jack", "person");

        assert!(entity.append_attribute("likes", "Italian"));
        assert!(entity.append_attribute("likes", "Japanese"));
        assert!(!entity.append_attribute("likes", "italian"));
        assert_eq!(entity.attribute("likes"), &["Italian", "Japanese"]);
    }

    #[test]
    fn test_link_type_fallback() {
        assert_eq!(LinkType::parse("loves"), LinkType::Loves);
        assert_eq!(LinkType::parse("WORKS AT"), LinkType::WorksAt);
        assert_eq!(LinkType::parse("contemplates"), LinkType::RelatedTo);
    }

    #[test]
    fn test_link_reinforce_monotone() {
        let mut link = EntityLink::new(
            "user-1",
            EntityId::new(),
            EntityId::new(),
            LinkType::Loves,
            0.5,
            FactId::new(),
        );

        link.reinforce(0.3);
        assert_eq!(link.strength, 0.8);
        link.reinforce(0.3);
        assert_eq!(link.strength, 1.0);
        link.reinforce(-0.5);
        assert_eq!(link.strength, 1.0);
    }

    #[test]
    fn test_neighbor_respects_direction() {
        let source = EntityId::new();
        let target = EntityId::new();
        let link = EntityLink::new("u", source, target, LinkType::Knows, 0.5, FactId::new());

        assert_eq!(link.neighbor_of(source), Some(target));
        assert_eq!(link.neighbor_of(target), None);

        let link = link.bidirectional();
        assert_eq!(link.neighbor_of(target), Some(source));
    }

    #[test]
    fn test_record_access() {
        let mut link = EntityLink::new(
            "u",
            EntityId::new(),
            EntityId::new(),
            LinkType::Uses,
            0.5,
            FactId::new(),
        );

        link.record_access();
        link.record_access();
        assert_eq!(link.access_count, 2);
    }
}
