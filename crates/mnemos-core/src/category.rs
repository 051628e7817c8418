//! Category hierarchy for memory facts
//!
//! Every fact is tagged with a 4-level path: domain / topic / entity type /
//! detail. The domain level is a closed nine-value enumeration; lower levels
//! are free-form strings. Unknown domains are coerced to [`Domain::Personal`]
//! at construction so an invalid value is never persisted verbatim.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The fixed top-level domain of a category path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Default bucket for anything that fits nowhere else
    Personal,
    /// Likes, dislikes, tastes and habits
    Preferences,
    /// People the user knows and how they relate
    Relationships,
    /// Job, projects, professional life
    Work,
    /// Physical and mental health
    Health,
    /// Hobbies, sports, things the user does
    Activities,
    /// Locations the user mentions
    Places,
    /// Skills and things the user knows
    Knowledge,
    /// Plans, ambitions, things the user wants
    Goals,
}

impl Domain {
    /// All nine domains, in canonical order
    pub const ALL: [Domain; 9] = [
        Domain::Personal,
        Domain::Preferences,
        Domain::Relationships,
        Domain::Work,
        Domain::Health,
        Domain::Activities,
        Domain::Places,
        Domain::Knowledge,
        Domain::Goals,
    ];

    /// Canonical string form of this domain
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Personal => "personal",
            Domain::Preferences => "preferences",
            Domain::Relationships => "relationships",
            Domain::Work => "work",
            Domain::Health => "health",
            Domain::Activities => "activities",
            Domain::Places => "places",
            Domain::Knowledge => "knowledge",
            Domain::Goals => "goals",
        }
    }

    /// Parse a domain string; returns None for values outside the closed set
    pub fn parse(s: &str) -> Option<Domain> {
        let s = s.trim().to_lowercase();
        Domain::ALL.iter().copied().find(|d| d.as_str() == s)
    }

    /// Parse a domain string, coercing unknown values to `Personal`
    ///
    /// The boolean is true when coercion happened, so callers can flag the
    /// record (ingestion caps confidence on coerced candidates).
    pub fn coerce(s: &str) -> (Domain, bool) {
        match Domain::parse(s) {
            Some(domain) => (domain, false),
            None => (Domain::Personal, true),
        }
    }
}

impl Default for Domain {
    fn default() -> Self {
        Domain::Personal
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The 4-level classification assigned to every fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryPath {
    /// Top-level domain, drawn from the closed enumeration
    pub domain: Domain,

    /// Topic within the domain (e.g. "food")
    pub topic: String,

    /// Entity type the fact is about (e.g. "cuisine")
    pub entity_type: String,

    /// Finest-grained detail label (e.g. "favorite")
    pub detail: String,
}

impl CategoryPath {
    /// Create a category path
    pub fn new(domain: Domain, topic: &str, entity_type: &str, detail: &str) -> Self {
        Self {
            domain,
            topic: topic.trim().to_lowercase(),
            entity_type: entity_type.trim().to_lowercase(),
            detail: detail.trim().to_lowercase(),
        }
    }

    /// A bare path in the given domain with empty lower levels
    pub fn domain_only(domain: Domain) -> Self {
        Self::new(domain, "", "", "")
    }

    /// The four levels in order, omitting empty ones
    pub fn levels(&self) -> Vec<&str> {
        [
            self.domain.as_str(),
            self.topic.as_str(),
            self.entity_type.as_str(),
            self.detail.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
    }

    /// ANY semantics: true if at least one query term matches a level
    pub fn intersects(&self, terms: &[String]) -> bool {
        terms
            .iter()
            .any(|t| self.levels().contains(&t.to_lowercase().as_str()))
    }

    /// ALL semantics: true if every query term matches some level
    pub fn contains_all(&self, terms: &[String]) -> bool {
        !terms.is_empty()
            && terms
                .iter()
                .all(|t| self.levels().contains(&t.to_lowercase().as_str()))
    }
}

impl Default for CategoryPath {
    fn default() -> Self {
        Self::domain_only(Domain::Personal)
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.domain, self.topic, self.entity_type, self.detail
        )
    }
}

/// Static reference data: the domain set plus registered topic vocabulary
///
/// Read-only at query time. Topics are extended only through the explicit
/// [`CategoryHierarchy::register_topic`] administrative operation, never by
/// ingestion guessing a new value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryHierarchy {
    topics: BTreeMap<Domain, BTreeSet<String>>,
}

impl CategoryHierarchy {
    /// Create an empty hierarchy (the nine domains need no registration)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hierarchy seeded with a small default topic vocabulary
    pub fn with_defaults() -> Self {
        let mut h = Self::new();
        for (domain, topics) in [
            (Domain::Preferences, &["food", "music", "entertainment"][..]),
            (Domain::Relationships, &["family", "friends", "partner"][..]),
            (Domain::Work, &["projects", "career", "tools"][..]),
            (Domain::Activities, &["sports", "travel", "hobbies"][..]),
            (Domain::Knowledge, &["languages", "programming"][..]),
        ] {
            for topic in topics {
                h.register_topic(domain, topic);
            }
        }
        h
    }

    /// Administrative operation: register a topic under a domain
    ///
    /// Returns false if the topic was already registered.
    pub fn register_topic(&mut self, domain: Domain, topic: &str) -> bool {
        self.topics
            .entry(domain)
            .or_default()
            .insert(topic.trim().to_lowercase())
    }

    /// Registered topics for a domain
    pub fn topics(&self, domain: Domain) -> Vec<&str> {
        self.topics
            .get(&domain)
            .map(|set| set.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// True if the topic is registered under the domain
    pub fn has_topic(&self, domain: Domain, topic: &str) -> bool {
        self.topics
            .get(&domain)
            .map(|set| set.contains(&topic.trim().to_lowercase()))
            .unwrap_or(false)
    }

    /// All known category vocabulary (domain names plus registered topics),
    /// used by categorical search to spot category-like query terms
    pub fn vocabulary(&self) -> Vec<String> {
        let mut terms: Vec<String> = Domain::ALL.iter().map(|d| d.as_str().to_string()).collect();
        for set in self.topics.values() {
            terms.extend(set.iter().cloned());
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_closed_set() {
        assert_eq!(Domain::ALL.len(), 9);
        for domain in Domain::ALL {
            assert_eq!(Domain::parse(domain.as_str()), Some(domain));
        }
    }

    #[test]
    fn test_domain_coercion() {
        let (domain, coerced) = Domain::coerce("shopping_sprees");
        assert_eq!(domain, Domain::Personal);
        assert!(coerced);

        let (domain, coerced) = Domain::coerce(" Work ");
        assert_eq!(domain, Domain::Work);
        assert!(!coerced);
    }

    #[test]
    fn test_category_path_matching() {
        let path = CategoryPath::new(Domain::Preferences, "food", "cuisine", "favorite");

        assert!(path.intersects(&["food".to_string(), "music".to_string()]));
        assert!(!path.intersects(&["music".to_string()]));

        assert!(path.contains_all(&["preferences".to_string(), "food".to_string()]));
        assert!(!path.contains_all(&["food".to_string(), "music".to_string()]));
        assert!(!path.contains_all(&[]));
    }

    #[test]
    fn test_category_path_display() {
        let path = CategoryPath::new(Domain::Work, "projects", "repo", "");
        assert_eq!(path.to_string(), "work/projects/repo/");
    }

    #[test]
    fn test_register_topic() {
        let mut hierarchy = CategoryHierarchy::new();

        assert!(hierarchy.register_topic(Domain::Preferences, "Food"));
        assert!(!hierarchy.register_topic(Domain::Preferences, "food"));
        assert!(hierarchy.has_topic(Domain::Preferences, "food"));
        assert!(!hierarchy.has_topic(Domain::Work, "food"));
    }

    #[test]
    fn test_vocabulary_includes_domains() {
        let hierarchy = CategoryHierarchy::with_defaults();
        let vocab = hierarchy.vocabulary();

        assert!(vocab.contains(&"preferences".to_string()));
        assert!(vocab.contains(&"food".to_string()));
    }
}
