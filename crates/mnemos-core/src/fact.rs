//! Atomic memory facts

use crate::category::CategoryPath;
use crate::id::FactId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a fact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSource {
    /// Extracted from an ordinary conversation turn
    Conversation,
    /// Stated explicitly by the user ("remember that ...")
    Explicit,
    /// Derived from other facts
    Inferred,
}

/// An atomic unit of knowledge about a user
///
/// Facts are created by the ingestion pipeline and mutated only by
/// merge-on-dedup ([`Fact::reinforce`] / [`Fact::correct`]) or explicit
/// deletion. Search never mutates a fact. A fact without an embedding is
/// still eligible for keyword, categorical and temporal search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier
    pub id: FactId,

    /// Owning user
    pub user_id: String,

    /// The remembered statement
    pub content: String,

    /// Embedding vector, present once ingestion completes successfully
    pub embedding: Option<Vec<f32>>,

    /// 4-level classification
    pub category: CategoryPath,

    /// Attribute name for multi-value facts (e.g. "likes")
    pub attribute: Option<String>,

    /// Values under the attribute; a multi-value statement stays one fact
    pub values: Vec<String>,

    /// Confidence in [0, 1]; non-decreasing across merges
    pub confidence: f64,

    /// Provenance of the fact
    pub source: FactSource,

    /// When the fact was first stored
    pub created_at: DateTime<Utc>,

    /// When the fact was last mentioned (reinforced or corrected)
    pub last_mentioned_at: DateTime<Utc>,

    /// How many times the fact has been mentioned (>= 1)
    pub mention_count: u32,
}

impl Fact {
    /// Create a new fact; confidence is clamped to [0, 1]
    pub fn new(user_id: &str, content: &str, category: CategoryPath, confidence: f64) -> Self {
        let now = Utc::now();
        Self {
            id: FactId::new(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            embedding: None,
            category,
            attribute: None,
            values: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
            source: FactSource::Conversation,
            created_at: now,
            last_mentioned_at: now,
            mention_count: 1,
        }
    }

    /// Builder: set the source
    pub fn with_source(mut self, source: FactSource) -> Self {
        self.source = source;
        self
    }

    /// Builder: set the embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Builder: set the multi-value attribute
    pub fn with_attribute(mut self, attribute: &str, values: Vec<String>) -> Self {
        self.attribute = Some(attribute.trim().to_lowercase());
        self.values = values;
        self
    }

    /// True once an embedding has been attached
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Reinforce the fact after a repeated, non-contradicting mention
    ///
    /// Raises confidence by `increment` toward 1.0, bumps the mention count
    /// and refreshes the last-mentioned timestamp.
    pub fn reinforce(&mut self, increment: f64) {
        self.mention_count = self.mention_count.saturating_add(1);
        self.last_mentioned_at = Utc::now();
        self.confidence = (self.confidence + increment).min(1.0);
    }

    /// Apply a correction: the new statement replaces the old content
    ///
    /// Confidence becomes the max of old and new so it never decreases.
    pub fn correct(&mut self, content: &str, confidence: f64) {
        self.content = content.to_string();
        self.confidence = self.confidence.max(confidence.clamp(0.0, 1.0));
        self.mention_count = self.mention_count.saturating_add(1);
        self.last_mentioned_at = Utc::now();
    }

    /// Content plus attribute values, the text keyword search indexes
    pub fn searchable_text(&self) -> String {
        if self.values.is_empty() {
            self.content.clone()
        } else {
            format!("{} {}", self.content, self.values.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Domain;

    fn sample_fact() -> Fact {
        Fact::new(
            "user-1",
            "Loves Italian food",
            CategoryPath::new(Domain::Preferences, "food", "cuisine", "favorite"),
            0.8,
        )
    }

    #[test]
    fn test_new_fact_clamps_confidence() {
        let fact = Fact::new("user-1", "x", CategoryPath::default(), 1.7);
        assert_eq!(fact.confidence, 1.0);
        assert_eq!(fact.mention_count, 1);
    }

    #[test]
    fn test_reinforce_is_monotone_and_capped() {
        let mut fact = sample_fact();
        let mut previous = fact.confidence;

        for _ in 0..10 {
            fact.reinforce(0.1);
            assert!(fact.confidence >= previous);
            assert!(fact.confidence <= 1.0);
            previous = fact.confidence;
        }
        assert_eq!(fact.confidence, 1.0);
        assert_eq!(fact.mention_count, 11);
    }

    #[test]
    fn test_correct_overwrites_content_keeps_max_confidence() {
        let mut fact = sample_fact();
        fact.correct("Actually prefers Japanese food", 0.6);

        assert_eq!(fact.content, "Actually prefers Japanese food");
        // 0.8 old vs 0.6 new: confidence must not drop
        assert_eq!(fact.confidence, 0.8);
        assert_eq!(fact.mention_count, 2);
    }

    #[test]
    fn test_multi_value_attribute() {
        let fact = sample_fact().with_attribute("likes", vec![
            "italian".to_string(),
            "japanese".to_string(),
            "thai".to_string(),
        ]);

        assert_eq!(fact.attribute.as_deref(), Some("likes"));
        assert_eq!(fact.values.len(), 3);
        assert!(fact.searchable_text().contains("thai"));
    }

    proptest::proptest! {
        #[test]
        fn prop_confidence_monotone_under_reinforcement(
            initial in 0.0f64..=1.0,
            increments in proptest::collection::vec(0.0f64..=0.5, 0..20),
        ) {
            let mut fact = Fact::new("user-1", "x", CategoryPath::default(), initial);
            let mut previous = fact.confidence;
            for inc in increments {
                fact.reinforce(inc);
                proptest::prop_assert!(fact.confidence >= previous);
                proptest::prop_assert!(fact.confidence <= 1.0);
                previous = fact.confidence;
            }
        }
    }

    #[test]
    fn test_fact_without_embedding() {
        let fact = sample_fact();
        assert!(!fact.has_embedding());
        assert!(fact.with_embedding(vec![0.0; 4]).has_embedding());
    }
}
