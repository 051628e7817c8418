//! The ingestion pipeline: raw text in, deduplicated facts out

use crate::graph::EntityGraph;
use crate::providers::embedding::{cosine_similarity, EmbeddingProvider};
use crate::providers::extraction::{rule_based_category, CandidateFact, ExtractionProvider};
use crate::providers::with_timeout;
use crate::Stores;
use chrono::Utc;
use mnemos_core::{CategoryPath, Domain, Error, Fact, FactId, LinkType, Result};
use mnemos_store::{EntityStore, FactStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Words that mark a near-duplicate as a correction rather than a repeat
const CORRECTION_MARKERS: &[&str] = &["actually", "no", "instead", "rather"];

/// Tunables for the ingestion pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Cosine similarity at or above which a recent fact is a duplicate
    pub dedup_similarity_threshold: f32,

    /// How far back the dedup lookup reaches
    pub dedup_window: Duration,

    /// Confidence added when a duplicate reinforces an existing fact
    pub reinforce_increment: f64,

    /// Confidence ceiling for candidates whose domain had to be coerced
    pub coerced_confidence_cap: f64,

    /// Confidence ceiling for facts stored without an embedding
    pub degraded_confidence_cap: f64,

    /// Deadline for the extraction call; elapse aborts the whole message
    pub extraction_timeout: Duration,

    /// Deadline for the embedding batch; elapse degrades, never aborts
    pub embedding_timeout: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            dedup_similarity_threshold: 0.95,
            dedup_window: Duration::from_secs(24 * 60 * 60),
            reinforce_increment: 0.1,
            coerced_confidence_cap: 0.5,
            degraded_confidence_cap: 0.8,
            extraction_timeout: Duration::from_secs(30),
            embedding_timeout: Duration::from_secs(10),
        }
    }
}

/// Turns one conversation turn into stored facts, entities and links
///
/// Stage order: extract, categorize, embed, dedup, persist, link.
/// Extraction failure aborts the message (nothing was stored yet);
/// embedding failure degrades (facts stored without vectors); a bad
/// candidate is dropped without taking its batch down.
pub struct IngestionPipeline {
    stores: Stores,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn ExtractionProvider>,
    graph: EntityGraph,
    config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(
        stores: Stores,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn ExtractionProvider>,
        graph: EntityGraph,
        config: IngestionConfig,
    ) -> Self {
        Self {
            stores,
            embedder,
            extractor,
            graph,
            config,
        }
    }

    /// Ingest one message; returns the IDs of the facts it touched
    /// (created, reinforced or corrected)
    pub async fn ingest(&self, user_id: &str, text: &str) -> Result<Vec<FactId>> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("empty user id".to_string()));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("empty message".to_string()));
        }

        let candidates =
            with_timeout(self.config.extraction_timeout, self.extractor.extract_facts(text))
                .await?;
        if candidates.is_empty() {
            debug!(user_id, "nothing memorable in message");
            return Ok(Vec::new());
        }

        let candidates: Vec<CandidateFact> = candidates
            .into_iter()
            .filter(|c| {
                if c.content.trim().is_empty() {
                    warn!(user_id, "dropping candidate with empty content");
                    return false;
                }
                true
            })
            .collect();

        let embeddings = self.embed_candidates(user_id, &candidates).await;
        let degraded = embeddings.iter().all(|e| e.is_none());

        let window = chrono::Duration::from_std(self.config.dedup_window)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let mut recent = self
            .stores
            .facts
            .facts_since(user_id, Utc::now() - window)
            .await?;

        let mut touched = Vec::new();
        for (candidate, embedding) in candidates.into_iter().zip(embeddings) {
            let (category, mut confidence) = self.categorize(user_id, &candidate).await;
            if degraded {
                confidence = confidence.min(self.config.degraded_confidence_cap);
            }

            let fact_id = self
                .persist_candidate(user_id, &candidate, category, confidence, embedding, &mut recent)
                .await?;
            touched.push(fact_id);

            if let Err(err) = self.link_entities(user_id, &candidate, fact_id).await {
                if err.is_hard() {
                    return Err(err);
                }
                warn!(user_id, error = %err, "entity linking failed for candidate");
            }
        }

        info!(user_id, fact_count = touched.len(), "ingestion complete");
        Ok(touched)
    }

    /// Resolve the candidate's category, asking the provider when the
    /// extractor gave no hint and falling back to the local rule table
    async fn categorize(&self, user_id: &str, candidate: &CandidateFact) -> (CategoryPath, f64) {
        let hint = match &candidate.category {
            Some(hint) => hint.clone(),
            None => match self.extractor.select_category(&candidate.content).await {
                Ok(hint) => hint,
                Err(err) => {
                    debug!(user_id, error = %err, "category provider failed, using rules");
                    rule_based_category(&candidate.content)
                }
            },
        };

        let (domain, coerced) = Domain::coerce(&hint.domain);
        let path = CategoryPath::new(domain, &hint.topic, &hint.entity_type, &hint.detail);

        let mut confidence = candidate.confidence;
        if coerced {
            confidence = confidence.min(self.config.coerced_confidence_cap);
            warn!(
                user_id,
                domain = %hint.domain,
                "unknown domain coerced to personal, confidence capped"
            );
        }
        (path, confidence)
    }

    /// Embed all candidate contents in one batch; a provider failure
    /// yields no vectors rather than an error
    async fn embed_candidates(
        &self,
        user_id: &str,
        candidates: &[CandidateFact],
    ) -> Vec<Option<Vec<f32>>> {
        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        match with_timeout(self.config.embedding_timeout, self.embedder.embed_batch(&texts))
            .await
        {
            Ok(vectors) if vectors.len() == texts.len() => {
                vectors.into_iter().map(Some).collect()
            }
            Ok(vectors) => {
                warn!(
                    user_id,
                    expected = texts.len(),
                    got = vectors.len(),
                    "embedding batch came back misshapen, storing without vectors"
                );
                vec![None; texts.len()]
            }
            Err(err) => {
                warn!(user_id, error = %err, "embedding failed, storing without vectors");
                vec![None; texts.len()]
            }
        }
    }

    /// Store the candidate, or fold it into a recent near-duplicate
    async fn persist_candidate(
        &self,
        user_id: &str,
        candidate: &CandidateFact,
        category: CategoryPath,
        confidence: f64,
        embedding: Option<Vec<f32>>,
        recent: &mut Vec<Fact>,
    ) -> Result<FactId> {
        if let Some(existing) = self.find_duplicate(candidate, &embedding, category.domain, recent)
        {
            if is_correction(&candidate.content) {
                existing.correct(&candidate.content, confidence);
                if !candidate.values.is_empty() {
                    existing.values = candidate.values.clone();
                }
                debug!(user_id, fact_id = %existing.id, "corrected existing fact");
            } else {
                existing.reinforce(self.config.reinforce_increment);
                for value in &candidate.values {
                    if !existing.values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                        existing.values.push(value.clone());
                    }
                }
                debug!(
                    user_id,
                    fact_id = %existing.id,
                    mention_count = existing.mention_count,
                    "reinforced existing fact"
                );
            }
            self.stores.facts.put_fact(existing).await?;
            return Ok(existing.id);
        }

        let mut fact = Fact::new(user_id, candidate.content.trim(), category, confidence);
        if let Some(vector) = embedding {
            fact = fact.with_embedding(vector);
        }
        if let Some(attribute) = &candidate.attribute {
            fact = fact.with_attribute(attribute, candidate.values.clone());
        }
        self.stores.facts.put_fact(&fact).await?;
        debug!(user_id, fact_id = %fact.id, category = %fact.category, "stored new fact");

        let id = fact.id;
        // Later candidates in the same message dedup against this one too
        recent.push(fact);
        Ok(id)
    }

    /// A recent fact is a duplicate when it shares the attribute and domain
    /// and is semantically close: embedding similarity when both sides have
    /// vectors, exact normalized content otherwise
    fn find_duplicate<'a>(
        &self,
        candidate: &CandidateFact,
        embedding: &Option<Vec<f32>>,
        domain: Domain,
        recent: &'a mut Vec<Fact>,
    ) -> Option<&'a mut Fact> {
        let wanted_attribute = candidate
            .attribute
            .as_ref()
            .map(|a| a.trim().to_lowercase());

        recent.iter_mut().find(|fact| {
            if fact.attribute != wanted_attribute || fact.category.domain != domain {
                return false;
            }
            match (embedding, &fact.embedding) {
                (Some(a), Some(b)) => {
                    cosine_similarity(a, b) >= self.config.dedup_similarity_threshold
                }
                _ => normalized(&fact.content) == normalized(&candidate.content),
            }
        })
    }

    /// Resolve the relationship's entities and upsert the link between them
    async fn link_entities(
        &self,
        user_id: &str,
        candidate: &CandidateFact,
        fact_id: FactId,
    ) -> Result<()> {
        let Some(rel) = &candidate.relationship else {
            return Ok(());
        };
        if rel.source_name.trim().is_empty() || rel.target_name.trim().is_empty() {
            warn!(user_id, "relationship with unnamed endpoint, skipping");
            return Ok(());
        }

        let mut source = self
            .graph
            .resolve_or_create_entity(user_id, &rel.source_name, &rel.source_type)
            .await?;
        let target = self
            .graph
            .resolve_or_create_entity(user_id, &rel.target_name, &rel.target_type)
            .await?;

        let link_type = LinkType::parse(&rel.link_type);
        self.graph
            .create_or_reinforce_link(
                user_id,
                source.id,
                target.id,
                link_type,
                rel.bidirectional,
                fact_id,
            )
            .await?;

        // Mirror the relationship onto the source entity's attributes
        if source.append_attribute(link_type.as_str(), &rel.target_name) {
            self.stores.entities.put_entity(&source).await?;
        }
        Ok(())
    }
}

fn normalized(text: &str) -> String {
    text.trim().to_lowercase()
}

/// True when the statement reads as a correction of an earlier one
fn is_correction(content: &str) -> bool {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| CORRECTION_MARKERS.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphConfig;
    use crate::providers::embedding::MockEmbeddingProvider;
    use crate::providers::extraction::{CategoryHint, MockExtractionProvider};
    use crate::providers::{ProviderError, ProviderResult};
    use crate::search::StrategyChoice;
    use async_trait::async_trait;
    use mnemos_store::{LinkStore, MemoryStore};

    fn stores() -> Stores {
        Stores::from_backend(Arc::new(MemoryStore::new()))
    }

    fn pipeline_with(
        stores: Stores,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn ExtractionProvider>,
    ) -> IngestionPipeline {
        let graph = EntityGraph::new(stores.clone(), GraphConfig::default());
        IngestionPipeline::new(stores, embedder, extractor, graph, IngestionConfig::default())
    }

    fn mock_pipeline(stores: Stores) -> IngestionPipeline {
        pipeline_with(
            stores,
            Arc::new(MockEmbeddingProvider::default()),
            Arc::new(MockExtractionProvider::new()),
        )
    }

    /// Embedder that returns the same vector for every text, forcing every
    /// pair of facts to look like duplicates
    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        fn dimensions(&self) -> usize {
            4
        }
        fn model_name(&self) -> &str {
            "constant"
        }
        async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn dimensions(&self) -> usize {
            4
        }
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
            Err(ProviderError::Unavailable("down".to_string()))
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl ExtractionProvider for FailingExtractor {
        async fn extract_facts(&self, _text: &str) -> ProviderResult<Vec<CandidateFact>> {
            Err(ProviderError::Unavailable("down".to_string()))
        }
        async fn select_category(&self, _content: &str) -> ProviderResult<CategoryHint> {
            Err(ProviderError::Unavailable("down".to_string()))
        }
        async fn select_strategy(&self, _query: &str) -> ProviderResult<StrategyChoice> {
            Err(ProviderError::Unavailable("down".to_string()))
        }
    }

    /// Extractor whose candidates carry a domain outside the closed set
    struct HallucinatingExtractor;

    #[async_trait]
    impl ExtractionProvider for HallucinatingExtractor {
        async fn extract_facts(&self, text: &str) -> ProviderResult<Vec<CandidateFact>> {
            let mut candidate = CandidateFact::new(text.trim(), "statement", 0.9);
            candidate.category = Some(CategoryHint::new("shopping_sprees", "", "", ""));
            Ok(vec![candidate])
        }
        async fn select_category(&self, _content: &str) -> ProviderResult<CategoryHint> {
            Ok(CategoryHint::new("shopping_sprees", "", "", ""))
        }
        async fn select_strategy(&self, _query: &str) -> ProviderResult<StrategyChoice> {
            Ok(StrategyChoice::hybrid_default())
        }
    }

    #[tokio::test]
    async fn test_multi_value_statement_stays_one_fact() {
        let stores = stores();
        let pipeline = mock_pipeline(stores.clone());

        let ids = pipeline
            .ingest("u", "I love Italian, Japanese, and Thai food.")
            .await
            .unwrap();

        assert_eq!(ids.len(), 1);
        let fact = stores.facts.get_fact("u", ids[0]).await.unwrap().unwrap();
        assert_eq!(fact.attribute.as_deref(), Some("likes"));
        assert_eq!(fact.values.len(), 3);
        assert_eq!(fact.category.domain, Domain::Preferences);
        assert!(fact.has_embedding());
    }

    #[tokio::test]
    async fn test_repeated_message_reinforces_not_duplicates() {
        let stores = stores();
        let pipeline = mock_pipeline(stores.clone());

        let first = pipeline.ingest("u", "I love Thai food").await.unwrap();
        let second = pipeline.ingest("u", "I love Thai food").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(stores.facts.fact_count("u").await.unwrap(), 1);
        let fact = stores.facts.get_fact("u", first[0]).await.unwrap().unwrap();
        assert_eq!(fact.mention_count, 2);
    }

    #[tokio::test]
    async fn test_correction_overwrites_content() {
        let stores = stores();
        let pipeline = pipeline_with(
            stores.clone(),
            Arc::new(ConstantEmbedder),
            Arc::new(MockExtractionProvider::new()),
        );

        let first = pipeline.ingest("u", "my favorite color is green").await.unwrap();
        let second = pipeline
            .ingest("u", "actually my favorite color is blue")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(stores.facts.fact_count("u").await.unwrap(), 1);
        let fact = stores.facts.get_fact("u", first[0]).await.unwrap().unwrap();
        assert!(fact.content.contains("blue"));
        assert_eq!(fact.mention_count, 2);
    }

    #[tokio::test]
    async fn test_relationship_creates_entities_and_link() {
        let stores = stores();
        let pipeline = mock_pipeline(stores.clone());

        let ids = pipeline.ingest("u", "Jack loves Tokyo.").await.unwrap();

        assert_eq!(stores.entities.entity_count("u").await.unwrap(), 2);
        let links = stores.links.links_for_user("u").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Loves);
        assert_eq!(links[0].originating_fact_id, ids[0]);
    }

    #[tokio::test]
    async fn test_repeated_relationship_reinforces_link() {
        let stores = stores();
        let pipeline = mock_pipeline(stores.clone());

        pipeline.ingest("u", "Jack loves Tokyo.").await.unwrap();
        pipeline.ingest("u", "Jack loves Tokyo.").await.unwrap();

        let links = stores.links.links_for_user("u").await.unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].strength > GraphConfig::default().initial_link_strength);
        assert_eq!(stores.entities.entity_count("u").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_extraction_failure_aborts_with_recoverable_error() {
        let stores = stores();
        let pipeline = pipeline_with(
            stores.clone(),
            Arc::new(MockEmbeddingProvider::default()),
            Arc::new(FailingExtractor),
        );

        let err = pipeline.ingest("u", "some message").await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(stores.facts.fact_count("u").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades() {
        let stores = stores();
        let pipeline = pipeline_with(
            stores.clone(),
            Arc::new(FailingEmbedder),
            Arc::new(MockExtractionProvider::new()),
        );

        let ids = pipeline.ingest("u", "I love Thai food").await.unwrap();
        let fact = stores.facts.get_fact("u", ids[0]).await.unwrap().unwrap();

        assert!(!fact.has_embedding());
        assert!(fact.confidence <= IngestionConfig::default().degraded_confidence_cap);
    }

    #[tokio::test]
    async fn test_unknown_domain_is_coerced_and_capped() {
        let stores = stores();
        let pipeline = pipeline_with(
            stores.clone(),
            Arc::new(MockEmbeddingProvider::default()),
            Arc::new(HallucinatingExtractor),
        );

        let ids = pipeline.ingest("u", "bought five hats").await.unwrap();
        let fact = stores.facts.get_fact("u", ids[0]).await.unwrap().unwrap();

        assert_eq!(fact.category.domain, Domain::Personal);
        assert!(fact.confidence <= IngestionConfig::default().coerced_confidence_cap);
    }

    #[tokio::test]
    async fn test_empty_message_is_invalid_input() {
        let pipeline = mock_pipeline(stores());
        let err = pipeline.ingest("u", "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_correction_marker_detection() {
        assert!(is_correction("Actually, I prefer coffee"));
        assert!(is_correction("no, it was Tuesday"));
        assert!(!is_correction("I prefer coffee"));
        // Marker must be a whole word
        assert!(!is_correction("the rathersome weather"));
    }
}
