//! The memory service facade
//!
//! [`MemoryService`] wires the stores, providers, pipeline, queue, search
//! engine and graph together behind one API. Callers interact with this
//! type; the parts stay reachable for tests and unusual wiring.

use crate::graph::{EntityGraph, GraphConfig, TraversedEntity};
use crate::ingest::{IngestionConfig, IngestionPipeline, IngestionQueue, JobReceipt, JobStatus};
use crate::providers::embedding::{
    create_embedding_provider, EmbeddingConfig, EmbeddingProvider,
};
use crate::providers::extraction::{
    create_extraction_provider, ExtractionConfig, ExtractionProvider, ExtractionProviderType,
};
use crate::search::{
    ProviderStrategySelector, RuleBasedSelector, ScoredFact, SearchConfig, SearchEngine,
    SearchFilters, Strategy, StrategySelector,
};
use crate::Stores;
use chrono::{DateTime, Utc};
use mnemos_core::{
    CategoryHierarchy, Domain, Entity, EntityId, FactId, JobId, LinkType, Result,
};
use mnemos_store::{EntityStore, FactStore, LinkStore, MemoryStore, RocksStore, StoreConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Everything the service needs to come up
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryServiceConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub extraction: ExtractionConfig,
    pub ingestion: IngestionConfig,
    pub search: SearchConfig,
    pub graph: GraphConfig,
}

/// One search result as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub fact_id: FactId,
    pub content: String,
    pub score: f64,
    pub category: String,
    pub confidence: f64,
    pub last_mentioned_at: DateTime<Utc>,
}

impl From<ScoredFact> for SearchHit {
    fn from(scored: ScoredFact) -> Self {
        Self {
            fact_id: scored.fact.id,
            content: scored.fact.content.clone(),
            score: scored.score,
            category: scored.fact.category.to_string(),
            confidence: scored.fact.confidence,
            last_mentioned_at: scored.fact.last_mentioned_at,
        }
    }
}

/// Aggregate numbers over one user's memory
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatistics {
    pub fact_count: usize,
    pub entity_count: usize,
    pub link_count: usize,
    pub avg_confidence: f64,
    pub oldest_fact: Option<DateTime<Utc>>,
    pub newest_fact: Option<DateTime<Utc>>,
}

/// The assembled memory engine
pub struct MemoryService {
    stores: Stores,
    hierarchy: Arc<RwLock<CategoryHierarchy>>,
    graph: EntityGraph,
    queue: IngestionQueue,
    pipeline: Arc<IngestionPipeline>,
    engine: SearchEngine,
}

impl MemoryService {
    /// Open a durable service at the configured path
    pub fn open(config: MemoryServiceConfig) -> Result<Self> {
        let backend = Arc::new(RocksStore::open(config.store.clone())?);
        info!(path = %config.store.path, "opened memory store");
        Self::with_backend(Stores::from_backend(backend), config)
    }

    /// Fully in-memory service with mock providers, for tests
    pub fn in_memory() -> Result<Self> {
        Self::with_backend(
            Stores::from_backend(Arc::new(MemoryStore::new())),
            MemoryServiceConfig::default(),
        )
    }

    /// Assemble the service over an existing backend
    pub fn with_backend(stores: Stores, config: MemoryServiceConfig) -> Result<Self> {
        let embedder = create_embedding_provider(&config.embedding)?;
        let extractor = create_extraction_provider(&config.extraction)?;
        Ok(Self::assemble(stores, embedder, extractor, config))
    }

    /// Assemble with explicit providers, bypassing the factories
    pub fn with_providers(
        stores: Stores,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn ExtractionProvider>,
        config: MemoryServiceConfig,
    ) -> Self {
        Self::assemble(stores, embedder, extractor, config)
    }

    fn assemble(
        stores: Stores,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn ExtractionProvider>,
        config: MemoryServiceConfig,
    ) -> Self {
        let hierarchy = Arc::new(RwLock::new(CategoryHierarchy::with_defaults()));
        let graph = EntityGraph::new(stores.clone(), config.graph);

        let pipeline = Arc::new(IngestionPipeline::new(
            stores.clone(),
            embedder.clone(),
            extractor.clone(),
            graph.clone(),
            config.ingestion,
        ));
        let queue = IngestionQueue::new(pipeline.clone());

        let rules = RuleBasedSelector::new(hierarchy.clone());
        let selector: Arc<dyn StrategySelector> = match config.extraction.provider {
            // The rule table outperforms the mock at selection; only a real
            // model gets asked
            ExtractionProviderType::Mock => Arc::new(rules),
            ExtractionProviderType::OpenAi => {
                Arc::new(ProviderStrategySelector::new(extractor, rules))
            }
        };
        let engine = SearchEngine::new(
            stores.clone(),
            embedder,
            hierarchy.clone(),
            graph.clone(),
            selector,
            config.search,
        );

        Self {
            stores,
            hierarchy,
            graph,
            queue,
            pipeline,
            engine,
        }
    }

    /// Queue a conversation turn for background ingestion
    pub async fn remember(&self, user_id: &str, text: &str) -> JobReceipt {
        self.queue.dispatch(user_id, text).await
    }

    /// Run ingestion inline and wait for the outcome
    pub async fn remember_now(&self, user_id: &str, text: &str) -> Result<Vec<FactId>> {
        self.pipeline.ingest(user_id, text).await
    }

    /// Status of a previously dispatched ingestion job
    pub async fn job_status(&self, job_id: JobId) -> Option<JobStatus> {
        self.queue.status(job_id).await
    }

    /// Search the user's memory; strategy is auto-selected when None
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        strategy: Option<Strategy>,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let results = self
            .engine
            .search(user_id, query, strategy, filters, limit)
            .await?;
        Ok(results.into_iter().map(SearchHit::from).collect())
    }

    /// Walk the entity graph outward from a named root
    pub async fn traverse(
        &self,
        user_id: &str,
        root_name: &str,
        max_depth: usize,
        link_type: Option<LinkType>,
    ) -> Result<Vec<TraversedEntity>> {
        self.graph
            .traverse(user_id, root_name, max_depth, link_type)
            .await
    }

    /// Case-insensitive entity lookup by name, any type
    pub async fn entity_named(&self, user_id: &str, name: &str) -> Result<Option<Entity>> {
        self.graph.find_entity_by_name(user_id, name).await
    }

    /// Delete a fact and the links its extraction produced
    pub async fn delete_fact(&self, user_id: &str, id: FactId) -> Result<bool> {
        self.graph.delete_fact(user_id, id).await
    }

    /// Delete an entity and every link touching it
    pub async fn delete_entity(&self, user_id: &str, id: EntityId) -> Result<bool> {
        self.graph.delete_entity(user_id, id).await
    }

    /// Register a topic under a domain; false if already present
    pub async fn register_topic(&self, domain: Domain, topic: &str) -> bool {
        self.hierarchy.write().await.register_topic(domain, topic)
    }

    /// Registered topics for a domain
    pub async fn topics(&self, domain: Domain) -> Vec<String> {
        self.hierarchy
            .read()
            .await
            .topics(domain)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Aggregate statistics over one user's memory
    pub async fn statistics(&self, user_id: &str) -> Result<MemoryStatistics> {
        let facts = self.stores.facts.facts_for_user(user_id).await?;
        let entity_count = self.stores.entities.entity_count(user_id).await?;
        let link_count = self.stores.links.link_count(user_id).await?;

        let avg_confidence = if facts.is_empty() {
            0.0
        } else {
            facts.iter().map(|f| f.confidence).sum::<f64>() / facts.len() as f64
        };

        Ok(MemoryStatistics {
            fact_count: facts.len(),
            entity_count,
            link_count,
            avg_confidence,
            oldest_fact: facts.iter().map(|f| f.created_at).min(),
            newest_fact: facts.iter().map(|f| f.created_at).max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remember_then_search_round_trip() {
        let service = MemoryService::in_memory().unwrap();

        service
            .remember_now("u", "I love Italian, Japanese, and Thai food.")
            .await
            .unwrap();

        let hits = service
            .search("u", "Thai food", None, &SearchFilters::default(), 10)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].content.contains("Thai"));
    }

    #[tokio::test]
    async fn test_statistics_track_ingestion() {
        let service = MemoryService::in_memory().unwrap();

        service.remember_now("u", "Jack loves Tokyo.").await.unwrap();
        let stats = service.statistics("u").await.unwrap();

        assert_eq!(stats.fact_count, 1);
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.link_count, 1);
        assert!(stats.avg_confidence > 0.0);
        assert!(stats.oldest_fact.is_some());
    }

    #[tokio::test]
    async fn test_statistics_isolated_per_user() {
        let service = MemoryService::in_memory().unwrap();

        service.remember_now("alice", "I love Thai food").await.unwrap();
        let stats = service.statistics("bob").await.unwrap();
        assert_eq!(stats.fact_count, 0);
    }

    #[tokio::test]
    async fn test_register_topic_extends_categorical_vocabulary() {
        let service = MemoryService::in_memory().unwrap();
        assert!(service.register_topic(Domain::Preferences, "gaming").await);
        assert!(!service.register_topic(Domain::Preferences, "gaming").await);
        assert!(service
            .topics(Domain::Preferences)
            .await
            .contains(&"gaming".to_string()));
    }

    #[tokio::test]
    async fn test_delete_fact_removes_links() {
        let service = MemoryService::in_memory().unwrap();

        let ids = service.remember_now("u", "Jack loves Tokyo.").await.unwrap();
        assert!(service.delete_fact("u", ids[0]).await.unwrap());

        let stats = service.statistics("u").await.unwrap();
        assert_eq!(stats.fact_count, 0);
        assert_eq!(stats.link_count, 0);
        // Entities survive the fact
        assert_eq!(stats.entity_count, 2);
    }

    #[tokio::test]
    async fn test_delete_entity_by_lookup() {
        let service = MemoryService::in_memory().unwrap();

        service.remember_now("u", "Jack loves Tokyo.").await.unwrap();
        let jack = service.entity_named("u", "jack").await.unwrap().unwrap();
        assert!(service.delete_entity("u", jack.id).await.unwrap());

        let stats = service.statistics("u").await.unwrap();
        assert_eq!(stats.entity_count, 1);
        assert_eq!(stats.link_count, 0);
    }
}
