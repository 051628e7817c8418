//! Ingestion, search and graph traversal for the mnemos memory engine
//!
//! The engine sits between the provider adapters (embedding + extraction)
//! and the durable stores:
//!
//! - [`ingest`]: turns raw conversation text into deduplicated facts,
//!   entities and links
//! - [`search`]: six retrieval strategies plus automatic selection and a
//!   weighted hybrid combiner
//! - [`graph`]: resolve-or-create entities, idempotent links, BFS traversal
//! - [`service`]: the [`service::MemoryService`] facade that wires it all up

pub mod graph;
pub mod ingest;
pub mod providers;
pub mod search;
pub mod service;

use mnemos_store::{EntityStore, FactStore, LinkStore};
use std::sync::Arc;

pub use graph::{EntityGraph, GraphConfig, TraversedEntity};
pub use ingest::{IngestionConfig, IngestionPipeline, IngestionQueue, JobReceipt, JobStatus};
pub use providers::embedding::{
    EmbeddingConfig, EmbeddingProvider, EmbeddingProviderType, MockEmbeddingProvider,
};
pub use providers::extraction::{
    CandidateFact, CandidateRelationship, CategoryHint, ExtractionConfig, ExtractionProvider,
    ExtractionProviderType, MockExtractionProvider,
};
pub use providers::{ProviderError, ProviderResult};
pub use search::{
    CategoryFilter, CategoryMatch, ScoredFact, SearchConfig, SearchEngine, SearchFilters,
    Strategy, StrategyChoice,
};
pub use service::{MemoryService, MemoryServiceConfig, MemoryStatistics, SearchHit};

/// Shared handles to the three stores, usually all backed by one database
#[derive(Clone)]
pub struct Stores {
    pub facts: Arc<dyn FactStore>,
    pub entities: Arc<dyn EntityStore>,
    pub links: Arc<dyn LinkStore>,
}

impl Stores {
    /// Split a single backend into the three store handles
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: FactStore + EntityStore + LinkStore + 'static,
    {
        Self {
            facts: backend.clone(),
            entities: backend.clone(),
            links: backend,
        }
    }
}

/// Install the default tracing subscriber, honoring `RUST_LOG`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init();
}
