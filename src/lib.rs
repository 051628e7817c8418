//! Mnemos: memory retrieval and knowledge-graph engine for AI companions
//!
//! Facts extracted from conversation are categorized, deduplicated and
//! stored alongside an entity link graph; retrieval runs through six
//! search strategies with automatic selection and hybrid combination.
//!
//! The workspace splits into three crates, re-exported here:
//!
//! - [`core`]: domain types (facts, entities, links, categories, errors)
//! - [`store`]: durable RocksDB stores plus an in-memory test backend
//! - [`engine`]: ingestion pipeline, search strategies, graph traversal
//!   and the [`engine::MemoryService`] facade
//!
//! # Quick start
//!
//! ```no_run
//! use mnemos::engine::{MemoryService, MemoryServiceConfig, SearchFilters};
//!
//! # async fn demo() -> mnemos::core::Result<()> {
//! let service = MemoryService::open(MemoryServiceConfig::default())?;
//!
//! let receipt = service.remember("user-1", "I love Thai food").await;
//! println!("queued as {}", receipt.job_id);
//!
//! let hits = service
//!     .search("user-1", "what food do I like?", None, &SearchFilters::default(), 10)
//!     .await?;
//! for hit in hits {
//!     println!("{:.2} {}", hit.score, hit.content);
//! }
//! # Ok(())
//! # }
//! ```

pub use mnemos_core as core;
pub use mnemos_engine as engine;
pub use mnemos_store as store;

pub use mnemos_core::{Error, Result};
pub use mnemos_engine::{MemoryService, MemoryServiceConfig};
