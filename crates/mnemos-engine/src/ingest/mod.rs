//! Ingestion: extraction, categorization, dedup and entity linking

mod jobs;
mod pipeline;

pub use jobs::{IngestionQueue, JobReceipt, JobStatus};
pub use pipeline::{IngestionConfig, IngestionPipeline};
