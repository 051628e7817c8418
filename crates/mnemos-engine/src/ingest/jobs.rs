//! Fire-and-forget ingestion jobs
//!
//! Conversation flow never waits on extraction: [`IngestionQueue::dispatch`]
//! returns a receipt immediately and the pipeline runs on a spawned task.
//! Failures are logged and recorded on the job, never propagated to the
//! conversation.

use super::IngestionPipeline;
use mnemos_core::{FactId, JobId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Terminal jobs retained for status queries before eviction
const DEFAULT_FINISHED_HISTORY: usize = 256;

/// Lifecycle of a dispatched ingestion job
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed { fact_ids: Vec<FactId> },
    Failed { error: String },
}

impl JobStatus {
    /// True once the job will not change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

/// Acknowledgement returned to the caller at dispatch time
#[derive(Debug, Clone, Copy)]
pub struct JobReceipt {
    pub dispatched: bool,
    pub job_id: JobId,
}

/// Job statuses with a bounded history of finished jobs
///
/// Pending and running entries stay until they finish; once the finished
/// set exceeds the history limit, the oldest terminal entries are evicted
/// so a long-lived service does not accumulate one entry per turn.
struct JobTable {
    statuses: HashMap<JobId, JobStatus>,
    finished: VecDeque<JobId>,
    history_limit: usize,
}

impl JobTable {
    fn new(history_limit: usize) -> Self {
        Self {
            statuses: HashMap::new(),
            finished: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    fn record(&mut self, job_id: JobId, status: JobStatus) {
        let terminal = status.is_terminal();
        self.statuses.insert(job_id, status);
        if terminal {
            self.finished.push_back(job_id);
            while self.finished.len() > self.history_limit {
                if let Some(evicted) = self.finished.pop_front() {
                    self.statuses.remove(&evicted);
                }
            }
        }
    }
}

/// Runs ingestion jobs on background tasks and tracks their status
#[derive(Clone)]
pub struct IngestionQueue {
    pipeline: Arc<IngestionPipeline>,
    jobs: Arc<RwLock<JobTable>>,
}

impl IngestionQueue {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self::with_history_limit(pipeline, DEFAULT_FINISHED_HISTORY)
    }

    /// Queue keeping at most `history_limit` finished jobs queryable
    pub fn with_history_limit(pipeline: Arc<IngestionPipeline>, history_limit: usize) -> Self {
        Self {
            pipeline,
            jobs: Arc::new(RwLock::new(JobTable::new(history_limit))),
        }
    }

    /// Enqueue a message for ingestion and return immediately
    pub async fn dispatch(&self, user_id: &str, text: &str) -> JobReceipt {
        let job_id = JobId::new();
        self.jobs.write().await.record(job_id, JobStatus::Pending);
        debug!(user_id, job_id = %job_id, "dispatched ingestion job");

        let pipeline = self.pipeline.clone();
        let jobs = self.jobs.clone();
        let user_id = user_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move {
            jobs.write().await.record(job_id, JobStatus::Running);
            let status = match pipeline.ingest(&user_id, &text).await {
                Ok(fact_ids) => JobStatus::Completed { fact_ids },
                Err(err) => {
                    // Background failure must not surface in conversation
                    warn!(user_id, job_id = %job_id, error = %err, "ingestion job failed");
                    JobStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            jobs.write().await.record(job_id, status);
        });

        JobReceipt {
            dispatched: true,
            job_id,
        }
    }

    /// Current status of a job; None for unknown or evicted IDs
    pub async fn status(&self, job_id: JobId) -> Option<JobStatus> {
        self.jobs.read().await.statuses.get(&job_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityGraph, GraphConfig};
    use crate::ingest::IngestionConfig;
    use crate::providers::embedding::MockEmbeddingProvider;
    use crate::providers::extraction::MockExtractionProvider;
    use crate::Stores;
    use mnemos_store::{FactStore, MemoryStore};
    use std::time::Duration;

    fn queue(stores: Stores) -> IngestionQueue {
        let graph = EntityGraph::new(stores.clone(), GraphConfig::default());
        let pipeline = IngestionPipeline::new(
            stores,
            Arc::new(MockEmbeddingProvider::default()),
            Arc::new(MockExtractionProvider::new()),
            graph,
            IngestionConfig::default(),
        );
        IngestionQueue::new(Arc::new(pipeline))
    }

    async fn wait_terminal(queue: &IngestionQueue, job_id: JobId) -> JobStatus {
        for _ in 0..200 {
            if let Some(status) = queue.status(job_id).await {
                if status.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_dispatch_completes_in_background() {
        let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
        let queue = queue(stores.clone());

        let receipt = queue.dispatch("u", "I love Thai food").await;
        assert!(receipt.dispatched);

        let status = wait_terminal(&queue, receipt.job_id).await;
        let JobStatus::Completed { fact_ids } = status else {
            panic!("expected completion, got {status:?}");
        };
        assert_eq!(fact_ids.len(), 1);
        assert_eq!(stores.facts.fact_count("u").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_propagated() {
        let queue = queue(Stores::from_backend(Arc::new(MemoryStore::new())));

        // Empty message fails validation inside the pipeline
        let receipt = queue.dispatch("u", "   ").await;
        assert!(receipt.dispatched);

        let status = wait_terminal(&queue, receipt.job_id).await;
        assert!(matches!(status, JobStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_job_is_none() {
        let queue = queue(Stores::from_backend(Arc::new(MemoryStore::new())));
        assert!(queue.status(JobId::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_finished_jobs_are_evicted_past_the_history_limit() {
        let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
        let graph = EntityGraph::new(stores.clone(), GraphConfig::default());
        let pipeline = IngestionPipeline::new(
            stores,
            Arc::new(MockEmbeddingProvider::default()),
            Arc::new(MockExtractionProvider::new()),
            graph,
            IngestionConfig::default(),
        );
        let queue = IngestionQueue::with_history_limit(Arc::new(pipeline), 3);

        let mut receipts = Vec::new();
        for i in 0..6 {
            let text = format!("I enjoy flavor number {i}");
            let receipt = queue.dispatch("u", &text).await;
            wait_terminal(&queue, receipt.job_id).await;
            receipts.push(receipt);
        }

        assert_eq!(queue.jobs.read().await.statuses.len(), 3);
        // The oldest finished jobs fell out, the newest stay queryable
        assert!(queue.status(receipts[0].job_id).await.is_none());
        assert!(queue.status(receipts[5].job_id).await.is_some());
    }
}
