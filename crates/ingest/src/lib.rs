//! Ingestion pipeline, job queue, worker pool, progress broadcaster and
//! reindex controller: everything that turns raw bytes into searchable
//! chunks and keeps them fresh as source files change.

mod broadcaster;
mod content_store;
mod pipeline;
mod queue;
mod reindex;
mod worker;

pub use broadcaster::ProgressBroadcaster;
pub use content_store::{ContentStore, ContentStoreError, LocalFsContentStore};
pub use pipeline::{IngestionPipeline, PipelineError};
pub use queue::{JobQueue, QueueError};
pub use reindex::{ReindexController, ReindexDecision, ReindexPolicy, ReindexReason, ReindexSummary};
pub use worker::WorkerPool;
