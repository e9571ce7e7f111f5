//! litkg-ingestion: Sharded batch extraction.
//! - Deterministic partitioning of document ids into worker shards
//! - Shard file persistence
//! - Bounded-concurrency annotation queue
//! - Batch pipeline: query, annotate, link, align, filter, insert
//! - Run summary counters

pub mod error;
pub mod partition;
pub mod pipeline;
pub mod queue;
pub mod shard;
pub mod summary;

pub use error::{JobPanicked, PipelineError, Result};
pub use partition::{plan_shard_count, PaperPartitioner, DEFAULT_BENCHMARK_SIZE};
pub use pipeline::{BatchPipeline, PipelineConfig, WriteSlot};
pub use queue::{ConcurrentAnnotationQueue, JobId};
pub use shard::ShardStore;
pub use summary::{DocumentOutcome, RunSummary};
