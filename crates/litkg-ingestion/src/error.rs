//! Errors that end a partitioning or extraction run.
//!
//! Per-document failures (timeouts, missing entities, linker errors) are
//! counted in the run summary and never surface here.

use std::path::PathBuf;

use litkg_db::DbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Document store error: {0}")]
    Store(#[from] DbError),

    #[error("Insert into {table} failed: {source}")]
    Insert {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Shard {index} not found at {}", path.display())]
    ShardMissing { index: usize, path: PathBuf },

    #[error("Shard file {}: {source}", path.display())]
    ShardIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shard file {} is malformed: {source}", path.display())]
    ShardFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Annotation gateway failed: {0}")]
    GatewayFailed(String),

    #[error("Shard count must be at least 1, got {0}")]
    InvalidShardCount(usize),

    #[error("Documents per shard must be at least 1")]
    InvalidShardSize,

    #[error("Annotation worker pool: {0}")]
    WorkerPool(String),
}

/// A queued job that panicked instead of returning.
#[derive(Debug, Error)]
#[error("Job {job} panicked: {message}")]
pub struct JobPanicked {
    pub job: u64,
    pub message: String,
}
