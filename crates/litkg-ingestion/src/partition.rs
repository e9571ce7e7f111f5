//! Deterministic sharding of document ids across workers.

use litkg_common::{DocumentId, Shard};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

/// Default number of ids every shard receives in benchmark mode.
pub const DEFAULT_BENCHMARK_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperPartitioner {
    shard_count: usize,
    /// Set in benchmark mode: every shard gets the same leading ids.
    benchmark_size: Option<usize>,
}

impl PaperPartitioner {
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count < 1 {
            return Err(PipelineError::InvalidShardCount(shard_count));
        }
        Ok(Self { shard_count, benchmark_size: None })
    }

    /// Give every shard the same first `size` ids instead of splitting.
    pub fn benchmark(mut self, size: usize) -> Self {
        self.benchmark_size = Some(size);
        self
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Always returns exactly `shard_count` shards, indexed `0..shard_count`.
    ///
    /// Normal mode slices `ids` into contiguous runs of `ceil(total / N)`;
    /// the last non-empty shard may be shorter and trailing shards may be
    /// empty.
    pub fn partition(&self, ids: &[DocumentId]) -> Vec<Shard> {
        let total = ids.len();

        if let Some(size) = self.benchmark_size {
            let n = size.min(total);
            warn!(per_shard = n, shards = self.shard_count, "Benchmark split: every shard gets the same documents");
            return (0..self.shard_count)
                .map(|index| Shard { index, document_ids: ids[..n].to_vec() })
                .collect();
        }

        let per_shard = total.div_ceil(self.shard_count);
        info!(total, shards = self.shard_count, per_shard, "Splitting documents");

        (0..self.shard_count)
            .map(|index| {
                let start = (index * per_shard).min(total);
                let end = (start + per_shard).min(total);
                Shard { index, document_ids: ids[start..end].to_vec() }
            })
            .collect()
    }
}

/// Number of shards needed so no shard exceeds `max_per_shard` documents,
/// but never fewer than the nodes available to run them.
pub fn plan_shard_count(total_documents: usize, max_per_shard: usize, available_nodes: usize) -> Result<usize> {
    if max_per_shard < 1 {
        return Err(PipelineError::InvalidShardSize);
    }
    Ok(total_documents.div_ceil(max_per_shard).max(available_nodes))
}
