//! Batch extraction pipeline for one shard.
//!
//! For every batch of document ids:
//!   1. Fetch content from the store
//!   2. Submit every document with content to the annotation queue
//!   3. Drain the queue; link entities, align, filter and build rows per
//!      document as its annotation arrives
//!   4. Wait for the previous batch's inserts, then issue this batch's
//!
//! Inserts therefore overlap with the next batch's annotation but never run
//! more than one batch behind. Per-document failures are counted; store,
//! sink and gateway failures end the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use litkg_common::{format_duration, DocumentId, DocumentRef, Phase, PhaseTimings, Shard};
use litkg_db::schema::{CONCEPT_COLUMNS, TABLE_CONCEPTS, TABLE_TRIPLES, TRIPLE_COLUMNS};
use litkg_db::{DocumentStore, InsertHandle, RowSink};
use litkg_kg::{candidate_triples, DocumentRows, TripleFilter};
use litkg_ner::{AnnotatedDocument, Annotator, EntityLinker, MemoryProbe, SystemMemoryProbe};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::queue::{ConcurrentAnnotationQueue, JobId};
use crate::summary::{DocumentOutcome, RunSummary};

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Documents fetched, annotated and inserted together.
    pub batch_size: usize,
    /// Concurrent annotation requests.
    pub threads: usize,
    /// Run inserts off the draining thread.
    pub threaded_inserts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            threaded_inserts: true,
        }
    }
}

// ── Write slot ────────────────────────────────────────────────────────────────

/// Inserts of the most recent batch that may still be running.
#[derive(Debug, Default)]
pub struct WriteSlot {
    pending: Vec<InsertHandle>,
}

impl WriteSlot {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every pending insert and return the rows written. All
    /// handles are waited on even when one fails; the first failure wins.
    pub fn drain(&mut self) -> Result<u64> {
        let mut written = 0;
        let mut failure = None;
        for handle in self.pending.drain(..) {
            let table = handle.table().to_string();
            match handle.wait() {
                Ok(n) => written += n,
                Err(source) if failure.is_none() => {
                    failure = Some(PipelineError::Insert { table, source });
                }
                Err(source) => warn!(table = %table, error = %source, "Further insert failure"),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Hold a new batch's handles. The slot must have been drained.
    pub fn fill(&mut self, handles: impl IntoIterator<Item = InsertHandle>) {
        debug_assert!(self.pending.is_empty(), "write slot filled before it was drained");
        self.pending.extend(handles);
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

type Annotated = (DocumentRef, litkg_ner::Result<AnnotatedDocument>);

pub struct BatchPipeline {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn RowSink>,
    annotator: Arc<dyn Annotator>,
    linker: Arc<dyn EntityLinker>,
    memory: Arc<dyn MemoryProbe>,
    config: PipelineConfig,
}

impl BatchPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn RowSink>,
        annotator: Arc<dyn Annotator>,
        linker: Arc<dyn EntityLinker>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            sink,
            annotator,
            linker,
            memory: Arc::new(SystemMemoryProbe::new()),
            config,
        }
    }

    /// Probe reported in the per-batch progress line.
    pub fn with_memory_probe(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }

    /// Extract every document of a worker's shard.
    pub fn run_shard(&self, shard: &Shard) -> Result<RunSummary> {
        info!(shard = shard.index, documents = shard.len(), "Running shard");
        self.run(&shard.document_ids)
    }

    #[instrument(skip_all, fields(documents = ids.len()))]
    pub fn run(&self, ids: &[DocumentId]) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = ids.len().div_ceil(batch_size);
        info!(
            run_id = %run_id,
            documents = ids.len(),
            batch_size,
            batches = total_batches,
            threads = self.config.threads,
            "Beginning extraction"
        );

        let mut queue = ConcurrentAnnotationQueue::new(self.config.threads)?;
        let mut slot = WriteSlot::default();
        let mut summary = RunSummary::new(run_id, ids.len());
        let mut timings = PhaseTimings::new();

        for (b, batch) in ids.chunks(batch_size).enumerate() {
            let succeeded_before = summary.succeeded;
            let batch_start = Instant::now();
            let outcome = self.run_batch(batch, &mut queue, &mut slot, &mut summary, &mut timings);
            timings.record(Phase::Batch, batch_start.elapsed());

            if let Err(e) = outcome {
                error!(run_id = %run_id, batch = b, error = %e, "Extraction aborted");
                if let Err(pending) = slot.drain() {
                    warn!(error = %pending, "Pending inserts failed while aborting");
                }
                return Err(e);
            }

            self.log_progress(b, total_batches, summary.succeeded - succeeded_before, &timings, started);
            timings.reset();
        }

        summary.rows_written += slot.drain()?;
        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }

    fn run_batch(
        &self,
        batch: &[DocumentId],
        queue: &mut ConcurrentAnnotationQueue<Annotated>,
        slot: &mut WriteSlot,
        summary: &mut RunSummary,
        timings: &mut PhaseTimings,
    ) -> Result<()> {
        self.check_annotator()?;

        let docs = timings.time(Phase::Query, || self.store.query_documents(batch))?;

        let found: HashSet<DocumentId> = docs.iter().map(|d| d.id).collect();
        for id in batch.iter().filter(|id| !found.contains(id)) {
            debug!(doc_id = id, "No document row");
            summary.record(DocumentOutcome::NoContent);
        }

        let mut submitted: HashMap<JobId, DocumentId> = HashMap::new();
        for doc in docs {
            if !doc.has_content() {
                debug!(doc_id = doc.id, "Document has no content");
                summary.record(DocumentOutcome::NoContent);
                continue;
            }
            let doc_id = doc.id;
            let annotator = Arc::clone(&self.annotator);
            let job = queue.submit(move || {
                let annotated = annotator.annotate(doc.text().unwrap_or_default());
                (doc, annotated)
            });
            submitted.insert(job, doc_id);
        }

        let mut rows = DocumentRows::default();
        for _ in 0..submitted.len() {
            let Some(finished) = timings.time(Phase::Annotate, || queue.next()) else {
                break;
            };
            let outcome = match finished {
                Err(panicked) => {
                    warn!(doc_id = ?submitted.get(&panicked.job), error = %panicked, "Annotation job panicked");
                    DocumentOutcome::AnnotationFailed
                }
                Ok((doc, Err(e))) => {
                    debug!(doc_id = doc.id, error = %e, "Annotation failed");
                    DocumentOutcome::AnnotationFailed
                }
                Ok((doc, Ok(annotated))) => self.extract(&doc, &annotated, &mut rows, timings),
            };
            summary.record(outcome);
        }

        let insert_start = Instant::now();
        summary.rows_written += slot.drain()?;
        slot.fill(self.issue_inserts(rows)?);
        timings.record(Phase::Insert, insert_start.elapsed());

        self.check_annotator()
    }

    /// Link, align, filter and build rows for one annotated document.
    fn extract(
        &self,
        doc: &DocumentRef,
        annotated: &AnnotatedDocument,
        rows: &mut DocumentRows,
        timings: &mut PhaseTimings,
    ) -> DocumentOutcome {
        let text = doc.text().unwrap_or_default();

        let entities = match timings.time(Phase::Ner, || self.linker.link(text)) {
            Ok(entities) => entities,
            Err(e) => {
                warn!(doc_id = doc.id, error = %e, "Entity linking failed");
                return DocumentOutcome::DataError;
            }
        };
        if entities.is_empty() {
            debug!(doc_id = doc.id, "No entities found");
            return DocumentOutcome::NoEntities;
        }

        let doc_rows = timings.time(Phase::Triples, || {
            let kept = TripleFilter::apply(candidate_triples(annotated, &entities));
            DocumentRows::build(doc, &kept)
        });
        if doc_rows.is_empty() {
            debug!(doc_id = doc.id, entities = entities.len(), "No triples extracted");
            return DocumentOutcome::NoTriples;
        }

        let triples = doc_rows.triples.len();
        debug!(
            doc_id = doc.id,
            chars = text.chars().count(),
            triples,
            concepts = doc_rows.concepts.len(),
            entities = entities.len(),
            "Document extracted"
        );
        rows.append(doc_rows);
        DocumentOutcome::Inserted { triples, entities: entities.len() }
    }

    fn issue_inserts(&self, rows: DocumentRows) -> Result<Vec<InsertHandle>> {
        let (triple_values, concept_values) = rows.into_values();
        let mut handles = Vec::with_capacity(2);
        for (table, columns, values) in [
            (TABLE_TRIPLES, TRIPLE_COLUMNS, triple_values),
            (TABLE_CONCEPTS, CONCEPT_COLUMNS, concept_values),
        ] {
            let handle = self
                .sink
                .insert_rows(table, columns, values, self.config.threaded_inserts)
                .map_err(|source| PipelineError::Insert { table: table.to_string(), source })?;
            handles.extend(handle);
        }
        Ok(handles)
    }

    fn check_annotator(&self) -> Result<()> {
        if self.annotator.is_failed() {
            return Err(PipelineError::GatewayFailed(
                "annotation service could not be started".to_string(),
            ));
        }
        Ok(())
    }

    fn log_progress(
        &self,
        batch: usize,
        total_batches: usize,
        batch_success: usize,
        timings: &PhaseTimings,
        started: Instant,
    ) {
        let complete = 100.0 * (batch + 1) as f64 / total_batches.max(1) as f64;
        info!(
            batch = batch + 1,
            batches = total_batches,
            complete = %format!("{complete:.1}%"),
            succeeded = batch_success,
            elapsed = %format_duration(started.elapsed()),
            phases = %timings.summary(),
            memory = %format!("{:.1}%", self.memory.used_percent()),
            "Batch complete"
        );
    }
}
