//! Per-run outcome counters.

use std::time::Duration;

use litkg_common::format_duration;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// How one document left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Rows were produced and handed to the sink.
    Inserted { triples: usize, entities: usize },
    /// No row in the store, or blank content. Never submitted.
    NoContent,
    /// The annotator timed out, returned garbage, or its job panicked.
    AnnotationFailed,
    /// The linker found nothing in the text.
    NoEntities,
    /// No candidate triple survived filtering.
    NoTriples,
    /// Entity linking failed.
    DataError,
}

impl DocumentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOutcome::Inserted { .. }  => "inserted",
            DocumentOutcome::NoContent        => "no_content",
            DocumentOutcome::AnnotationFailed => "annotation_failed",
            DocumentOutcome::NoEntities       => "no_entities",
            DocumentOutcome::NoTriples        => "no_triples",
            DocumentOutcome::DataError        => "data_error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub documents: usize,
    pub succeeded: usize,
    pub annotation_failed: usize,
    pub errors: usize,
    pub no_entities: usize,
    pub no_triples: usize,
    pub no_content: usize,
    pub triples: usize,
    pub entities: usize,
    pub rows_written: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(run_id: Uuid, documents: usize) -> Self {
        Self { run_id, documents, ..Default::default() }
    }

    pub fn record(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Inserted { triples, entities } => {
                self.succeeded += 1;
                self.triples += triples;
                self.entities += entities;
            }
            DocumentOutcome::NoContent        => self.no_content += 1,
            DocumentOutcome::AnnotationFailed => self.annotation_failed += 1,
            DocumentOutcome::NoEntities       => self.no_entities += 1,
            DocumentOutcome::NoTriples        => self.no_triples += 1,
            DocumentOutcome::DataError        => self.errors += 1,
        }
    }

    /// Documents accounted for so far.
    pub fn processed(&self) -> usize {
        self.succeeded
            + self.annotation_failed
            + self.errors
            + self.no_entities
            + self.no_triples
            + self.no_content
    }

    /// `count` as a percentage of all documents, 0 for an empty run.
    pub fn percent(&self, count: usize) -> f64 {
        if self.documents == 0 {
            return 0.0;
        }
        100.0 * count as f64 / self.documents as f64
    }

    pub fn avg_triples(&self) -> f64 {
        per_success(self.triples, self.succeeded)
    }

    pub fn avg_entities(&self) -> f64 {
        per_success(self.entities, self.succeeded)
    }

    pub fn log(&self) {
        info!(run_id = %self.run_id, elapsed = %format_duration(self.elapsed), "Extraction complete");
        info!("Succeeded:         {} ({:.3}%)", self.succeeded, self.percent(self.succeeded));
        info!("Annotation failed: {} ({:.3}%)", self.annotation_failed, self.percent(self.annotation_failed));
        info!("Errors:            {} ({:.3}%)", self.errors, self.percent(self.errors));
        info!("No entities:       {} ({:.3}%)", self.no_entities, self.percent(self.no_entities));
        info!("No triples:        {} ({:.3}%)", self.no_triples, self.percent(self.no_triples));
        info!("No content:        {} ({:.3}%)", self.no_content, self.percent(self.no_content));
        info!("Total triples:     {} (avg/document: {:.1})", self.triples, self.avg_triples());
        info!("Total entities:    {} (avg/document: {:.1})", self.entities, self.avg_entities());
    }
}

fn per_success(total: usize, succeeded: usize) -> f64 {
    if succeeded == 0 {
        return 0.0;
    }
    total as f64 / succeeded as f64
}
