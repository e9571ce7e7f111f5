//! Store and sink interfaces consumed by the extraction pipeline.

use chrono::NaiveDate;
use litkg_common::{DocumentId, DocumentRef};
use tracing::debug;

use crate::error::Result;
use crate::handle::InsertHandle;
use crate::value::SqlValue;

/// Which documents a partitioning run should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelection {
    /// Inclusive publication date bounds.
    pub published_from: NaiveDate,
    pub published_to: NaiveDate,
    /// When false, documents that already have triples are skipped.
    pub include_processed: bool,
}

/// Read side of the document store.
pub trait DocumentStore: Send + Sync {
    /// One row per requested id that exists, carrying the latest publication
    /// date and the abstract text. Ids without a row are simply absent.
    fn query_documents(&self, ids: &[DocumentId]) -> Result<Vec<DocumentRef>>;

    /// Distinct ids matching `selection`, in ascending id order.
    fn list_document_ids(&self, selection: &DocumentSelection) -> Result<Vec<DocumentId>>;
}

/// Write side. Duplicate-key rows are ignored.
pub trait RowSink: Send + Sync {
    /// Insert `rows` (each ordered like `columns`) into `table`.
    ///
    /// With `threaded` the insert runs off the calling thread and the
    /// returned handle must be waited on; otherwise it has completed by the
    /// time this returns. `None` means there was nothing to insert.
    fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
        threaded: bool,
    ) -> Result<Option<InsertHandle>>;
}

/// A sink that writes nothing. Used when database inserts are disabled.
#[derive(Debug, Clone, Default)]
pub struct DryRunSink;

impl RowSink for DryRunSink {
    fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
        _threaded: bool,
    ) -> Result<Option<InsertHandle>> {
        if columns.is_empty() || rows.is_empty() {
            return Ok(None);
        }
        debug!(table, rows = rows.len(), "[Database insertion disabled] insert skipped");
        Ok(Some(InsertHandle::ready(table, rows.len(), Ok(0))))
    }
}
