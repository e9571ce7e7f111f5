//! In-process store. Backs tests and `--dry-run`-style local runs without a
//! database server.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use litkg_common::{DocumentId, DocumentRef};

use crate::error::{DbError, Result};
use crate::handle::InsertHandle;
use crate::schema::TABLE_TRIPLES;
use crate::store::{DocumentSelection, DocumentStore, RowSink};
use crate::value::SqlValue;

#[derive(Default)]
struct Tables {
    documents: BTreeMap<DocumentId, DocumentRef>,
    rows: HashMap<String, Vec<Vec<SqlValue>>>,
}

#[derive(Default)]
struct Counters {
    fail_queries: AtomicBool,
    fail_inserts: AtomicBool,
    insert_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Documents and written rows held in memory. Cloning shares the contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    counters: Arc<Counters>,
    insert_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = DocumentRef>) -> Self {
        let store = Self::new();
        for doc in documents {
            store.add_document(doc);
        }
        store
    }

    /// Slow every insert down by `delay`. Useful to observe write overlap.
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    pub fn add_document(&self, doc: DocumentRef) {
        self.lock().documents.insert(doc.id, doc);
    }

    /// Make every subsequent document query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.counters.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent insert fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.counters.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Rows written to `table` so far, in write order.
    pub fn rows(&self, table: &str) -> Vec<Vec<SqlValue>> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    /// Number of non-empty `insert_rows` calls.
    pub fn insert_calls(&self) -> usize {
        self.counters.insert_calls.load(Ordering::SeqCst)
    }

    /// Highest number of inserts that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn query_documents(&self, ids: &[DocumentId]) -> Result<Vec<DocumentRef>> {
        if self.counters.fail_queries.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("document query failed".to_string()));
        }
        let tables = self.lock();
        Ok(ids.iter().filter_map(|id| tables.documents.get(id).cloned()).collect())
    }

    fn list_document_ids(&self, selection: &DocumentSelection) -> Result<Vec<DocumentId>> {
        let tables = self.lock();
        let processed: Vec<i64> = tables
            .rows
            .get(TABLE_TRIPLES)
            .map(|rows| rows.iter().filter_map(|r| r.first().and_then(SqlValue::as_int)).collect())
            .unwrap_or_default();

        Ok(tables
            .documents
            .values()
            .filter(|d| {
                d.publication_date
                    .map(|p| p >= selection.published_from && p <= selection.published_to)
                    .unwrap_or(false)
            })
            .filter(|d| selection.include_processed || !processed.contains(&d.id))
            .map(|d| d.id)
            .collect())
    }
}

impl RowSink for MemoryStore {
    fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
        threaded: bool,
    ) -> Result<Option<InsertHandle>> {
        if columns.is_empty() || rows.is_empty() {
            return Ok(None);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(DbError::RowWidth {
                table: table.to_string(),
                expected: columns.len(),
                actual: bad.len(),
            });
        }

        let counters = Arc::clone(&self.counters);
        counters.insert_calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let n_rows = rows.len();
        let store = self.clone();
        let name = table.to_string();
        let write = move || {
            if let Some(delay) = store.insert_delay {
                std::thread::sleep(delay);
            }
            let result = store.write(&name, rows);
            store.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        };

        if threaded {
            InsertHandle::spawn(table, n_rows, write).map(Some)
        } else {
            let result = write();
            Ok(Some(InsertHandle::ready(table, n_rows, result)))
        }
    }
}

impl MemoryStore {
    fn write(&self, table: &str, rows: Vec<Vec<SqlValue>>) -> Result<u64> {
        if self.counters.fail_inserts.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(format!("insert into {table} failed")));
        }
        let mut tables = self.lock();
        let stored = tables.rows.entry(table.to_string()).or_default();
        let mut written = 0;
        for row in rows {
            if !stored.contains(&row) {
                stored.push(row);
                written += 1;
            }
        }
        Ok(written)
    }
}
