//! PostgreSQL store.
//!
//! Handles:
//! - Abstract lookup for a batch of document ids
//! - Candidate id listing for shard partitioning
//! - Idempotent bulk INSERT (`ON CONFLICT DO NOTHING`), optionally off-thread
//!
//! sqlx is async; the store owns a small tokio runtime so callers on plain
//! worker threads can use it through the blocking trait methods.

use std::sync::Arc;

use chrono::NaiveDate;
use litkg_common::{DocumentId, DocumentRef};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::error::{DbError, Result};
use crate::handle::InsertHandle;
use crate::schema::{DOCUMENT_CONTENT_TYPE, TABLE_DOCUMENTS, TABLE_TRIPLES};
use crate::store::{DocumentSelection, DocumentStore, RowSink};
use crate::value::SqlValue;

/// PostgreSQL caps a statement at 65 535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Blocking PostgreSQL store backed by a sqlx pool.
#[derive(Clone)]
pub struct PgStore {
    runtime: Arc<Runtime>,
    pool: PgPool,
}

impl PgStore {
    /// Connect and build the runtime that drives the pool.
    pub fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("litkg-db")
            .enable_all()
            .build()?;

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(database_url),
            )
            .map_err(|e| DbError::Connection(e.to_string()))?;

        info!(max_connections, "PostgreSQL pool ready");
        Ok(Self { runtime: Arc::new(runtime), pool })
    }
}

impl DocumentStore for PgStore {
    fn query_documents(&self, ids: &[DocumentId]) -> Result<Vec<DocumentRef>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT pmid::bigint AS pmid, MAX(pub_date) AS pub_date, MAX(content) AS content \
             FROM {TABLE_DOCUMENTS} \
             WHERE content_type = $1 AND pmid = ANY($2) \
             GROUP BY pmid"
        );
        let rows: Vec<(i64, Option<NaiveDate>, Option<String>)> = self.runtime.block_on(
            sqlx::query_as(&sql)
                .bind(DOCUMENT_CONTENT_TYPE)
                .bind(ids.to_vec())
                .fetch_all(&self.pool),
        )?;

        debug!(requested = ids.len(), found = rows.len(), "Documents fetched");
        Ok(rows
            .into_iter()
            .map(|(id, pub_date, content)| DocumentRef::new(id, pub_date, content))
            .collect())
    }

    fn list_document_ids(&self, selection: &DocumentSelection) -> Result<Vec<DocumentId>> {
        let sql = if selection.include_processed {
            format!(
                "SELECT DISTINCT d.pmid::bigint FROM {TABLE_DOCUMENTS} d \
                 WHERE d.pub_date >= $1 AND d.pub_date <= $2 \
                 ORDER BY 1"
            )
        } else {
            format!(
                "SELECT DISTINCT d.pmid::bigint FROM {TABLE_DOCUMENTS} d \
                 LEFT JOIN {TABLE_TRIPLES} t ON d.pmid = t.pmid \
                 WHERE t.pmid IS NULL \
                 AND d.pub_date >= $1 AND d.pub_date <= $2 \
                 ORDER BY 1"
            )
        };
        let ids: Vec<i64> = self.runtime.block_on(
            sqlx::query_scalar(&sql)
                .bind(selection.published_from)
                .bind(selection.published_to)
                .fetch_all(&self.pool),
        )?;
        Ok(ids)
    }
}

impl RowSink for PgStore {
    fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
        threaded: bool,
    ) -> Result<Option<InsertHandle>> {
        if columns.is_empty() {
            debug!(table, "No rows inserted - no columns provided");
            return Ok(None);
        }
        if rows.is_empty() {
            debug!(table, "No rows inserted - no rows provided");
            return Ok(None);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(DbError::RowWidth {
                table: table.to_string(),
                expected: columns.len(),
                actual: bad.len(),
            });
        }

        let n_rows = rows.len();
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let insert = insert_chunked(self.pool.clone(), table.to_string(), columns, rows);

        if !threaded {
            let written = self.runtime.block_on(insert)?;
            return Ok(Some(InsertHandle::ready(table, n_rows, Ok(written))));
        }

        let task = self.runtime.spawn(insert);
        let runtime = Arc::clone(&self.runtime);
        let name = table.to_string();
        Ok(Some(InsertHandle::new(table, n_rows, move || {
            runtime
                .block_on(task)
                .map_err(|e| DbError::InsertAborted { table: name, reason: e.to_string() })?
        })))
    }
}

async fn insert_chunked(
    pool: PgPool,
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
) -> Result<u64> {
    let rows_per_statement = (MAX_BIND_PARAMS / columns.len()).max(1);
    let mut written = 0;

    for chunk in rows.chunks(rows_per_statement) {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, columns.join(", ")));
        qb.push_values(chunk, |mut b, row| {
            for value in row {
                match value {
                    SqlValue::Int(v)  => { b.push_bind(*v); }
                    SqlValue::Text(v) => { b.push_bind(v.clone()); }
                    SqlValue::Date(v) => { b.push_bind(*v); }
                }
            }
        });
        qb.push(" ON CONFLICT DO NOTHING");

        let done = qb.build().execute(&pool).await?;
        written += done.rows_affected();
    }

    debug!(table = %table, submitted = rows.len(), written, "Rows inserted");
    Ok(written)
}
