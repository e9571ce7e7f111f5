//! litkg Database Layer
//!
//! Blocking store and sink interfaces used by the extraction workers, plus
//! their implementations:
//!
//! - [`PgStore`]: PostgreSQL via sqlx. Inserts can run off the calling
//!   thread and are awaited through an [`InsertHandle`].
//! - [`DryRunSink`]: logs what would be written, writes nothing.
//! - [`MemoryStore`]: in-process store for tests and local runs.
//!
//! Inserts are idempotent: rows whose key already exists are ignored, so a
//! shard can be re-run after a crash.
//!
//! # Example
//!
//! ```rust,no_run
//! use litkg_db::{PgStore, RowSink, schema};
//!
//! fn main() -> litkg_db::Result<()> {
//!     let store = PgStore::connect("postgres://litkg@localhost/litkg", 4)?;
//!     let handle = store.insert_rows(schema::TABLE_TRIPLES, schema::TRIPLE_COLUMNS, Vec::new(), true)?;
//!     if let Some(handle) = handle {
//!         handle.wait()?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod handle;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{DbError, Result};
pub use handle::InsertHandle;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{DocumentSelection, DocumentStore, DryRunSink, RowSink};
pub use value::SqlValue;
