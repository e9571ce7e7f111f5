//! Handles to inserts that may still be running.

use std::fmt;
use std::thread::JoinHandle;

use crate::error::{DbError, Result};

type Waiter = Box<dyn FnOnce() -> Result<u64> + Send>;

/// A pending insert. `wait` blocks until the sink acknowledges the rows and
/// returns how many were actually written (duplicates are not counted).
pub struct InsertHandle {
    table: String,
    rows: usize,
    waiter: Waiter,
}

impl fmt::Debug for InsertHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertHandle")
            .field("table", &self.table)
            .field("rows", &self.rows)
            .finish()
    }
}

impl InsertHandle {
    /// Wrap an arbitrary blocking wait.
    pub fn new(
        table: impl Into<String>,
        rows: usize,
        waiter: impl FnOnce() -> Result<u64> + Send + 'static,
    ) -> Self {
        Self { table: table.into(), rows, waiter: Box::new(waiter) }
    }

    /// A handle whose outcome is already known.
    pub fn ready(table: impl Into<String>, rows: usize, result: Result<u64>) -> Self {
        Self::new(table, rows, move || result)
    }

    /// Run `insert` on a dedicated OS thread.
    pub fn spawn(
        table: impl Into<String>,
        rows: usize,
        insert: impl FnOnce() -> Result<u64> + Send + 'static,
    ) -> Result<Self> {
        let table = table.into();
        let join: JoinHandle<Result<u64>> = std::thread::Builder::new()
            .name(format!("insert-{table}"))
            .spawn(insert)?;
        let name = table.clone();
        Ok(Self::new(table, rows, move || {
            join.join().map_err(|_| DbError::InsertAborted {
                table: name,
                reason: "insert thread panicked".to_string(),
            })?
        }))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of rows submitted with this insert.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn wait(self) -> Result<u64> {
        (self.waiter)()
    }
}
