//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Insert into {table} did not complete: {reason}")]
    InsertAborted { table: String, reason: String },

    #[error("Row has {actual} values, table {table} expects {expected}")]
    RowWidth { table: String, expected: usize, actual: usize },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
