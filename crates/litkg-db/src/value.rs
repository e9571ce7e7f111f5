//! Typed cell values for row inserts.
//!
//! Nullability is carried per type so a NULL still binds with the column's
//! SQL type.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(Option<i64>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
}

impl SqlValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => *v,
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => v.as_deref(),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self { SqlValue::Int(Some(v)) }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self { SqlValue::Int(Some(i64::from(v))) }
}

impl From<usize> for SqlValue {
    fn from(v: usize) -> Self { SqlValue::Int(i64::try_from(v).ok()) }
}

impl From<Option<u8>> for SqlValue {
    fn from(v: Option<u8>) -> Self { SqlValue::Int(v.map(i64::from)) }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self { SqlValue::Text(Some(v.to_string())) }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self { SqlValue::Text(Some(v)) }
}

impl From<Option<NaiveDate>> for SqlValue {
    fn from(v: Option<NaiveDate>) -> Self { SqlValue::Date(v) }
}
