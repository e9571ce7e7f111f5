//! Table and column names the pipeline reads from and writes to.
//!
//! Column order is the value order of every row handed to
//! [`RowSink::insert_rows`](crate::RowSink::insert_rows).

pub const TABLE_DOCUMENTS: &str = "documents";
pub const TABLE_TRIPLES: &str = "triples";
pub const TABLE_CONCEPTS: &str = "concepts";

/// Only abstracts are annotated.
pub const DOCUMENT_CONTENT_TYPE: &str = "abstract";

pub const TRIPLE_COLUMNS: &[&str] = &[
    "pmid",
    "triple_id",
    "pub_date",
    "subject",
    "relation",
    "object",
    "confidence",
    "sentence_number",
    "start_char",
    "end_char",
];

pub const CONCEPT_COLUMNS: &[&str] = &[
    "pmid",
    "triple_id",
    "concept_type",
    "concept_id",
    "concept_name",
    "total_concepts",
    "start_char",
    "end_char",
    "frag_start_char",
    "frag_end_char",
];
