//! Row construction for the triples and concepts tables.

use chrono::NaiveDate;
use litkg_common::{ConceptRole, DocumentId, DocumentRef, KeptTriple};
use litkg_db::SqlValue;

/// Concept rows are written in this role order for every triple.
pub const CONCEPT_ROLE_ORDER: [ConceptRole; 3] =
    [ConceptRole::Object, ConceptRole::Subject, ConceptRole::Relation];

/// One row of the triples table.
#[derive(Debug, Clone, PartialEq)]
pub struct TripleRow {
    pub doc_id: DocumentId,
    pub triple_id: u32,
    pub pub_date: Option<NaiveDate>,
    pub subject: String,
    pub relation: String,
    pub object: String,
    pub confidence: Option<u8>,
    pub sentence_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// One row of the concepts table: a concept anchoring part of a triple.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptRow {
    pub doc_id: DocumentId,
    pub triple_id: u32,
    pub role: ConceptRole,
    pub concept_id: String,
    pub concept_name: String,
    /// Concepts of the same triple in the same role.
    pub total_concepts: usize,
    /// Relative to the sentence start.
    pub start_char: usize,
    pub end_char: usize,
    /// Relative to the fragment start.
    pub fragment_start_char: usize,
    pub fragment_end_char: usize,
}

impl TripleRow {
    /// Values ordered like `schema::TRIPLE_COLUMNS`.
    pub fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.doc_id),
            SqlValue::from(self.triple_id),
            SqlValue::from(self.pub_date),
            SqlValue::from(self.subject),
            SqlValue::from(self.relation),
            SqlValue::from(self.object),
            SqlValue::from(self.confidence),
            SqlValue::from(self.sentence_index),
            SqlValue::from(self.start_char),
            SqlValue::from(self.end_char),
        ]
    }
}

impl ConceptRow {
    /// Values ordered like `schema::CONCEPT_COLUMNS`.
    pub fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.doc_id),
            SqlValue::from(self.triple_id),
            SqlValue::from(self.role.as_str()),
            SqlValue::from(self.concept_id),
            SqlValue::from(self.concept_name),
            SqlValue::from(self.total_concepts),
            SqlValue::from(self.start_char),
            SqlValue::from(self.end_char),
            SqlValue::from(self.fragment_start_char),
            SqlValue::from(self.fragment_end_char),
        ]
    }
}

/// All rows produced for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentRows {
    pub triples: Vec<TripleRow>,
    pub concepts: Vec<ConceptRow>,
}

impl DocumentRows {
    pub fn build(doc: &DocumentRef, kept: &[KeptTriple]) -> Self {
        let mut rows = DocumentRows::default();
        for k in kept {
            let t = &k.triple;
            rows.triples.push(TripleRow {
                doc_id: doc.id,
                triple_id: k.triple_id,
                pub_date: doc.publication_date,
                subject: t.subject.clone(),
                relation: t.relation.clone(),
                object: t.object.clone(),
                confidence: t.confidence,
                sentence_index: t.sentence_index,
                start_char: t.sentence_start_char,
                end_char: t.sentence_end_char,
            });

            for role in CONCEPT_ROLE_ORDER {
                let spans = t.entities(role);
                rows.concepts.extend(spans.iter().map(|span| ConceptRow {
                    doc_id: doc.id,
                    triple_id: k.triple_id,
                    role,
                    concept_id: span.entity.concept_id.clone(),
                    concept_name: span.entity.canonical_name.clone(),
                    total_concepts: spans.len(),
                    start_char: span.sentence_start_char,
                    end_char: span.sentence_end_char,
                    fragment_start_char: span.fragment_start_char,
                    fragment_end_char: span.fragment_end_char,
                }));
            }
        }
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn append(&mut self, other: DocumentRows) {
        self.triples.extend(other.triples);
        self.concepts.extend(other.concepts);
    }

    /// Split into `(triple values, concept values)` for the sink.
    pub fn into_values(self) -> (Vec<Vec<SqlValue>>, Vec<Vec<SqlValue>>) {
        (
            self.triples.into_iter().map(TripleRow::into_values).collect(),
            self.concepts.into_iter().map(ConceptRow::into_values).collect(),
        )
    }
}
