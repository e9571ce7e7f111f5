//! litkg-kg: from annotated sentences to knowledge-graph rows.
//!
//! [`aligner`] attaches linked entities to triple fragments, [`filter`]
//! keeps the best non-redundant triples per sentence, and [`rows`] turns the
//! survivors into triples/concepts table rows.

pub mod aligner;
pub mod filter;
pub mod rows;

pub use aligner::{align_fragment, candidate_triples, fragment_layout, scale_confidence, FragmentToken};
pub use filter::TripleFilter;
pub use rows::{ConceptRow, DocumentRows, TripleRow, CONCEPT_ROLE_ORDER};
