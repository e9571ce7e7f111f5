//! litkg-common: Shared data model and timing utilities used across all litkg crates.

pub mod entities;
pub mod timing;

// Re-export commonly used types
pub use entities::{
    CandidateTriple, ConceptRole, DocumentId, DocumentRef, Entity, EntityIndex, KeptTriple,
    Shard, TokenSpan,
};
pub use timing::{format_duration, Phase, PhaseTimings};
