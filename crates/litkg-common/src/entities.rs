//! Core types flowing through the extraction pipeline.
//! Documents come from the store, entities from the linker, triples from the
//! annotator; rows for the sink are built from `KeptTriple`s.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Document identifier (a PubMed id in practice).
pub type DocumentId = i64;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document row as returned by the store. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub publication_date: Option<NaiveDate>,
    pub content: Option<String>,
}

impl DocumentRef {
    pub fn new(id: DocumentId, publication_date: Option<NaiveDate>, content: Option<String>) -> Self {
        Self { id, publication_date, content }
    }

    /// The document text, or `None` when it is missing or whitespace-only.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn has_content(&self) -> bool {
        self.text().is_some()
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A linked biomedical concept found in a document's text.
/// Offsets are document-absolute character positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(alias = "id")]
    pub concept_id: String,
    #[serde(alias = "name")]
    pub canonical_name: String,
    pub start_char: usize,
    pub end_char: usize,
}

/// Entities of one document keyed by `start_char`.
///
/// Inserting at an occupied start position replaces the previous entity, so
/// when several linkers are merged the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityIndex(BTreeMap<usize, Entity>);

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, returning the one it replaced.
    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        self.0.insert(entity.start_char, entity)
    }

    pub fn get(&self, start_char: usize) -> Option<&Entity> {
        self.0.get(&start_char)
    }

    /// Merge `other` into `self`; entries of `other` win on collisions.
    /// Returns how many existing entries were overwritten.
    pub fn merge(&mut self, other: EntityIndex) -> usize {
        let mut replaced = 0;
        for (_, entity) in other.0 {
            if self.insert(entity).is_some() {
                replaced += 1;
            }
        }
        replaced
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.values()
    }
}

impl FromIterator<Entity> for EntityIndex {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut index = EntityIndex::new();
        for entity in iter {
            index.insert(entity);
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Token spans
// ---------------------------------------------------------------------------

/// An entity-bearing token of a triple fragment, carried in both coordinate
/// systems: relative to the sentence start, and relative to the fragment text
/// (which may reorder or normalize the sentence's tokens).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub sentence_start_char: usize,
    pub sentence_end_char: usize,
    pub fragment_start_char: usize,
    pub fragment_end_char: usize,
    pub text: String,
    pub entity: Entity,
}

// ---------------------------------------------------------------------------
// Triples
// ---------------------------------------------------------------------------

/// Which part of a triple a concept anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptRole {
    Subject,
    Relation,
    Object,
}

impl ConceptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptRole::Subject  => "subject",
            ConceptRole::Relation => "relation",
            ConceptRole::Object   => "object",
        }
    }
}

/// A raw (subject, relation, object) extraction from one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTriple {
    pub subject: String,
    pub relation: String,
    pub object: String,
    /// Extractor confidence scaled to 0..=100, if the extractor reported one.
    pub confidence: Option<u8>,
    pub sentence_index: usize,
    /// Document-absolute character range of the sentence.
    pub sentence_start_char: usize,
    pub sentence_end_char: usize,
    pub subject_entities: Vec<TokenSpan>,
    pub relation_entities: Vec<TokenSpan>,
    pub object_entities: Vec<TokenSpan>,
}

impl CandidateTriple {
    /// Both subject and object carry at least one concept.
    pub fn is_anchored(&self) -> bool {
        !self.subject_entities.is_empty() && !self.object_entities.is_empty()
    }

    pub fn subject_concepts(&self) -> BTreeSet<&str> {
        concept_ids(&self.subject_entities)
    }

    pub fn object_concepts(&self) -> BTreeSet<&str> {
        concept_ids(&self.object_entities)
    }

    pub fn entities(&self, role: ConceptRole) -> &[TokenSpan] {
        match role {
            ConceptRole::Subject  => &self.subject_entities,
            ConceptRole::Relation => &self.relation_entities,
            ConceptRole::Object   => &self.object_entities,
        }
    }
}

fn concept_ids(spans: &[TokenSpan]) -> BTreeSet<&str> {
    spans.iter().map(|s| s.entity.concept_id.as_str()).collect()
}

/// A candidate that survived filtering, numbered in keep-order within its
/// document. `triple_id` joins triple rows to concept rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeptTriple {
    pub triple_id: u32,
    pub triple: CandidateTriple,
}

// ---------------------------------------------------------------------------
// Shards
// ---------------------------------------------------------------------------

/// The slice of document ids assigned to one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub index: usize,
    pub document_ids: Vec<DocumentId>,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.document_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty()
    }
}
