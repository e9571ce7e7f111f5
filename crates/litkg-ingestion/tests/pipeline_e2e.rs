//! End-to-end extraction runs against the in-memory store.
//!
//! The annotator splits text on whitespace and reports one open-IE triple
//! per sentence (first token, second token, remaining tokens). The linker
//! tags every capitalized word as a concept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use litkg_common::{DocumentRef, Entity, EntityIndex};
use litkg_db::schema::{TABLE_CONCEPTS, TABLE_TRIPLES};
use litkg_db::{DryRunSink, MemoryStore, SqlValue};
use litkg_ingestion::{BatchPipeline, PipelineConfig, PipelineError, RunSummary};
use litkg_ner::protocol::{OpenIeTriple, Sentence, Token, TokenRange};
use litkg_ner::{AnnotateError, AnnotatedDocument, Annotator, EntityLinker, LinkerError, MemoryProbe};
use pretty_assertions::assert_eq;

// ── Fakes ────────────────────────────────────────────────────────────────────

fn words(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

#[derive(Default)]
struct WhitespaceAnnotator {
    failed: AtomicBool,
}

impl Annotator for WhitespaceAnnotator {
    fn annotate(&self, text: &str) -> litkg_ner::Result<AnnotatedDocument> {
        if text.starts_with("TIMEOUT") {
            return Err(AnnotateError::Timeout("read timed out".to_string()));
        }
        let tokens: Vec<Token> = words(text)
            .into_iter()
            .enumerate()
            .map(|(i, (begin, word))| Token {
                index: i + 1,
                word: word.to_lowercase(),
                original_text: word.to_string(),
                lemma: None,
                begin_char: begin,
                end_char: begin + word.len(),
            })
            .collect();

        let mut openie = Vec::new();
        if tokens.len() >= 3 {
            let fragment = |r: std::ops::Range<usize>| {
                tokens[r].iter().map(|t| t.original_text.as_str()).collect::<Vec<_>>().join(" ")
            };
            openie.push(OpenIeTriple {
                subject: fragment(0..1),
                subject_span: TokenRange(0, 1),
                relation: fragment(1..2),
                relation_span: TokenRange(1, 2),
                object: fragment(2..tokens.len()),
                object_span: TokenRange(2, tokens.len()),
                confidence: Some(0.9),
            });
        }

        Ok(AnnotatedDocument {
            sentences: vec![Sentence {
                index: 0,
                begin_char: Some(0),
                end_char: Some(text.len()),
                tokens,
                openie,
            }],
        })
    }

    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

struct CapitalizedLinker;

impl EntityLinker for CapitalizedLinker {
    fn link(&self, text: &str) -> Result<EntityIndex, LinkerError> {
        if text.contains("UNLINKABLE") {
            return Err(LinkerError::NoEndpoints);
        }
        Ok(words(text)
            .into_iter()
            .filter(|(_, w)| w.starts_with(|c: char| c.is_ascii_uppercase()))
            .map(|(start, w)| Entity {
                concept_id: format!("C:{}", w.to_lowercase()),
                canonical_name: w.to_string(),
                start_char: start,
                end_char: start + w.len(),
            })
            .collect())
    }
}

/// Two overlapping triples for "BRCA1 mutation increases risk of breast cancer".
struct OverlappingTriplesAnnotator;

impl Annotator for OverlappingTriplesAnnotator {
    fn annotate(&self, text: &str) -> litkg_ner::Result<AnnotatedDocument> {
        let mut document = WhitespaceAnnotator::default().annotate(text)?;
        for sentence in &mut document.sentences {
            if sentence.tokens.len() < 7 {
                sentence.openie.clear();
                continue;
            }
            sentence.openie = vec![
                OpenIeTriple {
                    subject: "BRCA1".to_string(),
                    subject_span: TokenRange(0, 1),
                    relation: "associated_with".to_string(),
                    relation_span: TokenRange(2, 3),
                    object: "breast".to_string(),
                    object_span: TokenRange(5, 6),
                    confidence: Some(0.8),
                },
                OpenIeTriple {
                    subject: "BRCA1 mutation".to_string(),
                    subject_span: TokenRange(0, 2),
                    relation: "increases risk of".to_string(),
                    relation_span: TokenRange(2, 5),
                    object: "breast cancer".to_string(),
                    object_span: TokenRange(5, 7),
                    confidence: Some(0.9),
                },
            ];
        }
        Ok(document)
    }

    fn is_failed(&self) -> bool {
        false
    }
}

/// Links fixed words to fixed concepts regardless of case.
struct LexiconLinker(&'static [(&'static str, &'static str)]);

impl EntityLinker for LexiconLinker {
    fn link(&self, text: &str) -> Result<EntityIndex, LinkerError> {
        Ok(words(text)
            .into_iter()
            .filter_map(|(start, w)| {
                let (_, id) = self.0.iter().find(|(word, _)| *word == w)?;
                Some(Entity {
                    concept_id: id.to_string(),
                    canonical_name: w.to_string(),
                    start_char: start,
                    end_char: start + w.len(),
                })
            })
            .collect())
    }
}

/// Annotates normally, then reports the service as failed.
#[derive(Default)]
struct FailsAfterFirstCall {
    inner: WhitespaceAnnotator,
}

impl Annotator for FailsAfterFirstCall {
    fn annotate(&self, text: &str) -> litkg_ner::Result<AnnotatedDocument> {
        let document = self.inner.annotate(text);
        self.inner.failed.store(true, Ordering::SeqCst);
        document
    }

    fn is_failed(&self) -> bool {
        self.inner.is_failed()
    }
}

struct FixedMemory;

impl MemoryProbe for FixedMemory {
    fn used_percent(&self) -> f32 {
        42.0
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

fn doc(id: i64, content: Option<&str>) -> DocumentRef {
    DocumentRef::new(id, NaiveDate::from_ymd_opt(2021, 3, 4), content.map(str::to_string))
}

fn config(batch_size: usize, threaded_inserts: bool) -> PipelineConfig {
    PipelineConfig { batch_size, threads: 3, threaded_inserts }
}

fn pipeline(store: &MemoryStore, annotator: Arc<WhitespaceAnnotator>, config: PipelineConfig) -> BatchPipeline {
    BatchPipeline::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        annotator,
        Arc::new(CapitalizedLinker),
        config,
    )
    .with_memory_probe(Arc::new(FixedMemory))
}

fn run(store: &MemoryStore, ids: &[i64], config: PipelineConfig) -> Result<RunSummary, PipelineError> {
    pipeline(store, Arc::new(WhitespaceAnnotator::default()), config).run(ids)
}

fn pmids(rows: &[Vec<SqlValue>]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows.iter().filter_map(|r| r[0].as_int()).collect();
    ids.sort_unstable();
    ids
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn test_mixed_batch_outcomes() {
    let store = MemoryStore::with_documents([
        doc(1, Some("Aspirin inhibits COX2")),
        doc(2, Some("   ")),
        doc(3, Some("TIMEOUT on this one")),
        doc(4, Some("the cat sat quietly")),
        doc(5, Some("Aspirin is harmless")),
        doc(6, None),
        doc(7, Some("Metformin UNLINKABLE Insulin")),
    ]);

    let summary = run(&store, &[1, 2, 3, 4, 5, 6, 7, 8], config(1000, true)).unwrap();

    assert_eq!(summary.documents, 8);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.no_content, 3);
    assert_eq!(summary.annotation_failed, 1);
    assert_eq!(summary.no_entities, 1);
    assert_eq!(summary.no_triples, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.processed(), summary.documents);
    assert_eq!(summary.triples, 1);
    assert_eq!(summary.entities, 2);

    let triples = store.rows(TABLE_TRIPLES);
    assert_eq!(pmids(&triples), vec![1]);
    let row = &triples[0];
    assert_eq!(row[3].as_text(), Some("Aspirin"));
    assert_eq!(row[4].as_text(), Some("inhibits"));
    assert_eq!(row[5].as_text(), Some("COX2"));
    assert_eq!(row[6].as_int(), Some(90));

    let concepts = store.rows(TABLE_CONCEPTS);
    assert_eq!(pmids(&concepts), vec![1, 1]);
    let names: Vec<&str> = concepts.iter().filter_map(|r| r[4].as_text()).collect();
    assert_eq!(names, vec!["COX2", "Aspirin"]);

    assert_eq!(summary.rows_written, 3);
}

#[test]
fn test_results_independent_of_batching() {
    let docs: Vec<DocumentRef> = (1..=9)
        .map(|id| doc(id, Some(&format!("Gene{id} regulates Protein{id} expression"))))
        .collect();
    let ids: Vec<i64> = (1..=9).collect();

    let whole = MemoryStore::with_documents(docs.clone());
    let split = MemoryStore::with_documents(docs);
    let a = run(&whole, &ids, config(1000, false)).unwrap();
    let b = run(&split, &ids, config(2, true)).unwrap();

    assert_eq!(a.succeeded, 9);
    assert_eq!(b.succeeded, 9);
    assert_eq!(a.triples, b.triples);
    assert_eq!(pmids(&whole.rows(TABLE_TRIPLES)), pmids(&split.rows(TABLE_TRIPLES)));
    assert_eq!(whole.rows(TABLE_CONCEPTS).len(), split.rows(TABLE_CONCEPTS).len());
}

#[test]
fn test_at_most_one_batch_of_inserts_in_flight() {
    let store = MemoryStore::with_documents(
        (1..=6).map(|id| doc(id, Some("Aspirin inhibits COX2"))),
    )
    .with_insert_delay(Duration::from_millis(40));
    let ids: Vec<i64> = (1..=6).collect();

    let summary = run(&store, &ids, config(1, true)).unwrap();

    assert_eq!(summary.succeeded, 6);
    // Two tables per batch; the previous batch is drained first.
    assert_eq!(store.insert_calls(), 12);
    assert!(store.max_in_flight() <= 2, "max in flight was {}", store.max_in_flight());
    assert_eq!(store.rows(TABLE_TRIPLES).len(), 6);
}

#[test]
fn test_rerun_is_idempotent() {
    let store = MemoryStore::with_documents([doc(1, Some("Aspirin inhibits COX2"))]);
    let first = run(&store, &[1], config(10, true)).unwrap();
    let second = run(&store, &[1], config(10, true)).unwrap();

    assert_eq!(first.rows_written, 3);
    assert_eq!(second.rows_written, 0);
    assert_eq!(store.rows(TABLE_TRIPLES).len(), 1);
}

#[test]
fn test_empty_id_list() {
    let store = MemoryStore::new();
    let summary = run(&store, &[], config(10, true)).unwrap();
    assert_eq!(summary.documents, 0);
    assert_eq!(summary.processed(), 0);
    assert_eq!(store.insert_calls(), 0);
}

#[test]
fn test_query_failure_aborts_run() {
    let store = MemoryStore::with_documents([doc(1, Some("Aspirin inhibits COX2"))]);
    store.fail_queries(true);
    let err = run(&store, &[1], config(10, true)).unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)), "{err}");
}

#[test]
fn test_insert_failure_aborts_run() {
    for threaded in [true, false] {
        let store = MemoryStore::with_documents([doc(1, Some("Aspirin inhibits COX2"))]);
        store.fail_inserts(true);
        let err = run(&store, &[1], config(10, threaded)).unwrap_err();
        assert!(matches!(err, PipelineError::Insert { .. }), "{err}");
    }
}

#[test]
fn test_failed_gateway_aborts_run() {
    let store = MemoryStore::with_documents([doc(1, Some("Aspirin inhibits COX2"))]);
    let annotator = Arc::new(WhitespaceAnnotator::default());
    annotator.failed.store(true, Ordering::SeqCst);

    let err = pipeline(&store, annotator, config(10, true)).run(&[1]).unwrap_err();
    assert!(matches!(err, PipelineError::GatewayFailed(_)), "{err}");
    assert!(store.rows(TABLE_TRIPLES).is_empty());
}

#[test]
fn test_dry_run_writes_nothing() {
    let store = MemoryStore::with_documents([doc(1, Some("Aspirin inhibits COX2"))]);
    let summary = BatchPipeline::new(
        Arc::new(store.clone()),
        Arc::new(DryRunSink),
        Arc::new(WhitespaceAnnotator::default()),
        Arc::new(CapitalizedLinker),
        config(10, true),
    )
    .with_memory_probe(Arc::new(FixedMemory))
    .run(&[1])
    .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.rows_written, 0);
    assert!(store.rows(TABLE_TRIPLES).is_empty());
}

#[test]
fn test_subsumed_triple_dropped_in_mixed_batch() {
    let store = MemoryStore::with_documents([
        doc(1, Some("BRCA1 mutation increases risk of breast cancer")),
        doc(2, Some("")),
        doc(3, Some("TIMEOUT while annotating")),
    ]);
    let linker = LexiconLinker(&[("BRCA1", "c1"), ("breast", "c2"), ("cancer", "c3")]);

    let summary = BatchPipeline::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(OverlappingTriplesAnnotator),
        Arc::new(linker),
        config(10, true),
    )
    .with_memory_probe(Arc::new(FixedMemory))
    .run(&[1, 2, 3])
    .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.no_content, 1);
    assert_eq!(summary.annotation_failed, 1);
    assert_eq!(summary.no_triples, 0);
    assert_eq!(summary.triples, 1);

    let triples = store.rows(TABLE_TRIPLES);
    assert_eq!(triples.len(), 1);
    assert_eq!(triples[0][3].as_text(), Some("BRCA1 mutation"));
    assert_eq!(triples[0][4].as_text(), Some("increases risk of"));
    assert_eq!(triples[0][5].as_text(), Some("breast cancer"));

    let concepts = store.rows(TABLE_CONCEPTS);
    let ids: Vec<&str> = concepts.iter().filter_map(|r| r[3].as_text()).collect();
    assert_eq!(ids, vec!["c2", "c3", "c1"]);
}

#[test]
fn test_abort_drains_pending_inserts() {
    let store = MemoryStore::with_documents([
        doc(1, Some("Aspirin inhibits COX2")),
        doc(2, Some("Ibuprofen inhibits COX1")),
    ])
    .with_insert_delay(Duration::from_millis(40));

    let err = BatchPipeline::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(FailsAfterFirstCall::default()),
        Arc::new(CapitalizedLinker),
        config(1, true),
    )
    .with_memory_probe(Arc::new(FixedMemory))
    .run(&[1, 2])
    .unwrap_err();

    assert!(matches!(err, PipelineError::GatewayFailed(_)), "{err}");
    // The first batch's inserts were still in flight when the run aborted.
    assert_eq!(pmids(&store.rows(TABLE_TRIPLES)), vec![1]);
    assert_eq!(store.rows(TABLE_CONCEPTS).len(), 2);
}
