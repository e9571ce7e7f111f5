//! Typed view of the annotation server's JSON output.
//!
//! Only the parts the pipeline reads are modelled: sentences, their tokens
//! and the open-IE triples. Unknown fields are ignored.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// An annotated document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnnotatedDocument {
    #[serde(default)]
    pub sentences: Vec<Sentence>,
}

impl AnnotatedDocument {
    pub fn triple_count(&self) -> usize {
        self.sentences.iter().map(|s| s.openie.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Sentence {
    #[serde(default)]
    pub index: usize,
    #[serde(rename = "characterOffsetBegin", default)]
    pub begin_char: Option<usize>,
    #[serde(rename = "characterOffsetEnd", default)]
    pub end_char: Option<usize>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub openie: Vec<OpenIeTriple>,
}

impl Sentence {
    /// Document-absolute character range of the sentence.
    ///
    /// Falls back to the first and last token when the server does not report
    /// the range explicitly. `None` for a sentence with neither.
    pub fn char_range(&self) -> Option<(usize, usize)> {
        let begin = self.begin_char.or_else(|| self.tokens.first().map(|t| t.begin_char))?;
        let end = self.end_char.or_else(|| self.tokens.last().map(|t| t.end_char))?;
        Some((begin, end))
    }

    /// Token at a 0-based position, as referenced by triple spans.
    pub fn token(&self, position: usize) -> Option<&Token> {
        self.tokens.get(position)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Token {
    /// 1-based position in the sentence.
    #[serde(default)]
    pub index: usize,
    /// Normalized form.
    #[serde(default)]
    pub word: String,
    #[serde(rename = "originalText", default)]
    pub original_text: String,
    #[serde(default)]
    pub lemma: Option<String>,
    #[serde(rename = "characterOffsetBegin")]
    pub begin_char: usize,
    #[serde(rename = "characterOffsetEnd")]
    pub end_char: usize,
}

/// `[begin, end)` token positions into the owning sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenRange(pub usize, pub usize);

impl TokenRange {
    pub fn positions(&self) -> Range<usize> {
        self.0..self.1.max(self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OpenIeTriple {
    pub subject: String,
    #[serde(rename = "subjectSpan")]
    pub subject_span: TokenRange,
    pub relation: String,
    #[serde(rename = "relationSpan")]
    pub relation_span: TokenRange,
    pub object: String,
    #[serde(rename = "objectSpan")]
    pub object_span: TokenRange,
    /// In `[0, 1]` when the extractor reports it.
    #[serde(default)]
    pub confidence: Option<f64>,
}

// ── Request properties ──────────────────────────────────────────────────────

/// Server-side pipeline properties sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnnotationProperties(BTreeMap<String, String>);

impl AnnotationProperties {
    /// Open-IE configuration used for triple extraction.
    pub fn openie(annotators: &str, threads: usize) -> Self {
        let mut props = BTreeMap::new();
        props.insert("annotators".to_string(), annotators.to_string());
        props.insert("outputFormat".to_string(), "json".to_string());
        props.insert("openie.max_entailments_per_clause".to_string(), "1".to_string());
        props.insert("openie.triple.strict".to_string(), "false".to_string());
        props.insert("openie.triple.all_nominals".to_string(), "true".to_string());
        props.insert("openie.threads".to_string(), threads.to_string());
        props.insert(
            "tokenize.options".to_string(),
            "splitHyphenated=false,splitAssimilations=false".to_string(),
        );
        Self(props)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }
}
