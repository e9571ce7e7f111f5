//! Entity alignment for triple fragments.
//!
//! A triple's subject, relation and object are each given as a run of token
//! positions into the sentence. The fragment text is those tokens joined by
//! single spaces, so a token's fragment offset differs from its sentence
//! offset whenever the extractor reorders or drops tokens. Entities are keyed
//! by document-absolute start character and are matched against the token's
//! document start.

use litkg_common::{CandidateTriple, EntityIndex, TokenSpan};
use litkg_ner::protocol::{AnnotatedDocument, Sentence, Token, TokenRange};
use tracing::debug;

/// A fragment token with its character range inside the fragment text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentToken<'a> {
    pub token: &'a Token,
    pub fragment_start_char: usize,
    pub fragment_end_char: usize,
}

/// Fragment offsets for every token of `range` that exists in the sentence.
pub fn fragment_layout(sentence: &Sentence, range: TokenRange) -> Vec<FragmentToken<'_>> {
    let mut pos = 0;
    let mut layout = Vec::new();
    for position in range.positions() {
        let Some(token) = sentence.token(position) else {
            continue;
        };
        let len = token.original_text.chars().count();
        layout.push(FragmentToken {
            token,
            fragment_start_char: pos,
            fragment_end_char: pos + len,
        });
        pos += len + 1;
    }
    layout
}

/// Entity-bearing tokens of one fragment.
///
/// `sentence_begin` is the document offset of the sentence. Tokens whose
/// start has no entity contribute nothing; when the linker and the annotator
/// tokenize differently the entity is silently lost.
pub fn align_fragment(
    sentence: &Sentence,
    sentence_begin: usize,
    range: TokenRange,
    entities: &EntityIndex,
) -> Vec<TokenSpan> {
    fragment_layout(sentence, range)
        .into_iter()
        .filter_map(|ft| {
            let entity = entities.get(ft.token.begin_char)?;
            Some(TokenSpan {
                sentence_start_char: ft.token.begin_char.saturating_sub(sentence_begin),
                sentence_end_char: ft.token.end_char.saturating_sub(sentence_begin),
                fragment_start_char: ft.fragment_start_char,
                fragment_end_char: ft.fragment_end_char,
                text: ft.token.original_text.clone(),
                entity: entity.clone(),
            })
        })
        .collect()
}

/// Extractor confidence in `[0, 1]` as a whole percentage. Zero and
/// non-finite values are treated as absent.
pub fn scale_confidence(confidence: Option<f64>) -> Option<u8> {
    confidence
        .filter(|c| c.is_finite() && *c != 0.0)
        .map(|c| (c * 100.0).trunc().clamp(0.0, 100.0) as u8)
}

/// Every open-IE triple of the document, with its fragments aligned.
pub fn candidate_triples(document: &AnnotatedDocument, entities: &EntityIndex) -> Vec<CandidateTriple> {
    let mut candidates = Vec::with_capacity(document.triple_count());

    for (sentence_index, sentence) in document.sentences.iter().enumerate() {
        if sentence.openie.is_empty() {
            continue;
        }
        let Some((begin, end)) = sentence.char_range() else {
            debug!(sentence_index, "Sentence without offsets or tokens; triples skipped");
            continue;
        };

        for triple in &sentence.openie {
            candidates.push(CandidateTriple {
                subject: triple.subject.clone(),
                relation: triple.relation.clone(),
                object: triple.object.clone(),
                confidence: scale_confidence(triple.confidence),
                sentence_index,
                sentence_start_char: begin,
                sentence_end_char: end,
                subject_entities: align_fragment(sentence, begin, triple.subject_span, entities),
                relation_entities: align_fragment(sentence, begin, triple.relation_span, entities),
                object_entities: align_fragment(sentence, begin, triple.object_span, entities),
            });
        }
    }
    candidates
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    fn sentence_of(words: &[String]) -> Sentence {
        let mut begin = 0;
        let tokens = words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let len = w.chars().count();
                let token = Token {
                    index: i + 1,
                    word: w.to_lowercase(),
                    original_text: w.clone(),
                    lemma: None,
                    begin_char: begin,
                    end_char: begin + len,
                };
                begin += len + 1;
                token
            })
            .collect();
        Sentence { tokens, ..Sentence::default() }
    }

    fn char_slice(text: &str, start: usize, end: usize) -> String {
        text.chars().skip(start).take(end - start).collect()
    }

    proptest! {
        #[test]
        fn fragment_offsets_slice_joined_text(
            words in prop::collection::vec("[a-zA-Z0-9äöüé漢字-]{1,8}", 0..12),
            begin in 0usize..16,
            end in 0usize..16,
        ) {
            let sentence = sentence_of(&words);
            let range = TokenRange(begin, end);
            let layout = fragment_layout(&sentence, range);

            let fragment = range
                .positions()
                .filter_map(|p| words.get(p))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");

            for ft in &layout {
                prop_assert_eq!(
                    char_slice(&fragment, ft.fragment_start_char, ft.fragment_end_char),
                    ft.token.original_text.clone()
                );
            }
            let rebuilt = layout.iter().map(|ft| ft.token.original_text.as_str()).collect::<Vec<_>>().join(" ");
            prop_assert_eq!(rebuilt, fragment.clone());
            if let Some(last) = layout.last() {
                prop_assert_eq!(last.fragment_end_char, fragment.chars().count());
            }
        }
    }
}
