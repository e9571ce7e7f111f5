//! Per-sentence ranking and deduplication of candidate triples.
//!
//! Open-IE emits many overlapping triples for one sentence. Candidates are
//! ranked so that triples anchoring more concepts, with longer text, come
//! first; a later candidate is dropped when its concepts are already covered
//! by a kept triple of the same sentence.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use litkg_common::{CandidateTriple, KeptTriple};

pub struct TripleFilter;

struct Anchors<'a> {
    subjects: BTreeSet<&'a str>,
    objects: BTreeSet<&'a str>,
}

impl<'a> Anchors<'a> {
    fn of(triple: &'a CandidateTriple) -> Self {
        Self { subjects: triple.subject_concepts(), objects: triple.object_concepts() }
    }

    /// Whether `self` adds nothing over `kept`.
    fn subsumed_by(&self, kept: &Anchors<'_>) -> bool {
        if self.subjects.is_subset(&kept.subjects) && self.objects.is_subset(&kept.objects) {
            return true;
        }
        let all: BTreeSet<&str> = self.subjects.union(&self.objects).copied().collect();
        all.is_subset(&kept.subjects) || all.is_subset(&kept.objects)
    }
}

impl TripleFilter {
    /// Survivors in keep-order.
    pub fn select(candidates: Vec<CandidateTriple>) -> Vec<CandidateTriple> {
        let mut ranked: Vec<CandidateTriple> =
            candidates.into_iter().filter(CandidateTriple::is_anchored).collect();
        ranked.sort_by(rank);

        let mut keep = vec![false; ranked.len()];
        {
            let mut sentence = None;
            let mut kept: Vec<Anchors<'_>> = Vec::new();
            for (i, triple) in ranked.iter().enumerate() {
                if sentence != Some(triple.sentence_index) {
                    sentence = Some(triple.sentence_index);
                    kept.clear();
                }
                let anchors = Anchors::of(triple);
                if kept.iter().any(|k| anchors.subsumed_by(k)) {
                    continue;
                }
                kept.push(anchors);
                keep[i] = true;
            }
        }

        ranked
            .into_iter()
            .zip(keep)
            .filter_map(|(triple, keep)| keep.then_some(triple))
            .collect()
    }

    /// Survivors numbered `0, 1, 2, …` in keep-order.
    pub fn apply(candidates: Vec<CandidateTriple>) -> Vec<KeptTriple> {
        Self::select(candidates)
            .into_iter()
            .zip(0u32..)
            .map(|(triple, triple_id)| KeptTriple { triple_id, triple })
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn rank(a: &CandidateTriple, b: &CandidateTriple) -> Ordering {
    let anchored = |t: &CandidateTriple| t.subject_entities.len() + t.object_entities.len();
    let text = |t: &CandidateTriple| char_len(&t.subject) + char_len(&t.object);

    a.sentence_index
        .cmp(&b.sentence_index)
        .then_with(|| anchored(b).cmp(&anchored(a)))
        .then_with(|| text(b).cmp(&text(a)))
        .then_with(|| b.relation_entities.len().cmp(&a.relation_entities.len()))
        .then_with(|| char_len(&b.relation).cmp(&char_len(&a.relation)))
}

#[cfg(test)]
mod tests {
    use litkg_common::{Entity, TokenSpan};
    use pretty_assertions::assert_eq;

    use super::*;

    fn span(concept: &str) -> TokenSpan {
        TokenSpan {
            sentence_start_char: 0,
            sentence_end_char: 1,
            fragment_start_char: 0,
            fragment_end_char: 1,
            text: concept.to_string(),
            entity: Entity {
                concept_id: concept.to_string(),
                canonical_name: concept.to_string(),
                start_char: 0,
                end_char: 1,
            },
        }
    }

    fn triple(sentence: usize, subject: &str, subjects: &[&str], object: &str, objects: &[&str]) -> CandidateTriple {
        CandidateTriple {
            subject: subject.to_string(),
            relation: "r".to_string(),
            object: object.to_string(),
            confidence: None,
            sentence_index: sentence,
            sentence_start_char: 0,
            sentence_end_char: 10,
            subject_entities: subjects.iter().map(|c| span(c)).collect(),
            relation_entities: Vec::new(),
            object_entities: objects.iter().map(|c| span(c)).collect(),
        }
    }

    fn subjects(kept: &[KeptTriple]) -> Vec<&str> {
        kept.iter().map(|k| k.triple.subject.as_str()).collect()
    }

    #[test]
    fn test_unanchored_triples_are_dropped() {
        let kept = TripleFilter::apply(vec![
            triple(0, "a", &[], "b", &["B"]),
            triple(0, "c", &["C"], "d", &[]),
        ]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_subset_of_kept_pair_is_rejected() {
        let kept = TripleFilter::apply(vec![
            triple(0, "short", &["A"], "x", &["B"]),
            triple(0, "longer subject", &["A", "C"], "x", &["B"]),
        ]);
        assert_eq!(subjects(&kept), vec!["longer subject"]);
        assert_eq!(kept[0].triple_id, 0);
    }

    #[test]
    fn test_pair_inside_one_side_is_rejected() {
        let kept = TripleFilter::apply(vec![
            triple(0, "s", &["A", "B", "C"], "o", &["D"]),
            triple(0, "t", &["A"], "u", &["B"]),
        ]);
        assert_eq!(subjects(&kept), vec!["s"]);
    }

    #[test]
    fn test_anchor_set_resets_per_sentence() {
        let kept = TripleFilter::apply(vec![
            triple(1, "again", &["A"], "o", &["B"]),
            triple(0, "first", &["A"], "o", &["B"]),
        ]);
        assert_eq!(subjects(&kept), vec!["first", "again"]);
        assert_eq!(kept.iter().map(|k| k.triple_id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_ranking_prefers_longer_text_then_relation() {
        let mut a = triple(0, "p53", &["A"], "apoptosis", &["B"]);
        let mut b = triple(0, "p53", &["A"], "apoptosis", &["B"]);
        a.relation = "induces".to_string();
        b.relation = "strongly induces".to_string();
        let kept = TripleFilter::apply(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].triple.relation, "strongly induces");
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let kept = TripleFilter::apply(vec![
            triple(0, "one", &["A"], "x", &["B"]),
            triple(0, "two", &["C"], "y", &["D"]),
        ]);
        assert_eq!(subjects(&kept), vec!["one", "two"]);
    }
}
