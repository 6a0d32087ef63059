//! Graph extraction from one tagged sentence.
//!
//! Extraction is a fold over the token sequence. Each step consumes one
//! `(position, token)` pair and returns the next [`ScanState`]; the final
//! state is turned into a [`GraphFragment`] by [`ScanState::into_fragment`].
//!
//! Rules applied per token:
//! - NOUN: recorded with its position.
//! - VERB: recorded with its position.
//! - ADJECTIVE: bound to the noun immediately before it (position `i - 1`), if any.
//! - ADVERB: bound to the most recent verb, if any verb has been seen.
//! - anything else: ignored, but still occupies a position.
//!
//! Relationships link consecutive noun occurrences. Verbs are consumed in
//! order, at most once each: the next unconsumed verb types the relationship
//! when it occurs before the second noun, otherwise the relationship is
//! [`RELATES_TO`].
//!
//! Bound lemmas are appended as seen, repeats included. Every occurrence of a
//! noun lemma feeds the same accumulator, so a node's properties collect all
//! of its occurrences. One relationship is emitted per consecutive noun pair,
//! even when a pair repeats; [`GraphFragment::merge`] and the store collapse
//! repeats by `(from, type, to)`.

use std::collections::HashMap;

use sitegraph_shared::{
    GraphFragment, GraphNode, GraphRelationship, RELATES_TO, TagClass, Token,
};

/// A lemma and the token position it was seen at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub lemma: String,
    pub position: usize,
}

/// Scan state threaded through the fold.
///
/// Noun and verb property accumulators are kept apart: a lemma used both as
/// a noun and as a verb has independent property lists per role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    pub nouns: Vec<Occurrence>,
    pub verbs: Vec<Occurrence>,
    pub noun_properties: HashMap<String, Vec<String>>,
    pub verb_properties: HashMap<String, Vec<String>>,
    /// Class of the token at the previous position.
    previous: Option<TagClass>,
}

impl ScanState {
    /// Consume the token at `position`.
    pub fn step(mut self, (position, token): (usize, &Token)) -> Self {
        match token.class {
            TagClass::Noun => {
                self.noun_properties.entry(token.lemma.clone()).or_default();
                self.nouns.push(Occurrence {
                    lemma: token.lemma.clone(),
                    position,
                });
            }
            TagClass::Verb => {
                self.verb_properties.entry(token.lemma.clone()).or_default();
                self.verbs.push(Occurrence {
                    lemma: token.lemma.clone(),
                    position,
                });
            }
            TagClass::Adjective if self.previous == Some(TagClass::Noun) => {
                if let Some(noun) = self.nouns.last() {
                    let props = self.noun_properties.entry(noun.lemma.clone()).or_default();
                    props.push(token.lemma.clone());
                }
            }
            TagClass::Adverb => {
                if let Some(verb) = self.verbs.last() {
                    let props = self.verb_properties.entry(verb.lemma.clone()).or_default();
                    props.push(token.lemma.clone());
                }
            }
            TagClass::Adjective | TagClass::Other => {}
        }

        self.previous = Some(token.class);
        self
    }

    /// Distinct noun lemmas in first-seen order.
    pub fn distinct_nouns(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for noun in &self.nouns {
            if !labels.contains(&noun.lemma.as_str()) {
                labels.push(&noun.lemma);
            }
        }
        labels
    }

    /// Build the fragment, or `None` when fewer than two distinct nouns were seen.
    pub fn into_fragment(self) -> Option<GraphFragment> {
        let labels = self.distinct_nouns();
        if labels.len() < 2 {
            return None;
        }

        let noun_props = |lemma: &str| self.noun_properties.get(lemma).cloned().unwrap_or_default();
        let verb_props = |lemma: &str| self.verb_properties.get(lemma).cloned().unwrap_or_default();

        let nodes = labels
            .iter()
            .map(|label| GraphNode {
                label: label.to_string(),
                properties: noun_props(label),
            })
            .collect();

        let mut verbs = self.verbs.iter().peekable();
        let mut relationships: Vec<GraphRelationship> = Vec::new();

        for pair in self.nouns.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let mut properties = noun_props(&from.lemma);

            let rel_type = match verbs.next_if(|verb| verb.position < to.position) {
                Some(verb) => {
                    properties.extend(verb_props(&verb.lemma));
                    verb.lemma.clone()
                }
                None => RELATES_TO.to_string(),
            };

            relationships.push(GraphRelationship {
                from: from.lemma.clone(),
                to: to.lemma.clone(),
                rel_type,
                properties,
            });
        }

        Some(GraphFragment {
            nodes,
            relationships,
        })
    }
}

/// Run the scan over `tokens` without building the fragment.
pub fn scan(tokens: &[Token]) -> ScanState {
    tokens
        .iter()
        .enumerate()
        .fold(ScanState::default(), ScanState::step)
}

/// Extract a graph fragment from one tagged sentence.
pub fn extract(tokens: &[Token]) -> Option<GraphFragment> {
    scan(tokens).into_fragment()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(spec: &[(&str, &str, &str)]) -> Vec<Token> {
        spec.iter()
            .map(|(surface, lemma, tag)| Token::new(*surface, *lemma, *tag))
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn verb_with_adverb_links_two_nouns() {
        let fragment = extract(&tokens(&[
            ("Der", "der", "ART"),
            ("Hund", "Hund", "NOUN"),
            ("läuft", "laufen", "VERB"),
            ("schnell", "schnell", "ADV"),
            ("zum", "zu", "ADP"),
            ("Park", "Park", "NOUN"),
        ]))
        .expect("fragment");

        assert_eq!(
            fragment.nodes,
            vec![
                GraphNode { label: "Hund".into(), properties: vec![] },
                GraphNode { label: "Park".into(), properties: vec![] },
            ]
        );
        assert_eq!(
            fragment.relationships,
            vec![GraphRelationship {
                from: "Hund".into(),
                to: "Park".into(),
                rel_type: "laufen".into(),
                properties: strings(&["schnell"]),
            }]
        );
    }

    #[test]
    fn single_noun_yields_none() {
        let result = extract(&tokens(&[
            ("rote", "rot", "ADJ"),
            ("Katze", "Katze", "NOUN"),
            ("schläft", "schlafen", "VERB"),
        ]));
        assert_eq!(result, None);
    }

    #[test]
    fn no_nouns_yields_none() {
        assert_eq!(extract(&[]), None);
        assert_eq!(
            extract(&tokens(&[("läuft", "laufen", "VERB"), ("schnell", "schnell", "ADV")])),
            None
        );
    }

    #[test]
    fn repeated_single_noun_yields_none() {
        let result = extract(&tokens(&[
            ("Hund", "Hund", "NOUN"),
            ("sieht", "sehen", "VERB"),
            ("Hund", "Hund", "NOUN"),
        ]));
        assert_eq!(result, None);
    }

    #[test]
    fn nouns_without_verb_fall_back() {
        let fragment = extract(&tokens(&[
            ("Hund", "Hund", "NOUN"),
            ("groß", "groß", "ADJ"),
            ("und", "und", "CCONJ"),
            ("Katze", "Katze", "NOUN"),
            ("klein", "klein", "ADJ"),
        ]))
        .unwrap();

        assert_eq!(fragment.relationships.len(), 1);
        let rel = &fragment.relationships[0];
        assert_eq!(rel.rel_type, RELATES_TO);
        assert_eq!(rel.properties, strings(&["groß"]));
        assert_eq!(fragment.node("Katze").unwrap().properties, strings(&["klein"]));
    }

    #[test]
    fn adjective_needs_noun_directly_before() {
        let fragment = extract(&tokens(&[
            ("Haus", "Haus", "NOUN"),
            ("sehr", "sehr", "PART"),
            ("alt", "alt", "ADJ"),
            ("Garten", "Garten", "NOUN"),
        ]))
        .unwrap();

        assert!(fragment.node("Haus").unwrap().properties.is_empty());
        assert!(fragment.relationships[0].properties.is_empty());
    }

    #[test]
    fn adverb_before_any_verb_is_dropped() {
        let state = scan(&tokens(&[
            ("heute", "heute", "ADV"),
            ("Hund", "Hund", "NOUN"),
            ("bellt", "bellen", "VERB"),
        ]));
        assert_eq!(state.verb_properties.get("bellen"), Some(&vec![]));
        assert!(state.noun_properties["Hund"].is_empty());
    }

    #[test]
    fn verbs_are_consumed_in_order_once() {
        let fragment = extract(&tokens(&[
            ("Hund", "Hund", "NOUN"),
            ("beißt", "beißen", "VERB"),
            ("Katze", "Katze", "NOUN"),
            ("jagt", "jagen", "VERB"),
            ("Maus", "Maus", "NOUN"),
        ]))
        .unwrap();

        let types: Vec<(&str, &str, &str)> = fragment
            .relationships
            .iter()
            .map(|r| (r.from.as_str(), r.rel_type.as_str(), r.to.as_str()))
            .collect();
        assert_eq!(
            types,
            vec![("Hund", "beißen", "Katze"), ("Katze", "jagen", "Maus")]
        );
    }

    #[test]
    fn verb_after_second_noun_waits_for_next_pair() {
        let fragment = extract(&tokens(&[
            ("Hund", "Hund", "NOUN"),
            ("Katze", "Katze", "NOUN"),
            ("jagt", "jagen", "VERB"),
            ("Maus", "Maus", "NOUN"),
        ]))
        .unwrap();

        assert_eq!(fragment.relationships[0].rel_type, RELATES_TO);
        assert_eq!(fragment.relationships[1].rel_type, "jagen");
        assert_eq!(fragment.relationships[1].from, "Katze");
    }

    #[test]
    fn lemma_roles_have_separate_properties() {
        let fragment = extract(&tokens(&[
            ("Essen", "essen", "NOUN"),
            ("warm", "warm", "ADJ"),
            ("essen", "essen", "VERB"),
            ("gern", "gern", "ADV"),
            ("Kinder", "Kind", "NOUN"),
        ]))
        .unwrap();

        assert_eq!(fragment.node("essen").unwrap().properties, strings(&["warm"]));
        let rel = &fragment.relationships[0];
        assert_eq!(rel.rel_type, "essen");
        assert_eq!(rel.properties, strings(&["warm", "gern"]));
    }

    #[test]
    fn repeated_noun_properties_accumulate() {
        let fragment = extract(&tokens(&[
            ("Katze", "Katze", "NOUN"),
            ("klein", "klein", "ADJ"),
            ("Haus", "Haus", "NOUN"),
            ("Katze", "Katze", "NOUN"),
            ("schwarz", "schwarz", "ADJ"),
            ("Katze", "Katze", "NOUN"),
            ("klein", "klein", "ADJ"),
        ]))
        .unwrap();

        assert_eq!(fragment.nodes.len(), 2);
        assert_eq!(
            fragment.node("Katze").unwrap().properties,
            strings(&["klein", "schwarz", "klein"])
        );
        // Katze→Haus, Haus→Katze, Katze→Katze
        assert_eq!(fragment.relationships.len(), 3);
        assert_eq!(fragment.relationships[2].from, fragment.relationships[2].to);
    }

    #[test]
    fn repeated_adverbs_are_kept() {
        let fragment = extract(&tokens(&[
            ("Hund", "Hund", "NOUN"),
            ("läuft", "laufen", "VERB"),
            ("sehr", "sehr", "ADV"),
            ("sehr", "sehr", "ADV"),
            ("Park", "Park", "NOUN"),
        ]))
        .unwrap();

        assert_eq!(fragment.relationships[0].properties, strings(&["sehr", "sehr"]));
    }

    #[test]
    fn every_noun_pair_emits_a_relationship() {
        let fragment = extract(&tokens(&[
            ("Hund", "Hund", "NOUN"),
            ("Park", "Park", "NOUN"),
            ("Hund", "Hund", "NOUN"),
            ("Park", "Park", "NOUN"),
        ]))
        .unwrap();

        let pairs: Vec<(&str, &str)> = fragment
            .relationships
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Hund", "Park"), ("Park", "Hund"), ("Hund", "Park")]);
        assert_eq!(fragment.nodes.len(), 2);

        // Merging collapses the repeated pair.
        let mut merged = GraphFragment::default();
        merged.merge(fragment);
        assert_eq!(merged.relationships.len(), 2);
    }

    #[test]
    fn extraction_is_repeatable() {
        let input = tokens(&[
            ("Die", "die", "DET"),
            ("Stadt", "Stadt", "NOUN"),
            ("berät", "beraten", "VERB"),
            ("kostenlos", "kostenlos", "ADV"),
            ("Familien", "Familie", "NOUN"),
            ("jung", "jung", "ADJ"),
            ("Eltern", "Eltern", "NOUN"),
        ]);
        assert_eq!(extract(&input), extract(&input));
    }

    #[test]
    fn step_tracks_state() {
        let toks = tokens(&[("Hund", "Hund", "NOUN"), ("braun", "braun", "ADJ")]);
        let state = ScanState::default().step((0, &toks[0]));
        assert_eq!(state.nouns, vec![Occurrence { lemma: "Hund".into(), position: 0 }]);
        assert_eq!(state.previous, Some(TagClass::Noun));

        let state = state.step((1, &toks[1]));
        assert_eq!(state.noun_properties["Hund"], strings(&["braun"]));
        assert_eq!(state.distinct_nouns(), vec!["Hund"]);
    }
}
