//! Exhaustive edit-distance comparator over retained terms.
//!
//! Linear in the corpus size. Used to cross-check the tree and for
//! occasional low-volume lookups, never as the main query path.

use std::collections::BTreeSet;

use super::{edit_distance, sort_matches, Match};

/// Linear scan over a borrowed term list.
pub struct BaselineComparator<'a> {
    terms: &'a [String],
}

impl<'a> BaselineComparator<'a> {
    /// Returns `None` when there are no terms to scan.
    pub fn new(terms: &'a [String]) -> Option<Self> {
        if terms.is_empty() {
            None
        } else {
            Some(Self { terms })
        }
    }

    /// Same contract as [`super::IndexEngine::search`]. Duplicate terms in
    /// the retained list are reported once.
    pub fn search(&self, query: &str, max_distance: u32) -> Vec<Match> {
        let unique: BTreeSet<&str> = self.terms.iter().map(String::as_str).collect();
        let mut matches: Vec<Match> = unique
            .into_iter()
            .filter_map(|term| {
                let distance = edit_distance(query, term);
                (distance <= max_distance).then(|| Match::new(term, distance))
            })
            .collect();
        sort_matches(&mut matches);
        matches
    }

    /// The closest term; the first one in corpus order wins ties.
    pub fn nearest(&self, query: &str) -> Match {
        let mut best = Match::new(self.terms[0].as_str(), edit_distance(query, &self.terms[0]));
        for term in &self.terms[1..] {
            if best.distance == 0 {
                break;
            }
            let distance = edit_distance(query, term);
            if distance < best.distance {
                best = Match::new(term.as_str(), distance);
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
