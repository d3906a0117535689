//! Candidate-scan boundary: the coarse multi-pattern prefilter.
//!
//! Phase 1 of dispatch narrows candidates for every pattern at once in a
//! single traversal; phase 2 runs the exact matcher only where phase 1
//! said a match is plausible. The split lives behind [`CandidateIndex`] so
//! a smarter bottom-up matcher can replace the built-in one.

use std::collections::HashMap;

use crate::pattern::PatternShape;
use crate::tree::{NodeId, SyntaxTree};

/// A multi-pattern candidate matcher.
pub trait CandidateIndex {
    /// Register one compiled pattern shape under a caller-chosen key.
    fn add_pattern(&mut self, shape: &PatternShape, key: usize);

    /// One traversal over the tree returning, per key, every node that
    /// might match that pattern. Over-approximation is allowed; missing a
    /// node the exact matcher would accept is not.
    fn scan(&self, tree: &SyntaxTree) -> HashMap<usize, Vec<NodeId>>;
}

/// Conservative built-in index that rules candidates in by root node
/// kind. A shape with no root kind matches every node.
#[derive(Debug, Default)]
pub struct KindIndex {
    by_kind: HashMap<String, Vec<usize>>,
    wildcard: Vec<usize>,
}

impl KindIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CandidateIndex for KindIndex {
    fn add_pattern(&mut self, shape: &PatternShape, key: usize) {
        match shape.root_kind() {
            Some(kind) => self.by_kind.entry(kind.to_string()).or_default().push(key),
            None => self.wildcard.push(key),
        }
    }

    fn scan(&self, tree: &SyntaxTree) -> HashMap<usize, Vec<NodeId>> {
        let mut candidates: HashMap<usize, Vec<NodeId>> = HashMap::new();
        for id in tree.pre_order() {
            if let Some(keys) = self.by_kind.get(tree.node(id).kind()) {
                for &key in keys {
                    candidates.entry(key).or_default().push(id);
                }
            }
            for &key in &self.wildcard {
                candidates.entry(key).or_default().push(id);
            }
        }
        candidates
    }
}
