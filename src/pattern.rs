//! Pattern-compiler collaborator interface and capture bindings.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::grammar::Grammar;
use crate::tree::{NodeId, SyntaxTree};

/// The AST form of a compiled pattern, handed to candidate indexing so a
/// coarse scan can rule nodes in without running the exact matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternShape {
    /// Matches any node; indexing cannot narrow it.
    Any,
    /// An interior node of a given kind. An empty child list constrains
    /// nothing below the root.
    Node {
        kind: String,
        children: Vec<PatternShape>,
    },
    /// A leaf of a given kind, optionally with exact token text.
    Leaf { kind: String, text: Option<String> },
}

impl PatternShape {
    /// The node kind this shape is rooted at, if it names one.
    pub fn root_kind(&self) -> Option<&str> {
        match self {
            PatternShape::Any => None,
            PatternShape::Node { kind, .. } | PatternShape::Leaf { kind, .. } => Some(kind),
        }
    }
}

/// Capture bindings produced by one exact match. Built per (node, checker)
/// pair and discarded as soon as the checker returns.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    bound: HashMap<String, Vec<NodeId>>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `node` under `name`. Repeated binds under one name accumulate,
    /// for variadic captures.
    pub fn bind(&mut self, name: impl Into<String>, node: NodeId) {
        self.bound.entry(name.into()).or_default().push(node);
    }

    pub fn get(&self, name: &str) -> Option<&[NodeId]> {
        self.bound.get(name).map(Vec::as_slice)
    }

    /// First node bound under `name`.
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.get(name).and_then(|nodes| nodes.first().copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bound.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    pub fn clear(&mut self) {
        self.bound.clear();
    }
}

/// Exact matcher for one compiled pattern (the verify phase). The
/// candidate scan may over-approximate; this must not.
pub trait TreePattern {
    fn matches(&self, tree: &SyntaxTree, node: NodeId, captures: &mut Captures) -> bool;
}

/// A compiled pattern: the exact matcher plus the shape used for
/// candidate indexing.
pub struct CompiledPattern {
    pub matcher: Box<dyn TreePattern + Send + Sync>,
    pub shape: PatternShape,
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// The external pattern compiler: textual shape description in, compiled
/// pattern out.
pub trait PatternCompiler<G: Grammar> {
    fn compile(&self, grammar: &G, pattern: &str) -> Result<CompiledPattern, PatternError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid pattern `{pattern}`: {message}")]
    Invalid { pattern: String, message: String },
}
