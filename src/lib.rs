//! Treelint: checker dispatch and position mapping for tree-pattern
//! linters.
//!
//! Many independently-declared tree-shape checkers run over one parsed
//! source file; every match becomes a precisely located diagnostic.
//!
//! # Architecture
//!
//! Positions from three coordinate systems (parser line/column, absolute
//! byte offsets, and re-tokenized sub-text) all reconcile through one
//! model: [`Lines`] translates between byte offsets and (line, column),
//! including the end-of-file sentinel the parser's trailing-newline
//! normalization produces, and [`Source`] owns the text, the decoding,
//! and diagnostic construction on top of it.
//!
//! Matching is two-phase. A [`CandidateIndex`] scans the tree once and
//! over-approximates, for every pattern at the same time, which nodes
//! might match; the [`Dispatcher`] then re-verifies each candidate with
//! the exact capture-binding matcher, assembles the context the checker
//! declared it needs (comments, filename, detected features, the grammar
//! handle), invokes it, and converts each finding into a [`Diagnostic`].
//!
//! The grammar/tokenizer, the pattern compiler, and sophisticated
//! multi-pattern matchers are external collaborators consumed through the
//! [`Grammar`], [`PatternCompiler`], and [`CandidateIndex`] traits; this
//! crate supplies the dispatch and coordinate pipeline between them.

pub mod diagnostic;
pub mod engine;
pub mod grammar;
pub mod index;
pub mod interval;
pub mod lines;
pub mod pattern;
pub mod registry;
pub mod source;
pub mod tree;

// Re-exports
pub use diagnostic::{render_template, Diagnostic, ErrorSpec, MessageStyle, RenderError, Severity};
pub use engine::{CheckError, Diagnostics, Dispatcher};
pub use grammar::{FeatureSet, Grammar, GrammarError, Parsed, RawToken, TokenKind};
pub use index::{CandidateIndex, KindIndex};
pub use interval::{byte_intersection, Interval};
pub use lines::{ByteOffset, CoordinateError, LineColumn, Lines};
pub use pattern::{
    Captures, CompiledPattern, PatternCompiler, PatternError, PatternShape, TreePattern,
};
pub use registry::{
    CheckContext, CheckerResult, CheckerSpec, ContextRequest, Finding, Registry, RegistryCache,
    RegistryError,
};
pub use source::{Anchor, Comment, Source, SourceError, SpannedToken};
pub use tree::{Node, NodeId, SyntaxTree};
