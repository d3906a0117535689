//! Grammar/tokenizer collaborator interface.
//!
//! Parsing and tokenization live outside this crate; dispatch consumes
//! them through [`Grammar`]. Implementations produce this crate's
//! [`SyntaxTree`] and [`RawToken`] stream so the pipeline can translate
//! their positions through one coordinate model.

use std::collections::BTreeSet;

use semver::Version;
use thiserror::Error;

use crate::lines::LineColumn;
use crate::tree::SyntaxTree;

/// Forward-looking language features detected in a source file, by name.
pub type FeatureSet = BTreeSet<String>;

/// Token classification. Dispatch itself only cares about `Comment`; the
/// rest exist so grammar implementations have somewhere honest to put
/// their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Comment,
    Keyword,
    Name,
    Number,
    String,
    Operator,
    Newline,
    Indent,
    Dedent,
    EndMarker,
    Other,
}

/// One token as the tokenizer reports it, with parser-style positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub kind: TokenKind,
    pub text: String,
    pub start: LineColumn,
    pub end: LineColumn,
}

/// Parse output: the tree plus whether the parser had to append the
/// trailing newline itself (sources that do not end in one are normalized
/// upstream; the flag records that it happened).
#[derive(Debug)]
pub struct Parsed {
    pub tree: SyntaxTree,
    pub synthesized_newline: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("syntax error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("tokenizer error at {line}:{column}: {message}")]
    Tokenize {
        line: usize,
        column: usize,
        message: String,
    },
}

/// The external grammar a dispatch run is driven by.
pub trait Grammar {
    /// Language version this grammar parses. Used to gate checkers and to
    /// key registry caches.
    fn version(&self) -> &Version;

    /// Scan raw text for feature declarations that change keyword
    /// recognition for the rest of the file.
    fn detect_future_features(&self, text: &str) -> FeatureSet;

    /// Derive a private grammar adjusted for `features`. Copy-on-write is
    /// required: the receiver is the shared canonical grammar and must not
    /// be mutated, so that concurrent or sequential runs with different
    /// feature sets never observe each other's keyword adjustments.
    fn with_features(&self, features: &FeatureSet) -> Self
    where
        Self: Sized;

    fn parse(&self, text: &str) -> Result<Parsed, GrammarError>;

    fn tokenize(&self, text: &str) -> Result<Vec<RawToken>, GrammarError>;
}
