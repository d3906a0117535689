//! The per-file dispatch pipeline: detect, parse, scan, verify, emit.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::diagnostic::{Diagnostic, MessageStyle};
use crate::grammar::{FeatureSet, Grammar, GrammarError, TokenKind};
use crate::index::CandidateIndex;
use crate::pattern::Captures;
use crate::registry::{CheckContext, ContextRequest, Registry};
use crate::source::{Comment, Source, SourceError};
use crate::tree::{NodeId, SyntaxTree};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// A checker raised while producing findings. This aborts the rest of
    /// the file's check on purpose: a buggy checker must not silently
    /// swallow everything downstream.
    #[error("checker for `{pattern}` failed: {source}")]
    Checker {
        pattern: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Runs a compiled registry over sources, one file at a time.
///
/// Holds the canonical grammar; each check derives a private
/// feature-adjusted copy, so runs never observe each other's keyword
/// adjustments.
pub struct Dispatcher<G, I> {
    grammar: G,
    registry: Arc<Registry<G>>,
    index: I,
    style: MessageStyle,
}

impl<G: Grammar, I: CandidateIndex> Dispatcher<G, I> {
    /// `index` starts empty; every compiled pattern shape is loaded into
    /// it here, once, keyed by registration order.
    pub fn new(grammar: G, registry: Arc<Registry<G>>, mut index: I) -> Self {
        for (key, checker) in registry.checkers().iter().enumerate() {
            index.add_pattern(&checker.shape, key);
        }
        Self {
            grammar,
            registry,
            index,
            style: MessageStyle::default(),
        }
    }

    pub fn with_style(mut self, style: MessageStyle) -> Self {
        self.style = style;
        self
    }

    pub fn registry(&self) -> &Registry<G> {
        &self.registry
    }

    /// Check one source file, returning a lazy diagnostic stream.
    ///
    /// Detection, parsing, and the candidate scan happen eagerly here;
    /// verification and checker invocation happen as the stream is
    /// consumed.
    pub fn check_source<'a>(
        &'a self,
        source: &'a Source,
    ) -> Result<Diagnostics<'a, G, I>, CheckError> {
        let features = self.grammar.detect_future_features(source.text());
        if !features.is_empty() {
            debug!("detected future features: {features:?}");
        }
        let grammar = self.grammar.with_features(&features);
        let parsed = grammar.parse(source.text())?;
        if parsed.synthesized_newline {
            debug!("parser synthesized the trailing newline");
        }
        let tree = parsed.tree;

        // Phase 1: one coarse scan across every pattern at once, inverted
        // into an arena-indexed table so phase 2 touches each node exactly
        // once, with all of its candidate patterns together.
        let scanned = self.index.scan(&tree);
        let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); tree.len()];
        let mut total = 0usize;
        for (key, nodes) in scanned {
            for node in nodes {
                candidates[node.0].push(key);
                total += 1;
            }
        }
        for keys in &mut candidates {
            // Registration order, even when several patterns share a node.
            keys.sort_unstable();
            keys.dedup();
        }
        debug!(
            "candidate scan: {total} candidate pairs across {} patterns",
            self.registry.len()
        );

        let order: Vec<NodeId> = tree.pre_order().collect();
        Ok(Diagnostics {
            dispatcher: self,
            source,
            grammar,
            features,
            synthesized_newline: parsed.synthesized_newline,
            tree,
            candidates,
            order,
            cursor: 0,
            pending: VecDeque::new(),
            fault: None,
            done: false,
        })
    }
}

/// Lazy stream of diagnostics for one file, in tree pre-order. A fault is
/// yielded once as `Err` and fuses the stream; diagnostics already
/// yielded stand.
pub struct Diagnostics<'a, G, I> {
    dispatcher: &'a Dispatcher<G, I>,
    source: &'a Source,
    /// Private feature-adjusted grammar for this run.
    grammar: G,
    features: FeatureSet,
    synthesized_newline: bool,
    tree: SyntaxTree,
    candidates: Vec<Vec<usize>>,
    order: Vec<NodeId>,
    cursor: usize,
    pending: VecDeque<Diagnostic>,
    fault: Option<CheckError>,
    done: bool,
}

impl<G: Grammar, I: CandidateIndex> Diagnostics<'_, G, I> {
    /// The tree parsed for this run.
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// The features detected for this run.
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Whether the parser had to synthesize the source's trailing newline.
    pub fn synthesized_newline(&self) -> bool {
        self.synthesized_newline
    }

    /// Drain the stream, failing on the first fault.
    pub fn collect_all(self) -> Result<Vec<Diagnostic>, CheckError> {
        let mut diagnostics = Vec::new();
        for item in self {
            diagnostics.push(item?);
        }
        Ok(diagnostics)
    }

    /// Phase 2 for one node: exact-match each candidate pattern, assemble
    /// the requested context, invoke the checker, and queue its findings.
    fn dispatch_node(&mut self, node: NodeId) -> Result<(), CheckError> {
        let dispatcher = self.dispatcher;
        let keys = std::mem::take(&mut self.candidates[node.0]);
        for key in keys {
            let checker = &dispatcher.registry.checkers()[key];
            let mut captures = Captures::new();
            if !checker.matcher.matches(&self.tree, node, &mut captures) {
                // Phase 1 over-approximates; only exact matches dispatch.
                continue;
            }

            let mut comments: BTreeMap<String, Vec<Comment>> = BTreeMap::new();
            let mut filename = None;
            let mut features = None;
            let mut grammar = None;
            for request in &checker.requests {
                match request {
                    ContextRequest::CommentsFor(name) => {
                        let target = captures.node(name).unwrap_or(node);
                        let found = self.comments_in_prefix(target)?;
                        comments.insert(name.clone(), found);
                    }
                    ContextRequest::Filename => filename = self.source.filename(),
                    ContextRequest::Features => features = Some(&self.features),
                    ContextRequest::Grammar => grammar = Some(&self.grammar),
                }
            }

            let context = CheckContext {
                tree: &self.tree,
                node,
                captures: &captures,
                comments: &comments,
                filename,
                features,
                grammar,
            };
            let findings = (checker.run)(&context).map_err(|source| CheckError::Checker {
                pattern: checker.pattern_text.clone(),
                source,
            })?;
            for finding in findings {
                let diagnostic = self.source.message_for_node(
                    &self.tree,
                    finding.node,
                    &finding.error,
                    finding.anchor,
                    &finding.fields,
                    &dispatcher.style,
                )?;
                self.pending.push_back(diagnostic);
            }
        }
        Ok(())
    }

    /// Recover comment tokens from a node's leading prefix by
    /// re-tokenizing it at its absolute base offset.
    fn comments_in_prefix(&self, node: NodeId) -> Result<Vec<Comment>, CheckError> {
        let data = self.tree.node(node);
        let prefix = data.prefix();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let start = self
            .source
            .lines()
            .byte_of_node(data)
            .map_err(SourceError::from)?;
        // The prefix sits immediately before the node's first token.
        let base = start.saturating_sub(prefix.len());
        // Trailing continuation junk would confuse the tokenizer.
        let trimmed = prefix.trim_end_matches([' ', '\t', '\r', '\n', '\\']);
        let sub = Source::from_text(trimmed);
        let tokens = sub.as_tokens(&self.grammar, base)?;
        Ok(tokens
            .into_iter()
            .filter(|token| token.kind == TokenKind::Comment)
            .map(|token| Comment {
                text: token.text,
                span: token.span,
            })
            .collect())
    }
}

impl<G: Grammar, I: CandidateIndex> Iterator for Diagnostics<'_, G, I> {
    type Item = Result<Diagnostic, CheckError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Findings queued before a fault still go out; the stream
            // already yielded is never retracted.
            if let Some(diagnostic) = self.pending.pop_front() {
                return Some(Ok(diagnostic));
            }
            if let Some(fault) = self.fault.take() {
                self.done = true;
                return Some(Err(fault));
            }
            if self.done || self.cursor >= self.order.len() {
                self.done = true;
                return None;
            }
            let node = self.order[self.cursor];
            self.cursor += 1;
            if self.candidates[node.0].is_empty() {
                continue;
            }
            if let Err(fault) = self.dispatch_node(node) {
                self.fault = Some(fault);
            }
        }
    }
}
