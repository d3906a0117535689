//! Shared test support: a tiny line-oriented statement language with just
//! enough surface (keywords, comments, strings, a future-feature switch)
//! to exercise the dispatch pipeline end to end.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use semver::Version;
use treelint::{
    CandidateIndex, Captures, CheckerSpec, CompiledPattern, Dispatcher, FeatureSet, Grammar,
    GrammarError, KindIndex, LineColumn, Lines, Node, NodeId, Parsed, PatternCompiler,
    PatternError, PatternShape, RawToken, Registry, SyntaxTree, TokenKind, TreePattern,
};

/// A grammar for a toy language: one statement per line, `#` comments,
/// single-quoted strings, and a `print` keyword that the
/// `print_function` future feature turns back into a plain name.
#[derive(Debug, Clone)]
pub struct ToyGrammar {
    version: Version,
    keywords: BTreeSet<String>,
}

impl ToyGrammar {
    pub fn new(version: Version) -> Self {
        let keywords = ["print", "return"].iter().map(|s| s.to_string()).collect();
        Self { version, keywords }
    }

    pub fn v3_6() -> Self {
        Self::new(Version::new(3, 6, 0))
    }

    pub fn has_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }
}

impl Grammar for ToyGrammar {
    fn version(&self) -> &Version {
        &self.version
    }

    fn detect_future_features(&self, text: &str) -> FeatureSet {
        let mut features = FeatureSet::new();
        for line in text.lines() {
            if let Some(names) = line.trim_start().strip_prefix("from __future__ import ") {
                for name in names.split(',') {
                    features.insert(name.trim().to_string());
                }
            }
        }
        features
    }

    fn with_features(&self, features: &FeatureSet) -> Self {
        let mut grammar = self.clone();
        if features.contains("print_function") {
            grammar.keywords.remove("print");
        }
        grammar
    }

    fn parse(&self, text: &str) -> Result<Parsed, GrammarError> {
        let synthesized_newline = !text.is_empty() && !text.ends_with('\n');
        let owned;
        let parse_text = if synthesized_newline {
            owned = format!("{text}\n");
            owned.as_str()
        } else {
            text
        };

        let lines = Lines::from_text(parse_text);
        let mut tree = SyntaxTree::new(Node::new("file", LineColumn::new(1, 0)));
        let root = tree.root();
        let mut prev_end = 0usize;
        let mut current_stmt: Option<(NodeId, usize)> = None;

        for token in self.tokenize(parse_text)? {
            match token.kind {
                // Comments and newlines stay in the next token's prefix.
                TokenKind::Comment | TokenKind::Newline => continue,
                TokenKind::EndMarker => {
                    let prefix = parse_text[prev_end..].to_string();
                    tree.push(root, Node::new("endmarker", token.start).with_prefix(prefix));
                    prev_end = parse_text.len();
                }
                _ => {
                    let start_byte = lines.byte_of_pos(token.start).expect("token in range");
                    let end_byte = lines.byte_of_pos(token.end).expect("token in range");
                    let prefix = parse_text[prev_end..start_byte].to_string();
                    let line = token.start.line;
                    let stmt = match current_stmt {
                        Some((id, stmt_line)) if stmt_line == line => id,
                        _ => {
                            let kind = if token.kind == TokenKind::Keyword {
                                format!("{}_stmt", token.text)
                            } else {
                                "expr_stmt".to_string()
                            };
                            let id = tree.push(
                                root,
                                Node::new(kind, token.start).with_prefix(prefix.clone()),
                            );
                            current_stmt = Some((id, line));
                            id
                        }
                    };
                    let leaf_kind = match token.kind {
                        TokenKind::Keyword => "keyword",
                        TokenKind::Name => "name",
                        TokenKind::Number => "number",
                        TokenKind::String => "string",
                        _ => "op",
                    };
                    tree.push(
                        stmt,
                        Node::new(leaf_kind, token.start)
                            .with_text(token.text)
                            .with_prefix(prefix),
                    );
                    prev_end = end_byte;
                }
            }
        }

        Ok(Parsed {
            tree,
            synthesized_newline,
        })
    }

    fn tokenize(&self, text: &str) -> Result<Vec<RawToken>, GrammarError> {
        let mut tokens = Vec::new();
        let mut line_no = 0usize;
        for line in text.split_inclusive('\n') {
            line_no += 1;
            let chars: Vec<(usize, char)> = line.char_indices().collect();
            let mut i = 0;
            while i < chars.len() {
                let (col, c) = chars[i];
                if c == ' ' || c == '\t' || c == '\r' {
                    i += 1;
                } else if c == '\n' {
                    tokens.push(RawToken {
                        kind: TokenKind::Newline,
                        text: "\n".to_string(),
                        start: LineColumn::new(line_no, col),
                        end: LineColumn::new(line_no, col + 1),
                    });
                    i += 1;
                } else if c == '#' {
                    let mut j = i;
                    while j < chars.len() && chars[j].1 != '\n' {
                        j += 1;
                    }
                    let end_col = if j < chars.len() { chars[j].0 } else { line.len() };
                    tokens.push(RawToken {
                        kind: TokenKind::Comment,
                        text: line[col..end_col].to_string(),
                        start: LineColumn::new(line_no, col),
                        end: LineColumn::new(line_no, end_col),
                    });
                    i = j;
                } else if c == '\'' {
                    let mut j = i + 1;
                    while j < chars.len() && chars[j].1 != '\'' {
                        j += 1;
                    }
                    if j == chars.len() {
                        return Err(GrammarError::Tokenize {
                            line: line_no,
                            column: col,
                            message: "unterminated string".to_string(),
                        });
                    }
                    let end_col = chars[j].0 + 1;
                    tokens.push(RawToken {
                        kind: TokenKind::String,
                        text: line[col..end_col].to_string(),
                        start: LineColumn::new(line_no, col),
                        end: LineColumn::new(line_no, end_col),
                    });
                    i = j + 1;
                } else if c.is_alphabetic() || c == '_' {
                    let mut j = i;
                    while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
                        j += 1;
                    }
                    let end_col = if j < chars.len() { chars[j].0 } else { line.len() };
                    let word = &line[col..end_col];
                    let kind = if self.keywords.contains(word) {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Name
                    };
                    tokens.push(RawToken {
                        kind,
                        text: word.to_string(),
                        start: LineColumn::new(line_no, col),
                        end: LineColumn::new(line_no, end_col),
                    });
                    i = j;
                } else if c.is_ascii_digit() {
                    let mut j = i;
                    while j < chars.len() && chars[j].1.is_ascii_digit() {
                        j += 1;
                    }
                    let end_col = if j < chars.len() { chars[j].0 } else { line.len() };
                    tokens.push(RawToken {
                        kind: TokenKind::Number,
                        text: line[col..end_col].to_string(),
                        start: LineColumn::new(line_no, col),
                        end: LineColumn::new(line_no, end_col),
                    });
                    i = j;
                } else {
                    tokens.push(RawToken {
                        kind: TokenKind::Operator,
                        text: c.to_string(),
                        start: LineColumn::new(line_no, col),
                        end: LineColumn::new(line_no, col + c.len_utf8()),
                    });
                    i += 1;
                }
            }
        }
        let line_count = text.split_inclusive('\n').count();
        tokens.push(RawToken {
            kind: TokenKind::EndMarker,
            text: String::new(),
            start: LineColumn::new(line_count + 1, 0),
            end: LineColumn::new(line_count + 1, 0),
        });
        Ok(tokens)
    }
}

/// Compiled toy pattern: a node kind plus named bindings.
struct ToyPattern {
    kind: Option<String>,
    bindings: Vec<(String, BindTarget)>,
}

enum BindTarget {
    SelfNode,
    ChildKind(String),
}

impl TreePattern for ToyPattern {
    fn matches(&self, tree: &SyntaxTree, node: NodeId, captures: &mut Captures) -> bool {
        if let Some(kind) = &self.kind {
            if tree.node(node).kind() != kind {
                return false;
            }
        }
        for (name, target) in &self.bindings {
            match target {
                BindTarget::SelfNode => captures.bind(name.clone(), node),
                BindTarget::ChildKind(kind) => {
                    let child = tree
                        .children(node)
                        .iter()
                        .copied()
                        .find(|&child| tree.node(child).kind() == kind);
                    match child {
                        Some(child) => captures.bind(name.clone(), child),
                        None => {
                            captures.clear();
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

/// Pattern text is `<kind>` (or `any`) followed by whitespace-separated
/// `<name>=<child-kind>` bindings; `<name>=self` binds the matched node.
pub struct ToyCompiler;

impl PatternCompiler<ToyGrammar> for ToyCompiler {
    fn compile(
        &self,
        _grammar: &ToyGrammar,
        pattern: &str,
    ) -> Result<CompiledPattern, PatternError> {
        let mut parts = pattern.split_whitespace();
        let head = parts.next().ok_or_else(|| PatternError::Invalid {
            pattern: pattern.to_string(),
            message: "empty pattern".to_string(),
        })?;
        let kind = if head == "any" {
            None
        } else {
            Some(head.to_string())
        };
        let mut bindings = Vec::new();
        for part in parts {
            let (name, target) = part.split_once('=').ok_or_else(|| PatternError::Invalid {
                pattern: pattern.to_string(),
                message: format!("binding `{part}` is missing `=`"),
            })?;
            let target = if target == "self" {
                BindTarget::SelfNode
            } else {
                BindTarget::ChildKind(target.to_string())
            };
            bindings.push((name.to_string(), target));
        }
        let shape = match &kind {
            None => PatternShape::Any,
            Some(kind) => PatternShape::Node {
                kind: kind.clone(),
                children: Vec::new(),
            },
        };
        Ok(CompiledPattern {
            matcher: Box::new(ToyPattern { kind, bindings }),
            shape,
        })
    }
}

/// Deliberately maximal prefilter: every pattern gets every node as a
/// candidate. The verify phase must still produce exactly the right
/// diagnostics.
#[derive(Debug, Default)]
pub struct PermissiveIndex {
    keys: Vec<usize>,
}

impl CandidateIndex for PermissiveIndex {
    fn add_pattern(&mut self, _shape: &PatternShape, key: usize) {
        self.keys.push(key);
    }

    fn scan(&self, tree: &SyntaxTree) -> HashMap<usize, Vec<NodeId>> {
        let nodes: Vec<NodeId> = tree.pre_order().collect();
        self.keys.iter().map(|&key| (key, nodes.clone())).collect()
    }
}

pub fn dispatcher_with(specs: Vec<CheckerSpec<ToyGrammar>>) -> Dispatcher<ToyGrammar, KindIndex> {
    let grammar = ToyGrammar::v3_6();
    let registry = Registry::build(&grammar, &ToyCompiler, specs).expect("registry builds");
    Dispatcher::new(grammar, Arc::new(registry), KindIndex::new())
}
