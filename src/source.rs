//! Source text ownership, decoding, and diagnostic construction.
//!
//! A [`Source`] owns one file's text together with its [`Lines`] table for
//! the duration of a checking pass. It can re-tokenize arbitrary sub-text
//! (a node's comment-bearing prefix, say) and translate the resulting
//! token spans back into the outer file's coordinate space.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::diagnostic::{render_template, Diagnostic, ErrorSpec, MessageStyle, RenderError};
use crate::grammar::{Grammar, GrammarError, TokenKind};
use crate::interval::Interval;
use crate::lines::{ByteOffset, CoordinateError, LineColumn, Lines};
use crate::tree::{NodeId, SyntaxTree};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("unknown source encoding `{name}`")]
    UnknownEncoding { name: String },

    #[error("source is not valid {encoding}: invalid byte at offset {offset}")]
    Decode {
        encoding: &'static str,
        offset: usize,
    },

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// How a finding addresses its position relative to the matched node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Anchor {
    /// At the node's own canonical byte offset.
    #[default]
    Node,
    /// Canonical byte offset plus a byte delta, converted back to
    /// (line, column).
    ByteDelta(isize),
    /// The node's line plus a line delta, with an explicitly supplied
    /// column. Skips byte conversion entirely so a checker can point at a
    /// sibling line.
    LineDelta { lines: isize, column: usize },
}

/// A comment token recovered from re-tokenized sub-text, with its span in
/// the outer file's coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub span: Interval,
}

/// A token paired with its byte interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub kind: TokenKind,
    pub text: String,
    pub span: Interval,
}

/// One file's text plus its coordinate model. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Source {
    text: String,
    lines: Lines,
    filename: Option<String>,
}

impl Source {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = Lines::from_text(&text);
        Self {
            text,
            lines,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Resolve a checker-framework file name: `"stdin"` and `"-"` denote
    /// the process input stream, anything else names a file on disk.
    pub fn from_filename(name: &str) -> Result<Self, SourceError> {
        if name == "stdin" || name == "-" {
            Self::from_stdin()
        } else {
            Self::from_path(Path::new(name))
        }
    }

    /// Read and decode a file using its own declared source encoding. A
    /// malformed declaration or undecodable bytes fail the whole check for
    /// that file; there is no partial recovery.
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let bytes = fs::read(path).map_err(|source| SourceError::Read {
            name: path.display().to_string(),
            source,
        })?;
        let text = decode(&bytes)?;
        Ok(Self::from_text(text).with_filename(path.display().to_string()))
    }

    pub fn from_stdin() -> Result<Self, SourceError> {
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|source| SourceError::Read {
                name: "stdin".to_string(),
                source,
            })?;
        let text = decode(&bytes)?;
        Ok(Self::from_text(text).with_filename("stdin"))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> &Lines {
        &self.lines
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Compute a located diagnostic for a finding against `node`.
    ///
    /// Byte-relative anchors go through the canonical byte offset and back
    /// so deltas can cross line boundaries; the line-relative anchor keeps
    /// the node's own line arithmetic with an explicit column.
    pub fn message_for_node(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
        error: &ErrorSpec,
        anchor: Anchor,
        fields: &BTreeMap<String, String>,
        style: &MessageStyle,
    ) -> Result<Diagnostic, SourceError> {
        let data = tree.node(node);
        let pos = match anchor {
            Anchor::Node => {
                let byte = self.lines.byte_of_node(data)?;
                self.lines.position_of_byte(byte)?
            }
            Anchor::ByteDelta(delta) => {
                let base = self.lines.byte_of_node(data)?;
                let byte = base
                    .checked_add_signed(delta)
                    .ok_or(CoordinateError::ByteDeltaOutOfRange { base, delta })?;
                self.lines.position_of_byte(byte)?
            }
            Anchor::LineDelta { lines, column } => {
                let start = data.start();
                let line = start
                    .line
                    .checked_add_signed(lines)
                    .filter(|line| *line >= 1)
                    .ok_or(CoordinateError::LineDeltaOutOfRange {
                        line: start.line,
                        delta: lines,
                    })?;
                LineColumn::new(line, column)
            }
        };
        self.message_for_pos(pos, error, fields, style)
    }

    /// Format the final diagnostic text: template fields substituted,
    /// prefixed by the descriptor's stable code per the message style.
    pub fn message_for_pos(
        &self,
        pos: LineColumn,
        error: &ErrorSpec,
        fields: &BTreeMap<String, String>,
        style: &MessageStyle,
    ) -> Result<Diagnostic, SourceError> {
        let text = render_template(error.template, fields)?;
        Ok(Diagnostic {
            line: pos.line,
            column: pos.column,
            message: style.format(error.code, &text),
            severity: error.severity,
        })
    }

    /// Re-tokenize the held text, yielding tokens whose intervals are
    /// shifted by `base`. Tokenizing a sub-text with the right base
    /// translates its positions back into the outer file's coordinate
    /// space.
    pub fn as_tokens<G: Grammar>(
        &self,
        grammar: &G,
        base: ByteOffset,
    ) -> Result<Vec<SpannedToken>, SourceError> {
        let mut tokens = Vec::new();
        for token in grammar.tokenize(&self.text)? {
            let span = Interval::new(
                self.lines.byte_of_pos(token.start)? + base,
                self.lines.byte_of_pos(token.end)? + base,
            );
            tokens.push(SpannedToken {
                kind: token.kind,
                text: token.text,
                span,
            });
        }
        Ok(tokens)
    }
}

/// PEP 263-style declaration: a comment in the first two lines naming the
/// file's encoding.
fn cookie_re() -> &'static Regex {
    static COOKIE: OnceLock<Regex> = OnceLock::new();
    COOKIE.get_or_init(|| {
        Regex::new(r"^[ \t\x0c]*#.*?coding[:=][ \t]*([-_.a-zA-Z0-9]+)").expect("static regex")
    })
}

fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let mut end = bytes.len();
    let mut seen = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            seen += 1;
            if seen == 2 {
                end = i;
                break;
            }
        }
    }
    // Declarations are ASCII; decode the head leniently just to find one.
    let head = String::from_utf8_lossy(&bytes[..end]);
    for line in head.lines().take(2) {
        if let Some(captures) = cookie_re().captures(line) {
            return Some(captures[1].to_string());
        }
    }
    None
}

fn decode(bytes: &[u8]) -> Result<String, SourceError> {
    // A UTF-8 byte-order mark wins over any declaration.
    if let Some(stripped) = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]) {
        return decode_as(stripped, "utf-8");
    }
    match declared_encoding(bytes) {
        Some(name) => {
            debug!("declared source encoding: {name}");
            match name.to_ascii_lowercase().replace('_', "-").as_str() {
                "utf-8" | "utf8" => decode_as(bytes, "utf-8"),
                "ascii" | "us-ascii" => decode_as(bytes, "ascii"),
                "latin-1" | "latin1" | "iso-8859-1" => decode_as(bytes, "latin-1"),
                _ => Err(SourceError::UnknownEncoding { name }),
            }
        }
        None => decode_as(bytes, "utf-8"),
    }
}

fn decode_as(bytes: &[u8], encoding: &'static str) -> Result<String, SourceError> {
    match encoding {
        "latin-1" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        "ascii" => match bytes.iter().position(|b| !b.is_ascii()) {
            Some(offset) => Err(SourceError::Decode { encoding, offset }),
            None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        },
        _ => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| SourceError::Decode {
                encoding,
                offset: e.valid_up_to(),
            }),
    }
}
