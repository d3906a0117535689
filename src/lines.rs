//! Byte-offset/line-column coordinate model.
//!
//! Positions arrive from three places that do not agree with each other:
//! the parser reports (line, column) pairs, token spans are byte ranges,
//! and re-tokenized sub-text carries its own local coordinates. [`Lines`]
//! is the translation table between them, with the absolute byte offset as
//! the canonical currency.

use std::fmt;

use thiserror::Error;

/// Absolute 0-based offset into the source text, in bytes.
pub type ByteOffset = usize;

/// A parser-reported position: 1-based line, 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

impl LineColumn {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for LineColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An out-of-range conversion that is not the documented end-of-file
/// sentinel. These are logic errors and are never silently clamped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("byte offset {offset} is past the end of the source (last byte {last_byte})")]
    ByteOutOfRange {
        offset: ByteOffset,
        last_byte: ByteOffset,
    },

    #[error("position {pos} does not exist in the source")]
    PositionOutOfRange { pos: LineColumn },

    #[error("byte delta {delta} from offset {base} leaves the source")]
    ByteDeltaOutOfRange { base: ByteOffset, delta: isize },

    #[error("line delta {delta} from line {line} leaves the source")]
    LineDeltaOutOfRange { line: usize, delta: isize },
}

/// Offset table for one source text, built once per file.
///
/// Index 0 is a reserved empty entry so line numbers are 1-based. Line
/// starts are strictly increasing from index 1 on; `last_byte` is one past
/// the final byte of the text.
#[derive(Debug, Clone)]
pub struct Lines {
    lines: Vec<(ByteOffset, String)>,
    last_pos: LineColumn,
    last_byte: ByteOffset,
}

impl Lines {
    /// Build the offset table in one linear pass. Each input line must
    /// carry its own line terminator.
    pub fn from_lines<I>(iter: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut lines = vec![(0, String::new())];
        let mut count = 0;
        for line in iter {
            let line = line.as_ref();
            lines.push((count, line.to_string()));
            count += line.len();
        }
        let last_pos = LineColumn::new(lines.len() - 1, lines[lines.len() - 1].1.len());
        Self {
            lines,
            last_pos,
            last_byte: count,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::from_lines(text.split_inclusive('\n'))
    }

    /// Number of real lines (the reserved entry is not counted).
    pub fn line_count(&self) -> usize {
        self.lines.len() - 1
    }

    /// Position of the final character, as (last line, its length).
    pub fn last_pos(&self) -> LineColumn {
        self.last_pos
    }

    /// Offset one past the final byte of the text.
    pub fn last_byte(&self) -> ByteOffset {
        self.last_byte
    }

    pub fn start_of_line(&self, line: usize) -> Option<ByteOffset> {
        if line == 0 {
            return None;
        }
        self.lines.get(line).map(|(start, _)| *start)
    }

    pub fn text_of_line(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.lines.get(line).map(|(_, text)| text.as_str())
    }

    /// Iterate real lines as (line number, start offset, text).
    pub fn iter(&self) -> impl Iterator<Item = (usize, ByteOffset, &str)> {
        self.lines
            .iter()
            .enumerate()
            .skip(1)
            .map(|(number, (start, text))| (number, *start, text.as_str()))
    }

    /// Convert an absolute byte offset back to (line, column) by binary
    /// search for the greatest line start at or before it.
    ///
    /// `offset == last_byte()` (end of file) is in range; anything past it
    /// is a fault.
    pub fn position_of_byte(&self, offset: ByteOffset) -> Result<LineColumn, CoordinateError> {
        if offset > self.last_byte {
            return Err(CoordinateError::ByteOutOfRange {
                offset,
                last_byte: self.last_byte,
            });
        }
        let line = self.lines.partition_point(|(start, _)| *start <= offset) - 1;
        if line == 0 {
            // Empty input has no real lines; the only in-range offset is 0,
            // which is the end-of-file sentinel position.
            return Ok(LineColumn::new(1, 0));
        }
        Ok(LineColumn::new(line, offset - self.lines[line].0))
    }

    /// Convert (line, column) to an absolute byte offset.
    ///
    /// The parser normalizes sources that lack a trailing newline by
    /// appending one, and then hangs its final dedent/end marker on a line
    /// one past the real content. That single position, `(line_count() + 1,
    /// 0)`, maps to `last_byte()` instead of raising; every other
    /// out-of-range position is a fault.
    pub fn byte_of_pos(&self, pos: LineColumn) -> Result<ByteOffset, CoordinateError> {
        if pos.line == self.lines.len() && pos.column == 0 {
            return Ok(self.last_byte);
        }
        if pos.line == 0 {
            return Err(CoordinateError::PositionOutOfRange { pos });
        }
        let (start, text) = self
            .lines
            .get(pos.line)
            .ok_or(CoordinateError::PositionOutOfRange { pos })?;
        if pos.column > text.len() {
            return Err(CoordinateError::PositionOutOfRange { pos });
        }
        Ok(start + pos.column)
    }

    /// Canonical byte offset of a node, from its own reported position.
    pub fn byte_of_node(&self, node: &crate::tree::Node) -> Result<ByteOffset, CoordinateError> {
        self.byte_of_pos(node.start())
    }
}
