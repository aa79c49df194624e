//! Source text primitives: byte ranges, line tables and buffer snapshots.
//!
//! Offsets are byte offsets into the unit's source text. Line numbers handed
//! out by [`LineIndex::line_of`] are 1-indexed to match editor conventions;
//! LSP positions are 0-indexed with UTF-16 columns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    /// Starting byte offset
    pub start: u32,
    /// Length in bytes
    pub length: u32,
}

impl TextRange {
    /// Create a range from an offset and a length.
    #[must_use]
    pub fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Create a range from start and end offsets.
    ///
    /// Returns `None` if `end` is before `start`.
    #[must_use]
    pub fn from_bounds(start: u32, end: u32) -> Option<Self> {
        end.checked_sub(start).map(|length| Self { start, length })
    }

    /// Exclusive end offset.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.length)
    }

    /// Returns `true` if `other` lies fully inside this range.
    #[must_use]
    pub fn contains_range(&self, other: TextRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Returns `true` if this range strictly straddles `other` on both sides.
    #[must_use]
    pub fn strictly_encloses(&self, other: TextRange) -> bool {
        self.start < other.start && self.end() > other.end()
    }
}

/// Table of line start offsets for one source text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Build the line table for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(to_u32(offset + 1));
            }
        }
        Self {
            line_starts,
            len: to_u32(text.len()),
        }
    }

    /// 1-indexed line containing `offset`, or `None` past the end of the text.
    #[must_use]
    pub fn line_of(&self, offset: u32) -> Option<u32> {
        if offset > self.len {
            return None;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset);
        Some(to_u32(line))
    }

    /// Start offset of the given 1-indexed line.
    #[must_use]
    pub fn line_start(&self, line: u32) -> Option<u32> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.line_starts.get(index).copied()
    }

    /// Number of lines in the text.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// An immutable view of a unit's source text at one version.
///
/// The version is bumped by the project model whenever the buffer changes;
/// anything computed against an older version is stale.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    version: u64,
    text: Arc<str>,
    lines: Arc<LineIndex>,
}

impl BufferSnapshot {
    /// Create a snapshot of `text` at `version`.
    #[must_use]
    pub fn new(version: u64, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let lines = Arc::new(LineIndex::new(&text));
        Self {
            version,
            text,
            lines,
        }
    }

    /// Buffer version this snapshot was taken at.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Full source text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Line table for the text.
    #[must_use]
    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    /// 1-indexed line containing `offset`.
    #[must_use]
    pub fn line_of(&self, offset: u32) -> Option<u32> {
        self.lines.line_of(offset)
    }

    /// The trimmed text of the line containing `offset`.
    #[must_use]
    pub fn line_text(&self, offset: u32) -> Option<&str> {
        let line = self.line_of(offset)?;
        let start = usize::try_from(self.lines.line_start(line)?).ok()?;
        let rest = self.text.get(start..)?;
        let end = rest.find('\n').unwrap_or(rest.len());
        Some(rest[..end].trim())
    }

    /// LSP position (0-indexed line, UTF-16 column) of `offset`.
    #[must_use]
    pub fn position(&self, offset: u32) -> Option<lsp_types::Position> {
        let line = self.line_of(offset)?;
        let start = usize::try_from(self.lines.line_start(line)?).ok()?;
        let end = usize::try_from(offset).ok()?;
        let prefix = self.text.get(start..end)?;
        let character = to_u32(prefix.encode_utf16().count());
        Some(lsp_types::Position::new(line - 1, character))
    }

    /// Byte offset of an LSP position. Columns past the end of the line clamp
    /// to the line end.
    #[must_use]
    pub fn offset(&self, position: lsp_types::Position) -> Option<u32> {
        let start = usize::try_from(self.lines.line_start(position.line.checked_add(1)?)?).ok()?;
        let rest = self.text.get(start..)?;
        let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
        let mut column = 0;
        for (index, ch) in line.char_indices() {
            if column >= position.character {
                return Some(to_u32(start + index));
            }
            column += to_u32(ch.len_utf16());
        }
        Some(to_u32(start + line.len()))
    }

    /// LSP range covering `range`.
    #[must_use]
    pub fn lsp_range(&self, range: TextRange) -> Option<lsp_types::Range> {
        Some(lsp_types::Range::new(
            self.position(range.start)?,
            self.position(range.end())?,
        ))
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
