//! Shared utility functions for LSP handlers.
//!
//! Position conversion between byte offsets and LSP positions (UTF-16
//! columns), identifier extraction, and URI/path conversion.

use lsp_types::{Position, Range, Uri};
use sqlc_lens_core::Span;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A line index for offset/position conversion.
///
/// Building the index is O(n) where n is the source length; lookups binary
/// search the line table and then walk a single line.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    /// Byte offset of the start of each line (including line 0 at offset 0).
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Build a line index from source text.
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|&(_, ch)| ch == '\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    /// Convert a byte offset to an LSP position.
    ///
    /// Offsets past the end clamp to the end; offsets inside a character
    /// round down to its start.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts[line];
        let character: usize = self.source[line_start..offset]
            .chars()
            .map(char::len_utf16)
            .sum();

        Position::new(line as u32, character as u32)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Returns `None` if the line is out of bounds. Columns past the end of
    /// the line clamp to the line end.
    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let line_start = *self.line_starts.get(line)?;
        let line_end = self
            .line_starts
            .get(line + 1)
            .map_or(self.source.len(), |next| next - 1);

        let mut remaining = position.character as usize;
        for (i, ch) in self.source[line_start..line_end].char_indices() {
            if remaining == 0 {
                return Some(line_start + i);
            }
            remaining = remaining.saturating_sub(ch.len_utf16());
        }
        Some(line_end)
    }

    /// Convert a byte span to an LSP range.
    pub fn span_to_range(&self, span: Span) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }

    /// Get the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Check if a character can be part of a JavaScript identifier.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Get the identifier touching a byte offset, with its span.
pub fn word_at_offset(source: &str, offset: usize) -> Option<(&str, Span)> {
    let offset = offset.min(source.len());

    let start = source[..offset]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word_char(c))
        .last()
        .map_or(offset, |(i, _)| i);
    let end = source[offset..]
        .char_indices()
        .find(|&(_, c)| !is_word_char(c))
        .map_or(source.len(), |(i, _)| offset + i);

    (start < end).then(|| (&source[start..end], Span::new(start, end)))
}

/// Get the identifier at an LSP position in a source document.
pub fn word_at_position<'s>(index: &LineIndex<'s>, position: Position) -> Option<(&'s str, Span)> {
    let offset = index.position_to_offset(position)?;
    word_at_offset(index.source, offset)
}

/// Convert a `file://` URI to a file path.
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    url::Url::parse(uri.as_str()).ok()?.to_file_path().ok()
}

/// Convert an absolute file path to a `file://` URI.
pub fn path_to_uri(path: &Path) -> Option<Uri> {
    let url = url::Url::from_file_path(path).ok()?;
    Uri::from_str(url.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_basic() {
        let source = "line1\nline2\nline3";
        let index = LineIndex::new(source);

        assert_eq!(index.offset_to_position(0), Position::new(0, 0));
        assert_eq!(index.offset_to_position(5), Position::new(0, 5));
        assert_eq!(index.offset_to_position(6), Position::new(1, 0));
        assert_eq!(index.offset_to_position(10), Position::new(1, 4));
        assert_eq!(index.offset_to_position(17), Position::new(2, 5));
        assert_eq!(index.offset_to_position(100), Position::new(2, 5));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_line_index_utf16_columns() {
        // 'é' is 2 bytes and 1 UTF-16 unit, '😀' is 4 bytes and 2 units.
        let source = "é😀x\nnext";
        let index = LineIndex::new(source);

        assert_eq!(index.offset_to_position(2), Position::new(0, 1));
        assert_eq!(index.offset_to_position(6), Position::new(0, 3));
        assert_eq!(index.offset_to_position(7), Position::new(0, 4));
        // Inside the emoji rounds down.
        assert_eq!(index.offset_to_position(4), Position::new(0, 1));

        assert_eq!(index.position_to_offset(Position::new(0, 3)), Some(6));
        assert_eq!(index.position_to_offset(Position::new(1, 2)), Some(10));
    }

    #[test]
    fn test_line_index_position_to_offset() {
        let source = "line1\nline2\nline3";
        let index = LineIndex::new(source);

        assert_eq!(index.position_to_offset(Position::new(0, 0)), Some(0));
        assert_eq!(index.position_to_offset(Position::new(1, 4)), Some(10));
        assert_eq!(index.position_to_offset(Position::new(2, 0)), Some(12));
        // Past the end of a line clamps to the line end.
        assert_eq!(index.position_to_offset(Position::new(0, 100)), Some(5));
        assert_eq!(index.position_to_offset(Position::new(3, 0)), None);
    }

    #[test]
    fn test_line_index_trailing_newline() {
        let index = LineIndex::new("line1\nline2\n");
        assert_eq!(index.offset_to_position(12), Position::new(2, 0));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_word_at_offset() {
        let source = "const user = await getUser(client, $id);";

        assert_eq!(
            word_at_offset(source, 22),
            Some(("getUser", Span::new(19, 26)))
        );
        // At the end of a word.
        assert_eq!(word_at_offset(source, 26).map(|(w, _)| w), Some("getUser"));
        assert_eq!(word_at_offset(source, 36).map(|(w, _)| w), Some("$id"));
        assert_eq!(word_at_offset(source, 12), None);
    }

    #[test]
    fn test_word_at_position() {
        let source = "import { getUser } from \"x\";\nawait getUser();\n";
        let index = LineIndex::new(source);
        let (word, span) = word_at_position(&index, Position::new(1, 8)).unwrap();
        assert_eq!(word, "getUser");
        assert_eq!(index.span_to_range(span), Range::new(Position::new(1, 6), Position::new(1, 13)));
    }

    #[test]
    fn test_uri_round_trip() {
        let path = PathBuf::from("/work/app/db/queries/user name.sql");
        let uri = path_to_uri(&path).unwrap();
        assert_eq!(uri.as_str(), "file:///work/app/db/queries/user%20name.sql");
        assert_eq!(uri_to_path(&uri), Some(path));

        let other: Uri = "untitled:Untitled-1".parse().unwrap();
        assert_eq!(uri_to_path(&other), None);
    }
}
