use dashmap::DashMap;
use tower_lsp::lsp_types::{Position, Range};

pub type DocumentStore = DashMap<String, Document>;

/// An open buffer plus its line table. Positions handed to and from the
/// client are UTF-16 columns; everything the scanners produce is in bytes.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    language_id: Option<String>,
    line_starts: Vec<usize>,
}

impl Document {
    pub fn new(text: String) -> Self {
        let mut line_starts = vec![0];
        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            text,
            language_id: None,
            line_starts,
        }
    }

    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = Some(language_id.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        let slice = &self.text[start..end];
        let slice = slice.strip_suffix('\n').unwrap_or(slice);
        Some(slice.strip_suffix('\r').unwrap_or(slice))
    }

    pub fn lines(&self) -> Vec<&str> {
        (0..self.line_count()).filter_map(|n| self.line(n)).collect()
    }

    pub fn byte_column(&self, position: Position) -> Option<usize> {
        let line = self.line(position.line as usize)?;
        let mut units = 0u32;
        for (byte_idx, ch) in line.char_indices() {
            if units >= position.character {
                return Some(byte_idx);
            }
            units += ch.len_utf16() as u32;
        }
        if units >= position.character {
            return Some(line.len());
        }
        None
    }

    pub fn position(&self, line: usize, byte_column: usize) -> Position {
        let content = self.line(line).unwrap_or_default();
        let clamped = floor_char_boundary(content, byte_column.min(content.len()));
        Position {
            line: line as u32,
            character: utf16_len(&content[..clamped]),
        }
    }

    pub fn span(&self, line: usize, start: usize, end: usize) -> Range {
        Range {
            start: self.position(line, start),
            end: self.position(line, end),
        }
    }

    pub fn line_range(&self, start: usize, end: usize) -> Range {
        let end_len = self.line(end).map(utf16_len).unwrap_or(0);
        Range {
            start: Position {
                line: start as u32,
                character: 0,
            },
            end: Position {
                line: end as u32,
                character: end_len,
            },
        }
    }
}

fn utf16_len(text: &str) -> u32 {
    text.chars().map(|ch| ch.len_utf16() as u32).sum()
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_strip_crlf_and_keep_trailing_empty_line() {
        let doc = Document::new("Script 1:\r\n    End\n".to_string());
        assert_eq!(doc.lines(), vec!["Script 1:", "    End", ""]);
        assert_eq!(doc.line_count(), 3);
    }

    #[test]
    fn converts_between_utf16_and_byte_columns() {
        let doc = Document::new("Message \"é\" Script#2\n".to_string());
        let byte_col = "Message \"é\" ".len();
        let position = doc.position(0, byte_col);
        assert_eq!(position.character, 12);
        assert_eq!(doc.byte_column(position), Some(byte_col));
    }

    #[test]
    fn line_range_spans_to_end_of_last_line() {
        let doc = Document::new("Script 1:\n    End\n".to_string());
        let range = doc.line_range(0, 1);
        assert_eq!(range.end.line, 1);
        assert_eq!(range.end.character, 7);
    }
}
