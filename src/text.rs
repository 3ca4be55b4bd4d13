use std::{fmt, ops::Range, path::PathBuf};

/// Immutable program text with precomputed line starts.
#[derive(Debug)]
pub struct SourceText {
    text: String,
    path: Option<PathBuf>,
    line_starts: Vec<usize>,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> SourceText {
        let text = text.into();
        let line_starts = line_starts(&text);
        SourceText {
            text,
            path: None,
            line_starts,
        }
    }

    pub fn with_path(text: impl Into<String>, path: impl Into<PathBuf>) -> SourceText {
        SourceText {
            path: Some(path.into()),
            ..SourceText::new(text)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Returns the zero-based line index containing the byte offset `pos`.
    pub fn line_index(&self, pos: usize) -> usize {
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    /// Returns the span of the given line, excluding its line break.
    pub fn line_span(&self, line: usize) -> Span {
        let lo = self.line_starts[line];
        let mut hi = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text.len());
        let bytes = self.text.as_bytes();
        while hi > lo && matches!(bytes[hi - 1], b'\n' | b'\r') {
            hi -= 1;
        }
        Span::new_of_bounds(lo..hi)
    }

    /// Maps a span to its one-based start and end positions.
    pub fn location(&self, span: Span) -> TextLocation {
        let start = self.position(span.lo);
        let end = self.position(span.hi());
        TextLocation { start, end }
    }

    fn position(&self, pos: usize) -> LinePosition {
        let pos = pos.min(self.text.len());
        let line = self.line_index(pos);
        let column = self.text[self.line_starts[line]..pos].chars().count();
        LinePosition {
            line: line + 1,
            column: column + 1,
        }
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                i += 2;
                starts.push(i);
            }
            b'\r' | b'\n' => {
                i += 1;
                starts.push(i);
            }
            _ => i += 1,
        }
    }
    starts
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinePosition {
    pub line: usize,
    pub column: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextLocation {
    pub start: LinePosition,
    pub end: LinePosition,
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).expect("span too long"))
    }

    pub const fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span covering both spans and everything in between.
    pub fn to(self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_bounds(lo..hi)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}
