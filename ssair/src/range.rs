//! Source text and byte ranges attached to instructions.
use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

/// In-memory copy of one source file, shared by every range pointing into it.
pub struct SourceEditor {
    url: String,
    source: String,
    line_starts: Vec<usize>,
}

impl SourceEditor {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            url: String::new(),
            source,
            line_starts,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Stable hash of the source text, used to detect unchanged files.
    pub fn source_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.source.hash(&mut hasher);
        hasher.finish()
    }

    /// Zero-based line index containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        }
    }

    /// One-based line and column of `offset`.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = self.line_of(offset);
        Position {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }

    /// Text of the zero-based line `line`, without its trailing newline.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        self.source
            .get(start..end)
            .map(|text| text.strip_suffix('\r').unwrap_or(text))
    }

    /// Range covering the whole file.
    pub fn full_range(self: &Arc<Self>) -> SourceRange {
        SourceRange::new(Arc::clone(self), 0, self.source.len())
    }
}

impl fmt::Debug for SourceEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEditor")
            .field("url", &self.url)
            .field("len", &self.source.len())
            .finish()
    }
}

/// One-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A byte span `[start, end)` inside a [`SourceEditor`].
#[derive(Clone)]
pub struct SourceRange {
    editor: Arc<SourceEditor>,
    start: usize,
    end: usize,
}

impl SourceRange {
    /// Create a range, clamping both ends to the editor and ordering them.
    pub fn new(editor: Arc<SourceEditor>, start: usize, end: usize) -> Self {
        let len = editor.len();
        let (start, end) = (start.min(len), end.min(len));
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self { editor, start, end }
    }

    pub fn editor(&self) -> &Arc<SourceEditor> {
        &self.editor
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn start_position(&self) -> Position {
        self.editor.position(self.start)
    }

    pub fn end_position(&self) -> Position {
        self.editor.position(self.end)
    }

    /// Source text covered by the range. Empty if the span does not fall on
    /// character boundaries.
    pub fn text(&self) -> &str {
        self.editor.source().get(self.start..self.end).unwrap_or("")
    }

    /// The lines covered by the range plus `n` lines before and after, each
    /// prefixed with its one-based line number.
    pub fn text_context(&self, n: usize) -> String {
        let first = self.editor.line_of(self.start).saturating_sub(n);
        let last = self
            .editor
            .line_of(self.end)
            .saturating_add(n)
            .min(self.editor.line_count().saturating_sub(1));

        (first..=last)
            .filter_map(|line| {
                self.editor
                    .line_text(line)
                    .map(|text| format!("{:>4} | {}", line + 1, text))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PartialEq for SourceRange {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.editor, &other.editor)
            && self.start == other.start
            && self.end == other.end
    }
}

impl Eq for SourceRange {}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{}",
            self.editor.url(),
            self.start_position(),
            self.end_position()
        )
    }
}
