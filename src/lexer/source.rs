use std::fmt;
use std::path::PathBuf;

/// Display width of a tab stop when rendering source snippets
pub const TAB_WIDTH: usize = 8;

/// One physical source line, as produced by include expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Line text without the trailing newline
    pub text: String,
    /// File the line came from (if known)
    pub file: Option<PathBuf>,
    /// Line number in that file (1-indexed)
    pub line: usize,
}

impl SourceLine {
    pub fn new(text: impl Into<String>, file: Option<PathBuf>, line: usize) -> Self {
        Self {
            text: text.into(),
            file,
            line,
        }
    }

    /// Split in-memory text into lines with no origin file
    pub fn from_text(content: &str) -> Vec<SourceLine> {
        content
            .lines()
            .enumerate()
            .map(|(i, text)| SourceLine::new(text, None, i + 1))
            .collect()
    }

    /// Location of a 1-indexed column on this line
    pub fn location(&self, column: usize, length: usize) -> SourceLocation {
        SourceLocation::new(
            self.file.clone(),
            self.line,
            column,
            length,
            self.text.clone(),
        )
    }
}

/// Source location information for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File path (if known)
    pub file: Option<PathBuf>,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
    /// Length in characters of the offending text
    pub length: usize,
    /// Full text of the source line
    pub text: String,
}

impl SourceLocation {
    pub fn new(
        file: Option<PathBuf>,
        line: usize,
        column: usize,
        length: usize,
        text: impl Into<String>,
    ) -> Self {
        Self {
            file,
            line,
            column,
            length,
            text: text.into(),
        }
    }

    /// Same line, moved right by `chars` columns
    pub fn shifted(&self, chars: usize, length: usize) -> SourceLocation {
        SourceLocation {
            column: self.column + chars,
            length,
            ..self.clone()
        }
    }

    /// Render the source line with a caret under the reported column.
    ///
    /// Tabs expand to the next multiple of [`TAB_WIDTH`] display columns, both
    /// in the echoed line and when positioning the caret.
    pub fn caret_lines(&self) -> (String, String) {
        let mut display = String::new();
        let mut caret_at = None;
        let mut width = 0;

        for (i, ch) in self.text.chars().enumerate() {
            if i + 1 == self.column {
                caret_at = Some(width);
            }
            if ch == '\t' {
                let next = (width / TAB_WIDTH + 1) * TAB_WIDTH;
                display.extend(std::iter::repeat(' ').take(next - width));
                width = next;
            } else {
                display.push(ch);
                width += 1;
            }
        }

        let start = caret_at.unwrap_or(width);
        let carets = "^".repeat(self.length.max(1));
        (display, format!("{}{}", " ".repeat(start), carets))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(path) => write!(f, "{}:{}:{}", path.display(), self.line, self.column),
            None => write!(f, "<input>:{}:{}", self.line, self.column),
        }
    }
}
