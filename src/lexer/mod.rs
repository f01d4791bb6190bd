//! Line assembly for the Keel configuration language.
//!
//! Turns physical [`source::SourceLine`]s into [`LogicalLine`]s: comments are
//! stripped, trailing-backslash continuations are joined, and triple-quoted
//! literals or unbalanced parentheses keep consuming lines until they close.
//!
//! The quote/bracket-aware [`ScanState`] used here is shared with the parser for
//! top-level splitting of argument lists.

pub mod source;

use crate::errors::{KeelError, KeelResult};
use source::{SourceLine, SourceLocation};

/// String state of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quote {
    #[default]
    None,
    Double,
    Single,
    TripleDouble,
    TripleSingle,
}

impl Quote {
    fn is_triple(self) -> bool {
        matches!(self, Quote::TripleDouble | Quote::TripleSingle)
    }
}

/// A quote only opens a string at the start of a token, so `O'Brien` stays bare
fn opens_string(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, ',' | '(' | '[' | '{' | ':'),
    }
}

/// Incremental quote and nesting tracker
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanState {
    pub quote: Quote,
    /// Depth of `(`
    pub parens: usize,
    /// Depth of `[` and `{`
    pub brackets: usize,
    prev: Option<char>,
    /// Byte offset (in the line being scanned) where the current open construct began
    opened_at: Option<usize>,
}

impl ScanState {
    /// True when outside every string and bracket pair
    pub fn at_top_level(&self) -> bool {
        self.quote == Quote::None && self.parens == 0 && self.brackets == 0
    }

    /// True when a triple-quoted literal or a parenthesized list is still open
    pub fn is_open(&self) -> bool {
        self.quote.is_triple() || self.parens > 0
    }

    /// Advance over one lexical unit at the start of `rest`, which begins at
    /// byte `offset` of its line. Returns the unit length in bytes and whether
    /// the unit is code (outside any string).
    fn step(&mut self, rest: &str, offset: usize) -> (usize, bool) {
        let Some(ch) = rest.chars().next() else {
            return (0, false);
        };
        let len = ch.len_utf8();

        match self.quote {
            Quote::None => {
                if opens_string(self.prev) {
                    let opened = if rest.starts_with("\"\"\"") {
                        Some((Quote::TripleDouble, 3))
                    } else if rest.starts_with("'''") {
                        Some((Quote::TripleSingle, 3))
                    } else if ch == '"' {
                        Some((Quote::Double, 1))
                    } else if ch == '\'' {
                        Some((Quote::Single, 1))
                    } else {
                        None
                    };
                    if let Some((quote, width)) = opened {
                        if quote.is_triple() && self.parens == 0 {
                            self.opened_at = Some(offset);
                        }
                        self.quote = quote;
                        self.prev = Some(ch);
                        return (width, false);
                    }
                }

                match ch {
                    '(' => {
                        if self.parens == 0 {
                            self.opened_at = Some(offset);
                        }
                        self.parens += 1;
                    }
                    ')' => self.parens = self.parens.saturating_sub(1),
                    '[' | '{' => self.brackets += 1,
                    ']' | '}' => self.brackets = self.brackets.saturating_sub(1),
                    _ => {}
                }
                self.prev = Some(ch);
                (len, true)
            }
            Quote::Double | Quote::TripleDouble if ch == '\\' => {
                let escaped = rest[1..].chars().next().map_or(0, char::len_utf8);
                (1 + escaped, false)
            }
            Quote::Double if ch == '"' => {
                self.quote = Quote::None;
                self.prev = Some(ch);
                (len, false)
            }
            Quote::Single if ch == '\'' => {
                self.quote = Quote::None;
                self.prev = Some(ch);
                (len, false)
            }
            Quote::TripleDouble if rest.starts_with("\"\"\"") => {
                self.quote = Quote::None;
                self.prev = Some('"');
                (3, false)
            }
            Quote::TripleSingle if rest.starts_with("'''") => {
                self.quote = Quote::None;
                self.prev = Some('\'');
                (3, false)
            }
            _ => (len, false),
        }
    }

    /// Forget single-line string state at the end of a physical line
    fn end_line(&mut self) {
        if matches!(self.quote, Quote::Double | Quote::Single) {
            self.quote = Quote::None;
        }
        self.prev = None;
    }
}

/// Scan `text` from `state`, returning the byte length of the code before any `#` comment
fn strip_comment(text: &str, state: &mut ScanState) -> usize {
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if state.quote == Quote::None && rest.starts_with('#') {
            return i;
        }
        let (len, _) = state.step(rest, i);
        i += len.max(1);
    }
    text.len()
}

/// Split `text` on `sep` wherever it appears outside strings and brackets.
///
/// Returns each piece with its byte offset in `text`; pieces are not trimmed.
pub fn split_top_level(text: &str, sep: char) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut state = ScanState::default();
    let mut start = 0;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let at_top = state.at_top_level();
        let (len, is_code) = state.step(rest, i);
        if is_code && at_top && rest.starts_with(sep) {
            pieces.push((start, &text[start..i]));
            start = i + len;
        }
        i += len.max(1);
    }
    pieces.push((start, &text[start.min(text.len())..]));
    pieces
}

/// Byte offset of the first `sep` outside strings and brackets
pub fn find_top_level(text: &str, sep: char) -> Option<usize> {
    let mut state = ScanState::default();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let at_top = state.at_top_level();
        let (len, is_code) = state.step(rest, i);
        if is_code && at_top && rest.starts_with(sep) {
            return Some(i);
        }
        i += len.max(1);
    }
    None
}

/// True when every bracket in `text` is matched and no string is left open
pub fn is_balanced(text: &str) -> bool {
    let mut state = ScanState::default();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        if state.quote == Quote::None {
            let unmatched = match rest.chars().next() {
                Some(')') => state.parens == 0,
                Some(']') | Some('}') => state.brackets == 0,
                _ => false,
            };
            if unmatched {
                return false;
            }
        }
        let (len, _) = state.step(rest, i);
        i += len.max(1);
    }
    state.at_top_level()
}

/// A logical line: one or more physical lines joined for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// Comment-stripped text; multi-line literals keep their `\n` separators
    pub text: String,
    /// First physical line of this logical line
    pub origin: SourceLine,
}

impl LogicalLine {
    /// Location of the `len`-byte span starting at byte `offset` of [`Self::text`]
    pub fn location(&self, offset: usize, len: usize) -> SourceLocation {
        let column = self
            .text
            .get(..offset)
            .map_or(offset, |prefix| prefix.chars().count())
            + 1;
        let length = self
            .text
            .get(offset..offset + len)
            .map_or(len, |span| span.chars().count());
        self.origin.location(column, length)
    }
}

/// Line under construction
struct Pending {
    text: String,
    origin: SourceLine,
    /// Location of the delimiter keeping the line open
    opened: Option<SourceLocation>,
    /// Set by a trailing backslash
    join_next: bool,
}

/// Assemble physical lines into logical lines
pub fn assemble(lines: &[SourceLine]) -> KeelResult<Vec<LogicalLine>> {
    let mut logical = Vec::new();
    let mut state = ScanState::default();
    let mut pending: Option<Pending> = None;

    for line in lines {
        let was_open = state.is_open();
        state.opened_at = None;
        let code_len = strip_comment(&line.text, &mut state);
        let code = &line.text[..code_len];

        let mut current = match pending.take() {
            Some(mut p) if was_open => {
                p.text.push('\n');
                p.text.push_str(code);
                p
            }
            Some(mut p) if p.join_next => {
                p.text.push_str(code.trim_start());
                p.join_next = false;
                p
            }
            _ => Pending {
                text: code.to_string(),
                origin: line.clone(),
                opened: None,
                join_next: false,
            },
        };

        if state.is_open() {
            if current.opened.is_none() {
                let offset = state.opened_at.unwrap_or(0);
                let column = line.text[..offset.min(line.text.len())].chars().count() + 1;
                let width = if state.quote.is_triple() { 3 } else { 1 };
                current.opened = Some(line.location(column, width));
            }
            pending = Some(current);
            state.end_line();
            continue;
        }
        state.end_line();
        current.opened = None;

        let trimmed_len = current.text.trim_end().len();
        if current.text[..trimmed_len].ends_with('\\') {
            current.text.truncate(trimmed_len - 1);
            current.join_next = true;
            pending = Some(current);
            continue;
        }

        push_logical(&mut logical, current);
    }

    if let Some(current) = pending {
        if let Some(location) = current.opened {
            return Err(if state.quote.is_triple() {
                let delimiter = if state.quote == Quote::TripleDouble {
                    "\"\"\""
                } else {
                    "'''"
                };
                KeelError::Unterminated {
                    location,
                    what: "multi-line string".to_string(),
                    delimiter: delimiter.to_string(),
                }
            } else {
                KeelError::UnterminatedList { location }
            });
        }
        push_logical(&mut logical, current);
    }

    Ok(logical)
}

fn push_logical(logical: &mut Vec<LogicalLine>, pending: Pending) {
    if pending.text.trim().is_empty() {
        return;
    }
    logical.push(LogicalLine {
        text: pending.text.trim_end().to_string(),
        origin: pending.origin,
    });
}
