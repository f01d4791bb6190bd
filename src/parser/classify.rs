//! Line classification
//!
//! Each logical line is exactly one of the shapes in [`LineKind`]. Shapes are
//! tried in a fixed order: struct header, field declaration, default override,
//! instance row, continuation. Some lines fit more than one shape, so the order
//! is part of the grammar.

use super::value::{is_identifier, split_named};

/// A field declaration: `[*?]type[[]] name: [value]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl<'l> {
    /// Declared without indentation
    pub global: bool,
    pub primary_key: bool,
    pub nullable: bool,
    pub type_name: &'l str,
    pub array: bool,
    pub name: &'l str,
    /// Byte offset of `name` in the line
    pub name_offset: usize,
    /// Trimmed text after the colon, possibly empty
    pub value: &'l str,
    /// Byte offset of `value` in the line
    pub value_offset: usize,
}

/// The shape of one logical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'l> {
    /// `Name:` at column 0
    StructHeader { name: &'l str },
    Field(FieldDecl<'l>),
    /// Indented `name: [value]` changing an existing field's default or choices
    DefaultOverride {
        name: &'l str,
        name_offset: usize,
        value: &'l str,
        value_offset: usize,
    },
    /// `- args`
    Row { args: &'l str, args_offset: usize },
    /// Indented text continuing the previous row
    Continuation { text: &'l str, offset: usize },
}

/// Classify a logical line. Returns `None` for an unindented line that fits no shape.
pub fn classify(line: &str) -> Option<LineKind<'_>> {
    struct_header(line)
        .or_else(|| field_decl(line).map(LineKind::Field))
        .or_else(|| default_override(line))
        .or_else(|| row(line))
        .or_else(|| continuation(line))
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Trimmed remainder of `line` starting at `from`, with its byte offset
fn trimmed_from(line: &str, from: usize) -> (&str, usize) {
    let rest = &line[from..];
    let lead = rest.len() - rest.trim_start().len();
    (rest.trim(), from + lead)
}

fn struct_header(line: &str) -> Option<LineKind<'_>> {
    let name = line.strip_suffix(':')?;
    let starts_upper = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    (starts_upper && is_identifier(name)).then_some(LineKind::StructHeader { name })
}

/// Length of the identifier at the start of `s`
fn identifier_len(s: &str) -> usize {
    let len = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    if is_identifier(&s[..len]) {
        len
    } else {
        0
    }
}

fn field_decl(line: &str) -> Option<FieldDecl<'_>> {
    let indent = indent_of(line);
    let mut pos = indent;
    let mut primary_key = false;
    let mut nullable = false;

    loop {
        match line[pos..].chars().next() {
            Some('*') => primary_key = true,
            Some('?') => nullable = true,
            _ => break,
        }
        pos += 1;
    }
    pos += indent_of(&line[pos..]);

    let type_len = identifier_len(&line[pos..]);
    if type_len == 0 {
        return None;
    }
    let type_name = &line[pos..pos + type_len];
    pos += type_len;

    let array = line[pos..].starts_with("[]");
    if array {
        pos += 2;
    }

    let gap = indent_of(&line[pos..]);
    if gap == 0 {
        return None;
    }
    pos += gap;

    let name_offset = pos;
    let name_len = identifier_len(&line[pos..]);
    if name_len == 0 {
        return None;
    }
    let name = &line[pos..pos + name_len];
    pos += name_len;
    pos += indent_of(&line[pos..]);

    if !line[pos..].starts_with(':') {
        return None;
    }
    let (value, value_offset) = trimmed_from(line, pos + 1);

    Some(FieldDecl {
        global: indent == 0,
        primary_key,
        nullable,
        type_name,
        array,
        name,
        name_offset,
        value,
        value_offset,
    })
}

fn default_override(line: &str) -> Option<LineKind<'_>> {
    let indent = indent_of(line);
    if indent == 0 {
        return None;
    }
    let body = &line[indent..];
    let (name, value_start) = split_named(body)?;
    // The whole text before the colon must be the name
    if body[..value_start - 1].trim_end() != name {
        return None;
    }
    let (value, value_offset) = trimmed_from(line, indent + value_start);
    Some(LineKind::DefaultOverride {
        name,
        name_offset: indent,
        value,
        value_offset,
    })
}

fn row(line: &str) -> Option<LineKind<'_>> {
    let indent = indent_of(line);
    let rest = line[indent..].strip_prefix('-')?;
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    Some(LineKind::Row {
        args: rest,
        args_offset: indent + 1,
    })
}

fn continuation(line: &str) -> Option<LineKind<'_>> {
    let indent = indent_of(line);
    (indent > 0).then(|| LineKind::Continuation {
        text: &line[indent..],
        offset: indent,
    })
}
