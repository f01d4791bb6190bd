//! Typed value parsing
//!
//! Converts a raw token plus the declared [`FieldType`] into a [`Value`].
//! Struct-call tokens (`Name(args)`) become references or inline instances
//! depending on which structs are declared at the point the token is parsed.

use indexmap::IndexMap;

use crate::errors::{KeelError, KeelResult};
use crate::evaluator::value::{Instance, Reference, Text, Value};
use crate::lexer::source::SourceLocation;
use crate::lexer::{find_top_level, is_balanced, split_top_level};
use crate::schema::types::{FieldType, ScalarType};
use crate::schema::{FieldSchema, Struct};

/// A slice of a token with its column offset from the parser's base location
#[derive(Debug, Clone, Copy)]
struct Span<'t> {
    text: &'t str,
    column: usize,
}

impl<'t> Span<'t> {
    fn new(text: &'t str) -> Self {
        Self { text, column: 0 }
    }

    fn sub(&self, start: usize, end: usize) -> Span<'t> {
        Span {
            text: &self.text[start..end],
            column: self.column + self.text[..start].chars().count(),
        }
    }

    fn trim(&self) -> Span<'t> {
        let lead = self.text.len() - self.text.trim_start().len();
        let rest = self.sub(lead, self.text.len());
        Span {
            text: rest.text.trim_end(),
            column: rest.column,
        }
    }
}

/// Identifier shape: a letter or underscore, then letters, digits or underscores
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a `name: value` argument.
///
/// Returns the name and the byte offset where the value starts. The colon must
/// be followed by whitespace or end the argument, so `http://host` stays positional.
pub fn split_named(arg: &str) -> Option<(&str, usize)> {
    let colon = find_top_level(arg, ':')?;
    let name = arg[..colon].trim();
    let rest = &arg[colon + 1..];
    if !is_identifier(name) {
        return None;
    }
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    Some((name, colon + 1))
}

/// A malformed escape sequence found while decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeError {
    /// Byte offset of the backslash
    pub offset: usize,
    pub sequence: String,
    pub help: &'static str,
}

/// Decode backslash escapes, rejecting unknown sequences
pub fn decode_escapes(s: &str) -> Result<String, EscapeError> {
    decode(s, true)
}

/// Decode backslash escapes, keeping unknown sequences verbatim
pub fn decode_escapes_lossy(s: &str) -> String {
    decode(s, false).unwrap_or_else(|_| s.to_string())
}

fn decode(s: &str, strict: bool) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some((_, esc)) = chars.next() else {
            if strict {
                return Err(EscapeError {
                    offset,
                    sequence: "\\".to_string(),
                    help: "a string cannot end with a lone backslash",
                });
            }
            out.push('\\');
            break;
        };
        let simple = match esc {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            '0' => Some('\0'),
            '\\' | '"' | '\'' | '{' | '}' => Some(esc),
            _ => None,
        };
        if let Some(decoded) = simple {
            out.push(decoded);
            continue;
        }

        if esc == 'u' || esc == 'U' {
            let width = if esc == 'u' { 4 } else { 8 };
            let mut hex = String::new();
            while hex.len() < width {
                match chars.peek() {
                    Some(&(_, c)) if c.is_ascii_hexdigit() => {
                        hex.push(c);
                        chars.next();
                    }
                    _ => break,
                }
            }
            let decoded = (hex.len() == width)
                .then(|| u32::from_str_radix(&hex, 16).ok())
                .flatten()
                .and_then(char::from_u32);
            match decoded {
                Some(c) => out.push(c),
                None if strict => {
                    return Err(EscapeError {
                        offset,
                        sequence: format!("\\{}{}", esc, hex),
                        help: "unicode escapes are \\uXXXX or \\UXXXXXXXX with a valid code point",
                    })
                }
                None => {
                    out.push('\\');
                    out.push(esc);
                    out.push_str(&hex);
                }
            }
            continue;
        }

        if strict {
            return Err(EscapeError {
                offset,
                sequence: format!("\\{}", esc),
                help: "use '\\\\' for a literal backslash, or a single-quoted literal string",
            });
        }
        out.push('\\');
        out.push(esc);
    }

    Ok(out)
}

/// True when `s` has a `{` not preceded by an escaping backslash
fn has_placeholder(s: &str, escapes: bool) -> bool {
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if escapes => {
                chars.next();
            }
            '{' => return true,
            _ => {}
        }
    }
    false
}

/// Strip one leading newline from a triple-quoted body
fn strip_leading_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

/// Pad or truncate fractional seconds to exactly six digits
fn normalize_fraction(s: &str) -> String {
    match s.split_once('.') {
        Some((head, frac)) if !frac.is_empty() && frac.chars().all(|c| c.is_ascii_digit()) => {
            let mut digits: String = frac.chars().take(6).collect();
            while digits.len() < 6 {
                digits.push('0');
            }
            format!("{}.{}", head, digits)
        }
        _ => s.to_string(),
    }
}

/// Normalize a `time` literal
pub fn normalize_time(s: &str) -> String {
    normalize_fraction(s)
}

/// Normalize a `datetime` literal: `T` separator, `Z` as `+00:00`, six-digit fraction
pub fn normalize_datetime(s: &str) -> String {
    let mut s = s.to_string();
    if let Some(pos) = s.find(' ') {
        s.replace_range(pos..pos + 1, "T");
    }
    if s.ends_with('Z') || s.ends_with('z') {
        s.pop();
        s.push_str("+00:00");
    }
    let time_start = s.find('T').map_or(0, |p| p + 1);
    match s[time_start..].find(['+', '-']) {
        Some(p) => {
            let split = time_start + p;
            format!("{}{}", normalize_fraction(&s[..split]), &s[split..])
        }
        None => normalize_fraction(&s),
    }
}

/// Parse an integer: decimal, or `0x`/`0o`/`0b` prefixed, with an optional leading `-`
pub fn parse_int(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let prefix = body.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match prefix.as_deref() {
        Some("0x") => (16, &body[2..]),
        Some("0o") => (8, &body[2..]),
        Some("0b") => (2, &body[2..]),
        _ => (10, body),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        if magnitude == i64::MIN.unsigned_abs() {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|n| -n)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Parses tokens against declared types
pub struct ValueParser<'a> {
    structs: &'a IndexMap<String, Struct>,
    /// Location of the first character of the token handed to [`ValueParser::parse`]
    location: SourceLocation,
}

impl<'a> ValueParser<'a> {
    /// `structs` are the structs declared at the point the token is parsed
    pub fn new(structs: &'a IndexMap<String, Struct>, location: SourceLocation) -> Self {
        Self { structs, location }
    }

    fn at(&self, span: Span<'_>) -> SourceLocation {
        self.location
            .shifted(span.column, span.text.chars().count().max(1))
    }

    /// Parse a token at a declared type
    pub fn parse(&self, token: &str, ty: &FieldType) -> KeelResult<Value> {
        self.parse_span(Span::new(token).trim(), ty)
    }

    /// Parse a token for a field, enforcing its enum constraint
    pub fn parse_for_field(&self, token: &str, field: &FieldSchema) -> KeelResult<Value> {
        let value = self.parse(token, &field.ty)?;
        field.check_choice(&value)?;
        Ok(value)
    }

    /// Parse an enum-choice list `(a, b, ...)` at the field's type
    pub fn parse_choices(&self, token: &str, field: &FieldSchema) -> KeelResult<Vec<Value>> {
        let span = Span::new(token).trim();
        let invalid = |reason: &str| KeelError::InvalidEnumConstraint {
            location: self.at(span),
            field: field.name.clone(),
            reason: reason.to_string(),
        };

        if field.ty.array {
            return Err(invalid("array fields cannot be enum-constrained"));
        }
        if field.ty.scalar.is_struct() {
            return Err(invalid("struct-typed fields cannot be enum-constrained"));
        }
        let t = span.text;
        if !(t.len() >= 2 && t.starts_with('(') && t.ends_with(')') && is_balanced(&t[1..t.len() - 1])) {
            return Err(invalid("expected a list such as (a, b, c)"));
        }

        let inner = span.sub(1, t.len() - 1);
        let mut choices = Vec::new();
        for (offset, piece) in split_top_level(inner.text, ',') {
            let element = inner.sub(offset, offset + piece.len()).trim();
            if element.text.is_empty() {
                continue;
            }
            choices.push(self.parse_span(element, &field.ty)?);
        }
        if choices.is_empty() {
            return Err(invalid("the list of choices is empty"));
        }
        Ok(choices)
    }

    fn parse_span(&self, span: Span<'_>, ty: &FieldType) -> KeelResult<Value> {
        if span.text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        if ty.array {
            return self.parse_array(span, ty);
        }
        self.parse_scalar(span, &ty.scalar)
    }

    fn parse_scalar(&self, span: Span<'_>, scalar: &ScalarType) -> KeelResult<Value> {
        let text = span.text;
        match scalar {
            ScalarType::Bool => match text {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(KeelError::type_mismatch(
                    self.at(span),
                    "bool",
                    text,
                    "booleans are written as true or false",
                )),
            },
            ScalarType::Int => parse_int(text).map(Value::Int).ok_or_else(|| {
                KeelError::type_mismatch(
                    self.at(span),
                    "int",
                    text,
                    "integers are decimal, or prefixed with 0x, 0o or 0b",
                )
            }),
            ScalarType::Float => text.parse::<f64>().map(Value::Float).map_err(|_| {
                KeelError::type_mismatch(self.at(span), "float", text, "floats look like 1.5 or 2e10")
            }),
            ScalarType::Str => Ok(Value::String(self.parse_text(span)?)),
            ScalarType::Date => Ok(Value::Date(self.parse_text(span)?.text)),
            ScalarType::Time => Ok(Value::Time(normalize_time(&self.parse_text(span)?.text))),
            ScalarType::DateTime => Ok(Value::DateTime(normalize_datetime(
                &self.parse_text(span)?.text,
            ))),
            ScalarType::Struct(name) => self.parse_struct_call(span, name),
        }
    }

    /// Parse a string literal: `"..."`, `"""..."""`, `'...'`, `'''...'''` or a bare token
    fn parse_text(&self, span: Span<'_>) -> KeelResult<Text> {
        let t = span.text;

        if let Some(rest) = t.strip_prefix("\"\"\"") {
            let inner = rest
                .strip_suffix("\"\"\"")
                .filter(|_| t.len() >= 6)
                .ok_or_else(|| self.unterminated(span, "\"\"\""))?;
            let body_start = 3 + (inner.len() - strip_leading_newline(inner).len());
            return self.escaped_text(span.sub(body_start, t.len() - 3));
        }
        if let Some(rest) = t.strip_prefix("'''") {
            let inner = rest
                .strip_suffix("'''")
                .filter(|_| t.len() >= 6)
                .ok_or_else(|| self.unterminated(span, "'''"))?;
            return Ok(Text::plain(strip_leading_newline(inner)));
        }
        if let Some(rest) = t.strip_prefix('"') {
            rest.strip_suffix('"')
                .filter(|_| t.len() >= 2)
                .ok_or_else(|| self.unterminated(span, "\""))?;
            return self.escaped_text(span.sub(1, t.len() - 1));
        }
        if let Some(rest) = t.strip_prefix('\'') {
            let inner = rest
                .strip_suffix('\'')
                .filter(|_| t.len() >= 2)
                .ok_or_else(|| self.unterminated(span, "'"))?;
            return Ok(Text::plain(inner));
        }

        if has_placeholder(t, false) {
            Ok(Text::template(t, false))
        } else {
            Ok(Text::plain(t))
        }
    }

    fn escaped_text(&self, body: Span<'_>) -> KeelResult<Text> {
        let decoded = decode_escapes(body.text).map_err(|e| KeelError::InvalidEscapeSequence {
            location: self.at(body.sub(e.offset, e.offset)).shifted(0, e.sequence.chars().count()),
            sequence: e.sequence,
            help: e.help.to_string(),
        })?;
        if has_placeholder(body.text, true) {
            Ok(Text::template(body.text, true))
        } else {
            Ok(Text::plain(decoded))
        }
    }

    fn unterminated(&self, span: Span<'_>, delimiter: &str) -> KeelError {
        KeelError::Unterminated {
            location: self.at(span),
            what: "string".to_string(),
            delimiter: delimiter.to_string(),
        }
    }

    fn parse_array(&self, span: Span<'_>, ty: &FieldType) -> KeelResult<Value> {
        let t = span.text;
        let well_formed = t.len() >= 2
            && t.starts_with('[')
            && t.ends_with(']')
            && is_balanced(&t[1..t.len() - 1]);
        if !well_formed {
            return Err(KeelError::MalformedArray {
                location: self.at(span),
                found: t.to_string(),
            });
        }

        let inner = span.sub(1, t.len() - 1);
        let element_ty = ty.element();
        let mut items = Vec::new();
        for (offset, piece) in split_top_level(inner.text, ',') {
            let element = inner.sub(offset, offset + piece.len()).trim();
            if element.text.is_empty() {
                continue;
            }
            items.push(self.parse_span(element, &element_ty)?);
        }
        Ok(Value::Array(items))
    }

    /// `Name(args)`: a reference when `Name` has a primary key or is not declared
    /// yet, otherwise an inline instance
    fn parse_struct_call(&self, span: Span<'_>, expected: &str) -> KeelResult<Value> {
        let t = span.text;
        let malformed = |help: String| KeelError::MalformedStructCall {
            location: self.at(span),
            found: t.to_string(),
            help,
        };

        let Some(open) = t.find('(') else {
            return Err(malformed(format!("expected {}(...)", expected)));
        };
        let name = t[..open].trim_end();
        if !is_identifier(name) || !t.ends_with(')') || !is_balanced(&t[open + 1..t.len() - 1]) {
            return Err(malformed(format!("expected {}(...)", expected)));
        }
        if name != expected {
            return Err(KeelError::type_mismatch(
                self.at(span),
                expected,
                t,
                format!("this field holds {} values", expected),
            ));
        }

        let args = span.sub(open + 1, t.len() - 1);
        match self.structs.get(name) {
            Some(schema) if schema.primary_key.is_none() => self.inline_instance(span, name, args),
            _ => {
                let key = self.parse_text(args.trim())?;
                Ok(Value::Reference(Reference::new(name, key.text)))
            }
        }
    }

    /// Build an unbound inline instance; arguments stay raw tokens until binding
    fn inline_instance(&self, call: Span<'_>, name: &str, args: Span<'_>) -> KeelResult<Value> {
        let mut inst = Instance::new(name);
        inst.unbound = Some(self.at(call));

        let mut named_seen = false;
        for (position, (offset, piece)) in split_top_level(args.text, ',').into_iter().enumerate() {
            let arg = args.sub(offset, offset + piece.len()).trim();
            if arg.text.is_empty() {
                continue;
            }
            match split_named(arg.text) {
                Some((attr, value_start)) => {
                    named_seen = true;
                    let value = arg.sub(value_start, arg.text.len()).trim();
                    inst.fields
                        .insert(attr.to_string(), Value::String(Text::plain(value.text)));
                }
                None if named_seen => {
                    return Err(KeelError::PositionalAfterNamed {
                        schema: name.to_string(),
                    })
                }
                None => {
                    inst.fields.insert(
                        format!("_arg{}", position),
                        Value::String(Text::plain(arg.text)),
                    );
                }
            }
        }

        Ok(Value::Instance(inst))
    }
}
