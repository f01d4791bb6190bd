//! Error types, diagnostics, and result aliases for the Keel compiler.
//!
//! All user-facing errors are variants of [`KeelError`], rendered via `miette` diagnostics.
//! Errors raised while reading source text carry a [`SourceLocation`] that can be
//! rendered as a source line plus caret with [`KeelError::snippet`].

use miette::Diagnostic;
use thiserror::Error;

use crate::lexer::source::SourceLocation;

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, a_ch) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Find the best "did you mean?" suggestion from a list of candidates
pub fn find_similar(name: &str, candidates: &[String], max_distance: usize) -> Option<String> {
    let name_lower = name.to_lowercase();
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let distance = levenshtein_distance(&name_lower, &candidate.to_lowercase());
        if distance <= max_distance && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

/// Generate a help message for an unknown name with suggestions
pub fn unknown_name_help(name: &str, kind: &str, available: &[String]) -> String {
    // Longer names allow more typos
    let max_distance = (name.len() / 3).clamp(2, 3);

    if let Some(suggestion) = find_similar(name, available, max_distance) {
        format!("did you mean '{}'?", suggestion)
    } else if available.is_empty() {
        format!("no {}s are declared", kind)
    } else if available.len() <= 5 {
        format!("available {}s: {}", kind, available.join(", "))
    } else {
        format!("check the {} name for typos", kind)
    }
}

/// Main error type for Keel
#[derive(Error, Debug, Diagnostic)]
pub enum KeelError {
    #[error("{location}: {message}")]
    #[diagnostic(code(E0001), help("{help}"))]
    UnexpectedLine {
        location: SourceLocation,
        message: String,
        help: String,
    },

    #[error("{location}: unterminated {what}")]
    #[diagnostic(code(E0004), help("add the closing {delimiter}"))]
    Unterminated {
        location: SourceLocation,
        what: String,
        delimiter: String,
    },

    #[error("{location}: invalid escape sequence {sequence}")]
    #[diagnostic(code(E0005), help("{help}"))]
    InvalidEscapeSequence {
        location: SourceLocation,
        sequence: String,
        help: String,
    },

    #[error("{location}: unterminated parenthesized list")]
    #[diagnostic(code(E0006), help("add the closing ')'"))]
    UnterminatedList { location: SourceLocation },

    #[error("{location}: {what} outside of a struct block")]
    #[diagnostic(
        code(E0007),
        help("declare a struct header such as `Name:` before this line")
    )]
    OutsideStruct {
        location: SourceLocation,
        what: String,
    },

    #[error("{location}: include not found: {path}")]
    #[diagnostic(code(E0101))]
    IncludeNotFound {
        location: SourceLocation,
        path: String,
    },

    #[error("{location}: expected {expected}, found '{found}'")]
    #[diagnostic(code(E0202), help("{help}"))]
    TypeMismatch {
        location: SourceLocation,
        expected: String,
        found: String,
        help: String,
    },

    #[error("{location}: malformed array '{found}'")]
    #[diagnostic(code(E0207), help("arrays are written as [a, b, c] or []"))]
    MalformedArray {
        location: SourceLocation,
        found: String,
    },

    #[error("{location}: malformed struct call '{found}'")]
    #[diagnostic(code(E0208), help("{help}"))]
    MalformedStructCall {
        location: SourceLocation,
        found: String,
        help: String,
    },

    #[error("{location}: invalid enum constraint on field '{field}': {reason}")]
    #[diagnostic(
        code(E0209),
        help("enum constraints are only allowed on non-array scalar fields")
    )]
    InvalidEnumConstraint {
        location: SourceLocation,
        field: String,
        reason: String,
    },

    #[error("value '{value}' is not allowed for field '{field}'")]
    #[diagnostic(code(E0210), help("allowed values: {choices}"))]
    EnumViolation {
        field: String,
        value: String,
        choices: String,
    },

    #[error("unknown struct '{name}' (referenced with key '{key}')")]
    #[diagnostic(code(E0301), help("{help}"))]
    UnknownStruct {
        name: String,
        key: String,
        help: String,
    },

    #[error("unknown field '{field}' in struct '{schema}'")]
    #[diagnostic(code(E0302), help("{help}"))]
    UnknownField {
        schema: String,
        field: String,
        help: String,
    },

    #[error("no '{schema}' instance has primary key '{key}'")]
    #[diagnostic(
        code(E0303),
        help("references are matched against the rendered text of the primary key")
    )]
    UnknownPrimaryKey { schema: String, key: String },

    #[error("too many positional arguments for struct '{schema}': got {count}, fields declared: {max}")]
    #[diagnostic(code(E0304), help("remove the extra arguments or declare more fields"))]
    TooManyArguments {
        schema: String,
        count: usize,
        max: usize,
    },

    #[error("positional argument after named arguments for struct '{schema}'")]
    #[diagnostic(code(E0305), help("move positional arguments before any `name: value` argument"))]
    PositionalAfterNamed { schema: String },

    #[error("circular reference: {chain}")]
    #[diagnostic(code(E0501), help("a referenced row cannot refer back to itself"))]
    CircularReference { chain: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

impl KeelError {
    /// Create an UnexpectedLine error
    pub fn unexpected_line(
        location: SourceLocation,
        message: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        KeelError::UnexpectedLine {
            location,
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a TypeMismatch error
    pub fn type_mismatch(
        location: SourceLocation,
        expected: impl Into<String>,
        found: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        KeelError::TypeMismatch {
            location,
            expected: expected.into(),
            found: found.into(),
            help: help.into(),
        }
    }

    /// Create an UnknownField error with a "did you mean" hint
    pub fn unknown_field(
        schema: impl Into<String>,
        field: impl Into<String>,
        available: &[String],
    ) -> Self {
        let field = field.into();
        let help = unknown_name_help(&field, "field", available);
        KeelError::UnknownField {
            schema: schema.into(),
            field,
            help,
        }
    }

    /// Create an UnknownStruct error with a "did you mean" hint
    pub fn unknown_struct(
        name: impl Into<String>,
        key: impl Into<String>,
        available: &[String],
    ) -> Self {
        let name = name.into();
        let help = unknown_name_help(&name, "struct", available);
        KeelError::UnknownStruct {
            name,
            key: key.into(),
            help,
        }
    }

    /// Create a TooManyArguments error
    pub fn too_many_arguments(schema: impl Into<String>, count: usize, max: usize) -> Self {
        KeelError::TooManyArguments {
            schema: schema.into(),
            count,
            max,
        }
    }

    /// Create an IoError
    pub fn io_error(message: impl Into<String>) -> Self {
        KeelError::IoError {
            message: message.into(),
        }
    }

    /// Source location of this error, if it was raised while reading source text
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            KeelError::UnexpectedLine { location, .. }
            | KeelError::Unterminated { location, .. }
            | KeelError::InvalidEscapeSequence { location, .. }
            | KeelError::UnterminatedList { location }
            | KeelError::OutsideStruct { location, .. }
            | KeelError::IncludeNotFound { location, .. }
            | KeelError::TypeMismatch { location, .. }
            | KeelError::MalformedArray { location, .. }
            | KeelError::MalformedStructCall { location, .. }
            | KeelError::InvalidEnumConstraint { location, .. } => Some(location),
            KeelError::EnumViolation { .. }
            | KeelError::UnknownStruct { .. }
            | KeelError::UnknownField { .. }
            | KeelError::UnknownPrimaryKey { .. }
            | KeelError::TooManyArguments { .. }
            | KeelError::PositionalAfterNamed { .. }
            | KeelError::CircularReference { .. }
            | KeelError::IoError { .. } => None,
        }
    }

    /// Render the offending source line with a caret beneath the error column.
    ///
    /// ```text
    ///   --> config.keel:3:9
    ///    |
    ///  3 |     int cores: many
    ///    |                ^^^^
    /// ```
    pub fn snippet(&self) -> Option<String> {
        let location = self.location()?;
        let (line, caret) = location.caret_lines();
        let gutter = location.line.to_string().len();
        let pad = " ".repeat(gutter);
        Some(format!(
            "{pad}--> {location}\n{pad} |\n{} | {line}\n{pad} | {caret}",
            location.line
        ))
    }
}

/// Result type for Keel operations
pub type KeelResult<T> = Result<T, KeelError>;
