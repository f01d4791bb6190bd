//! Document parser for the Keel configuration language
//!
//! Walks the assembled logical lines top to bottom and builds a raw
//! [`Context`]: globals, struct schemas and their rows. Values are typed as
//! they are read, against the structs declared so far. Inline instances keep
//! their raw argument tokens until the evaluator binds them.

pub mod classify;
pub mod value;

use tracing::trace;

use crate::errors::{KeelError, KeelResult};
use crate::evaluator::value::{Instance, Value};
use crate::lexer::source::SourceLocation;
use crate::lexer::{split_top_level, LogicalLine};
use crate::schema::types::{FieldType, ScalarType};
use crate::schema::{Context, FieldSchema, Struct};
use classify::{classify, FieldDecl, LineKind};
use value::{split_named, ValueParser};

/// One physical piece of a row joined from continuation lines
#[derive(Debug, Clone)]
struct Segment {
    /// Byte offset of this piece in the joined row text
    start: usize,
    line: LogicalLine,
    /// Byte offset of this piece in `line.text`
    offset: usize,
}

/// A row waiting for possible continuation lines
#[derive(Debug, Clone)]
struct PendingRow {
    struct_name: String,
    text: String,
    head: Segment,
    tail: Vec<Segment>,
}

impl PendingRow {
    fn location(&self, offset: usize, len: usize) -> SourceLocation {
        let segment = self
            .tail
            .iter()
            .rev()
            .find(|s| s.start <= offset)
            .unwrap_or(&self.head);
        segment
            .line
            .location(segment.offset + (offset - segment.start), len)
    }
}

/// Builds a raw [`Context`] from logical lines
#[derive(Debug, Default)]
pub struct Parser {
    ctx: Context,
    /// Most recently opened struct
    current: Option<String>,
    pending: Option<PendingRow>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every line and return the unresolved document
    pub fn parse(mut self, lines: &[LogicalLine]) -> KeelResult<Context> {
        for line in lines {
            self.parse_line(line)?;
        }
        self.flush_row()?;
        Ok(self.ctx)
    }

    fn parse_line(&mut self, line: &LogicalLine) -> KeelResult<()> {
        let Some(kind) = classify(&line.text) else {
            return Err(KeelError::unexpected_line(
                line.location(0, line.text.len()),
                "unrecognized line",
                "expected a struct header `Name:`, a declaration `type name: value`, or a row `- a, b`",
            ));
        };

        if let LineKind::Continuation { text, offset } = kind {
            return self.continue_row(line, text, offset);
        }
        self.flush_row()?;

        match kind {
            LineKind::StructHeader { name } => {
                self.ctx
                    .structs
                    .entry(name.to_string())
                    .or_insert_with(|| Struct::new(name));
                self.current = Some(name.to_string());
                Ok(())
            }
            LineKind::Field(decl) if decl.global => self.parse_global(line, &decl),
            LineKind::Field(decl) => self.parse_field(line, &decl),
            LineKind::DefaultOverride {
                name,
                name_offset,
                value,
                value_offset,
            } => self.parse_override(line, name, name_offset, value, value_offset),
            LineKind::Row { args, args_offset } => {
                let struct_name = self.current_struct(line, args_offset - 1, "instance row")?;
                self.pending = Some(PendingRow {
                    struct_name,
                    text: args.to_string(),
                    head: Segment {
                        start: 0,
                        line: line.clone(),
                        offset: args_offset,
                    },
                    tail: Vec::new(),
                });
                Ok(())
            }
            LineKind::Continuation { .. } => Ok(()),
        }
    }

    fn current_struct(&self, line: &LogicalLine, offset: usize, what: &str) -> KeelResult<String> {
        self.current.clone().ok_or_else(|| KeelError::OutsideStruct {
            location: line.location(offset, line.text.len() - offset),
            what: what.to_string(),
        })
    }

    fn parse_global(&mut self, line: &LogicalLine, decl: &FieldDecl<'_>) -> KeelResult<()> {
        let location = line.location(decl.value_offset, decl.value.len());
        if decl.primary_key {
            return Err(KeelError::unexpected_line(
                line.location(0, 1),
                format!("global '{}' cannot be a primary key", decl.name),
                "only struct fields can be marked with '*'",
            ));
        }
        if decl.value.starts_with('(') {
            return Err(KeelError::unexpected_line(
                location,
                format!("global '{}' cannot have enum choices", decl.name),
                "enum choices are only allowed on struct fields",
            ));
        }

        let ty = FieldType::new(ScalarType::from_name(decl.type_name), decl.array);
        let value = if decl.value.is_empty() {
            Value::Null
        } else {
            ValueParser::new(&self.ctx.structs, location).parse(decl.value, &ty)?
        };
        self.ctx.globals.insert(decl.name.to_string(), value);
        Ok(())
    }

    fn parse_field(&mut self, line: &LogicalLine, decl: &FieldDecl<'_>) -> KeelResult<()> {
        let struct_name = self.current_struct(line, 0, "field declaration")?;

        let ty = FieldType::new(ScalarType::from_name(decl.type_name), decl.array);
        let mut field = FieldSchema::new(decl.name, ty);
        field.is_primary_key = decl.primary_key;
        field.is_nullable = decl.nullable;

        if !decl.value.is_empty() {
            let location = line.location(decl.value_offset, decl.value.len());
            let parser = ValueParser::new(&self.ctx.structs, location);
            if decl.value.starts_with('(') {
                field.choices = Some(parser.parse_choices(decl.value, &field)?);
            } else {
                field.default = Some(parser.parse(decl.value, &field.ty)?);
            }
        }

        if let Some(schema) = self.ctx.structs.get_mut(&struct_name) {
            schema.add_field(field);
        }
        Ok(())
    }

    fn parse_override(
        &mut self,
        line: &LogicalLine,
        name: &str,
        name_offset: usize,
        value: &str,
        value_offset: usize,
    ) -> KeelResult<()> {
        let struct_name = self.current_struct(line, name_offset, "default override")?;
        let Some(schema) = self.ctx.structs.get(&struct_name) else {
            return Ok(());
        };
        let Some(field) = schema.field(name).cloned() else {
            return Err(KeelError::unknown_field(
                struct_name,
                name,
                &schema.field_names(),
            ));
        };

        if value.is_empty() {
            let schema = self.schema_mut(&struct_name)?;
            schema.set_default(name, None)?;
            return schema.set_enum_choices(name, None);
        }

        let parser = ValueParser::new(&self.ctx.structs, line.location(value_offset, value.len()));
        if value.starts_with('(') {
            let choices = parser.parse_choices(value, &field)?;
            self.schema_mut(&struct_name)?
                .set_enum_choices(name, Some(choices))
        } else {
            let default = parser.parse_for_field(value, &field)?;
            self.schema_mut(&struct_name)?
                .set_default(name, Some(default))
        }
    }

    fn schema_mut(&mut self, name: &str) -> KeelResult<&mut Struct> {
        let names = self.ctx.struct_names();
        self.ctx
            .structs
            .get_mut(name)
            .ok_or_else(|| KeelError::unknown_struct(name, "", &names))
    }

    fn continue_row(&mut self, line: &LogicalLine, text: &str, offset: usize) -> KeelResult<()> {
        let Some(row) = self.pending.as_mut() else {
            return Err(KeelError::unexpected_line(
                line.location(offset, text.len()),
                "indented line does not continue a row",
                "continuation lines must follow a row starting with '-'",
            ));
        };
        row.text.push(' ');
        row.tail.push(Segment {
            start: row.text.len(),
            line: line.clone(),
            offset,
        });
        row.text.push_str(text);
        Ok(())
    }

    /// Type the pending row, if any, and append it to its struct
    fn flush_row(&mut self) -> KeelResult<()> {
        let Some(row) = self.pending.take() else {
            return Ok(());
        };
        let instance = self.build_row(&row)?;
        trace!(
            "row {}[{}] with {} field(s)",
            row.struct_name,
            self.ctx
                .structs
                .get(&row.struct_name)
                .map_or(0, |s| s.instances.len()),
            instance.fields.len()
        );
        self.schema_mut(&row.struct_name)?.instances.push(instance);
        Ok(())
    }

    fn build_row(&self, row: &PendingRow) -> KeelResult<Instance> {
        let Some(schema) = self.ctx.structs.get(&row.struct_name) else {
            return Err(KeelError::unknown_struct(
                &row.struct_name,
                "",
                &self.ctx.struct_names(),
            ));
        };

        let pieces = split_top_level(&row.text, ',');
        let mut instance = Instance::new(&schema.name);
        let mut named_seen = false;

        for (position, (offset, piece)) in pieces.iter().enumerate() {
            let arg = piece.trim();
            if arg.is_empty() {
                continue;
            }
            let arg_offset = offset + (piece.len() - piece.trim_start().len());

            let (field, token, token_offset) = match split_named(arg) {
                Some((name, value_start)) => {
                    named_seen = true;
                    let field = schema.field(name).ok_or_else(|| {
                        KeelError::unknown_field(&schema.name, name, &schema.field_names())
                    })?;
                    let rest = &arg[value_start..];
                    let lead = rest.len() - rest.trim_start().len();
                    (field, rest.trim(), arg_offset + value_start + lead)
                }
                None if named_seen => {
                    return Err(KeelError::PositionalAfterNamed {
                        schema: schema.name.clone(),
                    })
                }
                None => {
                    let field = schema.fields.get(position).ok_or_else(|| {
                        KeelError::too_many_arguments(&schema.name, pieces.len(), schema.fields.len())
                    })?;
                    (field, arg, arg_offset)
                }
            };

            let location = row.location(token_offset, token.len());
            let value = ValueParser::new(&self.ctx.structs, location).parse_for_field(token, field)?;
            instance.fields.insert(field.name.clone(), value);
        }

        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::value::Reference;
    use crate::lexer::assemble;
    use crate::lexer::source::SourceLine;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> KeelResult<Context> {
        let lines = assemble(&SourceLine::from_text(source))?;
        Parser::new().parse(&lines)
    }

    #[test]
    fn test_globals() {
        let ctx = parse("str timezone: UTC\nint retries: 3\n?str note:\n").unwrap();
        let names: Vec<&String> = ctx.globals.keys().collect();
        assert_eq!(names, vec!["timezone", "retries", "note"]);
        assert_eq!(ctx.global("retries"), Some(&Value::Int(3)));
        assert_eq!(ctx.global("note"), Some(&Value::Null));
    }

    #[test]
    fn test_struct_with_rows() {
        let source = "\
Host:
  *str hostname:
  int cores: 8
  - prod-01, 64
  - prod-02
";
        let ctx = parse(source).unwrap();
        let host = ctx.get_struct("Host").unwrap();
        assert_eq!(host.primary_key.as_deref(), Some("hostname"));
        assert_eq!(host.field("cores").unwrap().default, Some(Value::Int(8)));
        assert_eq!(host.instances.len(), 2);
        assert_eq!(host.instances[0].get("cores"), Some(&Value::Int(64)));
        assert_eq!(host.instances[1].get("cores"), None);
    }

    #[test]
    fn test_named_arguments_and_continuation() {
        let source = "\
Host:
  *str hostname:
  int cores:
  str role:
  - prod-01, \\
    role: db, cores: 4
  - prod-02,
    2, web
";
        let ctx = parse(source).unwrap();
        let rows = &ctx.structs["Host"].instances;
        let fields: Vec<&String> = rows[0].fields.keys().collect();
        assert_eq!(fields, vec!["hostname", "role", "cores"]);
        assert_eq!(rows[0].get("cores"), Some(&Value::Int(4)));
        assert_eq!(rows[1].get("role"), Some(&Value::from("web")));
    }

    #[test]
    fn test_continuation_error_location() {
        let source = "Host:\n  int cores:\n  int mem:\n  - 1,\n    nope\n";
        let err = parse(source).unwrap_err();
        let location = err.location().unwrap();
        assert_eq!((location.line, location.column), (5, 5));
    }

    #[test]
    fn test_forward_reference_stays_reference() {
        let source = "\
App:
  Point origin: Point(1, 2)
Point:
  int x:
  int y:
";
        let ctx = parse(source).unwrap();
        let default = ctx.structs["App"].field("origin").unwrap().default.clone();
        assert_eq!(default, Some(Value::Reference(Reference::new("Point", "1, 2"))));
    }

    #[test]
    fn test_declared_struct_without_key_is_inline() {
        let source = "\
Point:
  int x:
  int y:
App:
  Point origin: Point(1, 2)
";
        let ctx = parse(source).unwrap();
        let default = ctx.structs["App"].field("origin").unwrap().default.clone();
        assert!(matches!(default, Some(Value::Instance(ref inst)) if !inst.is_bound()));
    }

    #[test]
    fn test_default_override() {
        let source = "\
Host:
  str status: (active, retired)
  int cores: 8
  cores: 16
  status:
";
        let ctx = parse(source).unwrap();
        let host = &ctx.structs["Host"];
        assert_eq!(host.field("cores").unwrap().default, Some(Value::Int(16)));
        assert_eq!(host.field("status").unwrap().choices, None);
    }

    #[test]
    fn test_override_checks_choices() {
        let source = "Host:\n  str status: (active, retired)\n  status: broken\n";
        let err = parse(source).unwrap_err();
        assert!(matches!(err, KeelError::EnumViolation { .. }));
    }

    #[test]
    fn test_unknown_override_field() {
        let err = parse("Host:\n  int cores:\n  corez: 1\n").unwrap_err();
        match err {
            KeelError::UnknownField { field, help, .. } => {
                assert_eq!(field, "corez");
                assert_eq!(help, "did you mean 'cores'?");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_outside_struct() {
        let err = parse("  int cores:\n").unwrap_err();
        assert!(matches!(err, KeelError::OutsideStruct { ref what, .. } if what == "field declaration"));

        let err = parse("- a, b\n").unwrap_err();
        assert!(matches!(err, KeelError::OutsideStruct { ref what, .. } if what == "instance row"));
    }

    #[test]
    fn test_row_argument_errors() {
        let err = parse("P:\n  int x:\n  - 1, 2\n").unwrap_err();
        assert!(matches!(err, KeelError::TooManyArguments { count: 2, max: 1, .. }));

        let err = parse("P:\n  int x:\n  int y:\n  - x: 1, 2\n").unwrap_err();
        assert!(matches!(err, KeelError::PositionalAfterNamed { .. }));

        let err = parse("P:\n  int x:\n  - abc\n").unwrap_err();
        let location = err.location().unwrap();
        assert_eq!((location.line, location.column, location.length), (3, 5, 3));
    }

    #[test]
    fn test_empty_positional_consumes_position() {
        let ctx = parse("P:\n  int x:\n  int y:\n  - , 2\n").unwrap();
        let inst = &ctx.structs["P"].instances[0];
        assert_eq!(inst.get("x"), None);
        assert_eq!(inst.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unrecognized_line() {
        let err = parse("timezone UTC\n").unwrap_err();
        assert!(matches!(err, KeelError::UnexpectedLine { .. }));
    }

    #[test]
    fn test_reopened_struct_keeps_rows() {
        let ctx = parse("P:\n  *int x:\n  - 1\nint g: 2\nP:\n  - 3\n").unwrap();
        assert_eq!(ctx.structs["P"].instances.len(), 2);
        assert_eq!(ctx.global("g"), Some(&Value::Int(2)));
    }
}
