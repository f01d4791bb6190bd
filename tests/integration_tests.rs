//! Integration tests for the Keel compiler
//!
//! These tests verify the complete pipeline from source to output.

use keel::evaluator::value::instance_node;
use keel::{emit, export, parse_str, Instance, KeelError, Node, OutputFormat, Reference, Value};
use pretty_assertions::assert_eq;

/// Helper to compile Keel source to compact JSON
fn compile_to_json(source: &str) -> Result<String, KeelError> {
    let ctx = parse_str(source)?;
    emit(&export(&ctx), OutputFormat::Json)
}

/// Helper to compile Keel source to YAML
fn compile_to_yaml(source: &str) -> Result<String, KeelError> {
    let ctx = parse_str(source)?;
    emit(&export(&ctx), OutputFormat::Yaml)
}

fn row<'c>(ctx: &'c keel::Context, schema: &str, index: usize) -> &'c Instance {
    &ctx.get_struct(schema).unwrap().instances[index]
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_scenario_globals_and_rows() {
    let source = "\
str timezone: UTC
Host:
  *str hostname:
  int cores:
  - prod-01, 64
";
    let json = compile_to_json(source).unwrap();
    assert_eq!(
        json,
        r#"{"timezone":"UTC","Host":[{"hostname":"prod-01","cores":64}]}"#
    );
}

#[test]
fn test_scenario_default_reference_and_template() {
    let source = "\
Port:
  *str name:
  int number:
  - http, 80
App:
  str command: start {port.number}
  Port port: Port(http)
  - ,
";
    let ctx = parse_str(source).unwrap();
    let app = row(&ctx, "App", 0);

    assert_eq!(app.get("command"), Some(&Value::from("start 80")));
    let port = app.get("port").unwrap().to_node();
    assert_eq!(
        port.to_serde_json(),
        serde_json::json!({"name": "http", "number": 80})
    );

    // App has no primary key, so only Port is listed
    let exported = export(&ctx);
    assert!(exported.get_path(&["App"]).is_none());
    assert_eq!(
        exported.get_path(&["Port", "0", "number"]),
        Some(&Node::Int(80))
    );
}

#[test]
fn test_scenario_absent_nullable_is_explicit_null() {
    let source = "\
Host:
  *str hostname:
  ?str note:
  - prod-01
";
    let json = compile_to_json(source).unwrap();
    assert_eq!(json, r#"{"Host":[{"hostname":"prod-01","note":null}]}"#);
}

#[test]
fn test_scenario_enum_violation() {
    let source = "\
Host:
  *str hostname:
  str status: (active, retired)
  - prod-01, active
  - prod-02, broken
";
    let err = parse_str(source).unwrap_err();
    match err {
        KeelError::EnumViolation { field, value, .. } => {
            assert_eq!(field, "status");
            assert_eq!(value, "broken");
        }
        other => panic!("expected EnumViolation, got {:?}", other),
    }
}

#[test]
fn test_yaml_output() {
    let source = "\
str timezone: UTC
Host:
  *str hostname:
  int cores:
  - prod-01, 64
  - prod-02, 32
";
    let yaml = compile_to_yaml(source).unwrap();
    insta::assert_snapshot!(yaml, @r"
    timezone: UTC
    Host:
    - hostname: prod-01
      cores: 64
    - hostname: prod-02
      cores: 32
    ");
}

// ============================================================================
// Scalars and literals
// ============================================================================

#[test]
fn test_scalar_globals() {
    let source = "\
bool debug: false
int mask: 0xff
int offset: -0b101
float ratio: 0.25
str bare: hello world
str quoted: \"tab\\there\"
str literal: 'no {escapes}\\n'
date day: 2024-05-01
time at: 10:30:00.5
datetime stamp: 2024-05-01 10:30:00Z
?str missing: null
";
    let json = compile_to_json(source).unwrap();
    insta::assert_snapshot!(json, @r#"{"debug":false,"mask":255,"offset":-5,"ratio":0.25,"bare":"hello world","quoted":"tab\there","literal":"no {escapes}\\n","day":"2024-05-01","at":"10:30:00.500000","stamp":"2024-05-01T10:30:00+00:00","missing":null}"#);
}

#[test]
fn test_rendered_scalars_parse_back() {
    let source = "\
int a: -0x10
int b: 0o17
bool c: true
float d: 1e3
float e: -0.125
";
    let ctx = parse_str(source).unwrap();
    let again: String = ctx
        .globals
        .iter()
        .map(|(name, value)| {
            let ty = match value {
                Value::Int(_) => "int",
                Value::Bool(_) => "bool",
                _ => "float",
            };
            format!("{} {}: {}\n", ty, name, value.render_text())
        })
        .collect();

    let reparsed = parse_str(&again).unwrap();
    assert_eq!(reparsed.globals, ctx.globals);
}

#[test]
fn test_multiline_strings() {
    let source = "\
str motd: \"\"\"
Hello {user}
  indented\"\"\"
str raw: '''
keep {this}'''
str user: ops
";
    let ctx = parse_str(source).unwrap();
    // `user` is declared after `motd`, so it is unrendered but present
    assert_eq!(ctx.global("motd"), Some(&Value::from("Hello ops\n  indented")));
    assert_eq!(ctx.global("raw"), Some(&Value::from("keep {this}")));
}

#[test]
fn test_unterminated_multiline_is_fatal() {
    let err = parse_str("str a: \"\"\"\nnever closed\n").unwrap_err();
    assert!(matches!(err, KeelError::Unterminated { .. }));
    let location = err.location().unwrap();
    assert_eq!((location.line, location.column), (1, 8));
}

#[test]
fn test_comments_respect_quotes() {
    let source = "str tag: \"a # b\"  # trailing\nstr esc: \"q\\\"#x\" # c\n";
    let ctx = parse_str(source).unwrap();
    assert_eq!(ctx.global("tag"), Some(&Value::from("a # b")));
    assert_eq!(ctx.global("esc"), Some(&Value::from("q\"#x")));
}

#[test]
fn test_arrays() {
    let source = "\
int[] ports: [80, 443, ]
str[] tags: []
Host:
  *str hostname:
  str[] roles: [web]
  - a
  - b, [\"db, primary\", cache]
";
    let ctx = parse_str(source).unwrap();
    assert_eq!(
        ctx.global("ports"),
        Some(&Value::Array(vec![Value::Int(80), Value::Int(443)]))
    );
    assert_eq!(ctx.global("tags"), Some(&Value::Array(vec![])));
    assert_eq!(
        row(&ctx, "Host", 0).get("roles"),
        Some(&Value::Array(vec![Value::from("web")]))
    );
    assert_eq!(
        row(&ctx, "Host", 1).get("roles"),
        Some(&Value::Array(vec![Value::from("db, primary"), Value::from("cache")]))
    );
}

#[test]
fn test_bad_int_reports_location() {
    let err = parse_str("Host:\n  *str hostname:\n  int cores:\n  - a, lots\n").unwrap_err();
    assert!(matches!(err, KeelError::TypeMismatch { .. }));
    assert_eq!(err.location().map(|l| l.line), Some(4));
    let snippet = err.snippet().unwrap();
    assert!(snippet.contains("- a, lots"), "snippet: {}", snippet);
    assert!(snippet.contains('^'), "snippet: {}", snippet);
}

// ============================================================================
// Rows, overrides and continuations
// ============================================================================

#[test]
fn test_named_arguments_and_continuations() {
    let source = "\
Host:
  *str hostname:
  str role: web
  int cores: 2
  - prod-01, \\
    role: db, cores: 8
  - prod-02,
    db
";
    let ctx = parse_str(source).unwrap();
    assert_eq!(row(&ctx, "Host", 0).get("role"), Some(&Value::from("db")));
    assert_eq!(row(&ctx, "Host", 0).get("cores"), Some(&Value::Int(8)));
    assert_eq!(row(&ctx, "Host", 1).get("role"), Some(&Value::from("db")));
    assert_eq!(row(&ctx, "Host", 1).get("cores"), Some(&Value::Int(2)));
}

#[test]
fn test_default_override_and_clear() {
    let source = "\
Host:
  *str hostname:
  str role: web
  str tier: (gold, silver)
  - a
  role: db
  tier:
  - b, , bronze
";
    let ctx = parse_str(source).unwrap();
    // Defaults apply when rows are bound, so both rows see the override
    assert_eq!(row(&ctx, "Host", 0).get("role"), Some(&Value::from("db")));
    assert_eq!(row(&ctx, "Host", 1).get("tier"), Some(&Value::from("bronze")));
}

#[test]
fn test_multiline_enum_list() {
    let source = "\
Host:
  *str hostname:
  str status: (active,
    retired)
  - a, retired
";
    let ctx = parse_str(source).unwrap();
    assert_eq!(row(&ctx, "Host", 0).get("status"), Some(&Value::from("retired")));
}

#[test]
fn test_structural_errors() {
    let err = parse_str("  str x: 1\n").unwrap_err();
    assert!(matches!(err, KeelError::OutsideStruct { .. }));

    let err = parse_str("- a, b\n").unwrap_err();
    assert!(matches!(err, KeelError::OutsideStruct { .. }));

    let err = parse_str("Host:\n  *str hostname:\n  - a, b\n").unwrap_err();
    assert!(matches!(err, KeelError::TooManyArguments { .. }));

    let err = parse_str("Host:\n  *str hostname:\n  str role:\n  - hostname: a, web\n")
        .unwrap_err();
    assert!(matches!(err, KeelError::PositionalAfterNamed { .. }));

    let err = parse_str("Host:\n  *str hostname:\n  colour: red\n").unwrap_err();
    match err {
        KeelError::UnknownField { schema, field, .. } => {
            assert_eq!((schema.as_str(), field.as_str()), ("Host", "colour"));
        }
        other => panic!("expected UnknownField, got {:?}", other),
    }

    let err = parse_str("Host:\n  *str hostname:\n  int[] ports: (1, 2)\n").unwrap_err();
    assert!(matches!(err, KeelError::InvalidEnumConstraint { .. }));
}

// ============================================================================
// References, inline instances and primary keys
// ============================================================================

#[test]
fn test_forward_reference_stays_reference() {
    // `Later` has no primary key, but it is not declared yet where it is used
    let source = "\
Holder:
  *str name:
  Later later:
  - h, Later(x)
Later:
  str v:
";
    let lines = keel::assemble(&keel::SourceLine::from_text(source)).unwrap();
    let raw = keel::Parser::new().parse(&lines).unwrap();
    assert!(matches!(
        raw.structs["Holder"].instances[0].get("later"),
        Some(Value::Reference(r)) if r.struct_name == "Later" && r.key == "x"
    ));

    let err = parse_str(source).unwrap_err();
    assert!(matches!(
        err,
        KeelError::UnknownPrimaryKey { ref schema, ref key } if schema == "Later" && key == "x"
    ));
}

#[test]
fn test_forward_reference_resolves() {
    let source = "\
Holder:
  *str name:
  Later later:
  - h, Later(x)
Later:
  *str key:
  int n:
  - x, 5
";
    let ctx = parse_str(source).unwrap();
    let later = row(&ctx, "Holder", 0).get("later").unwrap();
    assert_eq!(later.field("n"), Some(&Value::Int(5)));
}

#[test]
fn test_inline_instance_binding_order() {
    let source = "\
Point:
  int x:
  int y: 7
  str label:
Shape:
  *str name:
  Point origin:
  Point[] corners:
  - a, Point(label: top, x: 1), [Point(2, 3), Point(4)]
";
    let ctx = parse_str(source).unwrap();
    let shape = row(&ctx, "Shape", 0);
    let origin = shape.get("origin").and_then(Value::as_instance).unwrap();
    let keys: Vec<&str> = origin.fields.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["x", "y", "label"]);
    assert_eq!(origin.get("y"), Some(&Value::Int(7)));

    let json = serde_json::to_string(&instance_node(shape)).unwrap();
    insta::assert_snapshot!(json, @r#"{"name":"a","origin":{"x":1,"y":7,"label":"top"},"corners":[{"x":2,"y":3,"label":null},{"x":4,"y":7,"label":null}]}"#);
}

#[test]
fn test_primary_key_collision_last_wins() {
    let source = "\
Item:
  *int id:
  str label:
  - 1, first
  - 0x1, second
Use:
  *str name:
  Item item:
  - u, Item(1)
";
    let ctx = parse_str(source).unwrap();
    assert_eq!(ctx.get_struct("Item").unwrap().instances.len(), 2);
    let item = row(&ctx, "Use", 0).get("item").unwrap();
    assert_eq!(item.field("label"), Some(&Value::from("second")));
}

#[test]
fn test_reference_through_global() {
    let source = "\
Db:
  *str name:
  int port:
  - main, 5432
Db primary: Db(main)
str dsn: db://{primary.name}:{primary.port}
";
    let json = compile_to_json(source).unwrap();
    assert_eq!(
        json,
        r#"{"primary":{"name":"main","port":5432},"dsn":"db://main:5432","Db":[{"name":"main","port":5432}]}"#
    );
}

#[test]
fn test_unknown_struct_suggests_name() {
    let source = "\
Region:
  *str code:
  - eu
Dc:
  *str id:
  Regoin region: Regoin(eu)
  - fra1
";
    let err = parse_str(source).unwrap_err();
    match err {
        KeelError::UnknownStruct { name, key, help } => {
            assert_eq!((name.as_str(), key.as_str()), ("Regoin", "eu"));
            assert_eq!(help, "did you mean 'Region'?");
        }
        other => panic!("expected UnknownStruct, got {:?}", other),
    }
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn test_local_field_shadows_global() {
    let source = "\
str name: global-name
Svc:
  *str name:
  str label: \"{name}/{global.name}/{missing}\"
  - api
";
    let ctx = parse_str(source).unwrap();
    assert_eq!(
        row(&ctx, "Svc", 0).get("label"),
        Some(&Value::from("api/global-name/{missing}"))
    );
}

#[test]
fn test_sibling_render_order() {
    let source = "\
Svc:
  *str id:
  str early: <{late}>
  str late: {id}-late
  str after: <{late}>
  - web
";
    let ctx = parse_str(source).unwrap();
    let svc = row(&ctx, "Svc", 0);
    assert_eq!(svc.get("early"), Some(&Value::from("<{id}-late>")));
    assert_eq!(svc.get("late"), Some(&Value::from("web-late")));
    assert_eq!(svc.get("after"), Some(&Value::from("<web-late>")));
}

#[test]
fn test_literal_strings_never_render() {
    let source = "str env: prod\nstr a: '{env}'\nstr b: \"{env}\"\n";
    let ctx = parse_str(source).unwrap();
    assert_eq!(ctx.global("a"), Some(&Value::from("{env}")));
    assert_eq!(ctx.global("b"), Some(&Value::from("prod")));
}

// ============================================================================
// Value model
// ============================================================================

#[test]
fn test_clone_is_deep() {
    let reference = Value::Reference(Reference::new("Port", "http"));
    let mut copy = reference.clone();
    assert_eq!(copy, reference);
    if let Value::Reference(r) = &mut copy {
        r.target = Some(Box::new(Instance::new("Port").with_field("number", 80i64)));
    }
    assert!(reference.as_reference().is_some_and(|r| !r.is_resolved()));

    let array = Value::Array(vec![Value::Int(1), Value::from("a")]);
    let mut copy = array.clone();
    if let Value::Array(items) = &mut copy {
        items[0] = Value::Int(2);
        items.push(Value::Null);
    }
    assert_eq!(array, Value::Array(vec![Value::Int(1), Value::from("a")]));
}
