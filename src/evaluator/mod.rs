//! Resolution engine for Keel documents
//!
//! A parsed [`Context`] still holds raw inline instances, unresolved references
//! and unrendered templates. [`resolve`] runs four whole-document passes, in
//! order, each reading from a deep-copy snapshot taken when the pass starts and
//! writing into the live document:
//! 1. bind inline instances to their schemas
//! 2. rebuild every primary-key index
//! 3. resolve references to deep copies of their target rows
//! 4. render templates

pub mod bind;
pub mod scope;
pub mod template;
pub mod value;

use tracing::debug;

use crate::errors::{KeelError, KeelResult};
use crate::schema::Context;
use bind::Binder;
use scope::Scope;

pub use value::{Instance, Reference, Text, Value};

/// Resolve a parsed document in place
pub fn resolve(ctx: &mut Context) -> KeelResult<()> {
    bind_instances(ctx)?;
    index_primary_keys(ctx);
    resolve_references(ctx)?;
    render_templates(ctx);
    Ok(())
}

/// Pass 1: type inline instances and put every instance in schema order
pub fn bind_instances(ctx: &mut Context) -> KeelResult<()> {
    let snapshot = ctx.snapshot();
    let binder = Binder::new(&snapshot.structs);

    for value in ctx.globals.values_mut() {
        binder.bind_value(value)?;
    }
    let mut rows = 0;
    for schema in ctx.structs.values_mut() {
        for instance in &mut schema.instances {
            binder.bind_instance(instance)?;
            rows += 1;
        }
    }
    debug!("bound {} global(s) and {} row(s)", ctx.globals.len(), rows);
    Ok(())
}

/// Pass 2: rebuild the primary-key index of every struct
pub fn index_primary_keys(ctx: &mut Context) {
    for schema in ctx.structs.values_mut() {
        schema.build_primary_index();
    }
    debug!("indexed {} struct(s)", ctx.structs.len());
}

/// Pass 3: fill every reference with a deep copy of its target row
pub fn resolve_references(ctx: &mut Context) -> KeelResult<()> {
    let snapshot = ctx.snapshot();
    let mut stack = Vec::new();
    let mut resolved = 0;

    for value in ctx.globals.values_mut() {
        resolved += resolve_value(value, &snapshot, &mut stack)?;
    }
    for schema in ctx.structs.values_mut() {
        for instance in &mut schema.instances {
            for value in instance.fields.values_mut() {
                resolved += resolve_value(value, &snapshot, &mut stack)?;
            }
        }
    }
    debug!("resolved {} reference(s)", resolved);
    Ok(())
}

/// Resolve references reachable from `value`, returning how many were filled.
///
/// `stack` holds the `(struct, key)` pairs being resolved, so a target that
/// leads back to itself is reported instead of expanding forever.
fn resolve_value(
    value: &mut Value,
    snapshot: &Context,
    stack: &mut Vec<(String, String)>,
) -> KeelResult<usize> {
    match value {
        Value::Array(items) => {
            let mut count = 0;
            for item in items {
                count += resolve_value(item, snapshot, stack)?;
            }
            Ok(count)
        }
        Value::Instance(instance) => {
            let mut count = 0;
            for field in instance.fields.values_mut() {
                count += resolve_value(field, snapshot, stack)?;
            }
            Ok(count)
        }
        Value::Reference(reference) => {
            let Some(schema) = snapshot.get_struct(&reference.struct_name) else {
                return Err(KeelError::unknown_struct(
                    &reference.struct_name,
                    &reference.key,
                    &snapshot.struct_names(),
                ));
            };
            let Some(found) = schema.find_by_primary_key(&reference.key) else {
                return Err(KeelError::UnknownPrimaryKey {
                    schema: reference.struct_name.clone(),
                    key: reference.key.clone(),
                });
            };

            let frame = (reference.struct_name.clone(), reference.key.clone());
            if stack.contains(&frame) {
                stack.push(frame);
                let names: Vec<String> = stack
                    .iter()
                    .map(|(name, key)| format!("{}({})", name, key))
                    .collect();
                return Err(KeelError::CircularReference {
                    chain: cycle_chain(&names),
                });
            }

            let mut target = found.clone();
            stack.push(frame);
            let mut count = 1;
            for field in target.fields.values_mut() {
                count += resolve_value(field, snapshot, stack)?;
            }
            stack.pop();
            reference.target = Some(Box::new(target));
            Ok(count)
        }
        _ => Ok(0),
    }
}

/// Pass 4: render templates.
///
/// Globals and rows all resolve against the globals as they were when the pass
/// started. Within a row, later fields see earlier fields already rendered.
pub fn render_templates(ctx: &mut Context) {
    let globals = ctx.snapshot().globals;
    let scope = Scope::global(&globals);
    for value in ctx.globals.values_mut() {
        template::render_value(value, &scope);
    }

    let mut rows = 0;
    for schema in ctx.structs.values_mut() {
        for instance in &mut schema.instances {
            template::render_instance(instance, &globals);
            rows += 1;
        }
    }
    debug!("rendered {} global(s) and {} row(s)", globals.len(), rows);
}

/// The repeating tail of a resolution path, written `A -> B -> A`
pub(crate) fn cycle_chain(path: &[String]) -> String {
    let start = path
        .split_last()
        .and_then(|(last, earlier)| earlier.iter().rposition(|step| step == last))
        .unwrap_or(0);
    path[start..].join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parse_str;
    use pretty_assertions::assert_eq;

    fn raw(source: &str) -> Context {
        let lines = crate::lexer::assemble(&crate::lexer::source::SourceLine::from_text(source))
            .unwrap();
        crate::parser::Parser::new().parse(&lines).unwrap()
    }

    #[test]
    fn test_passes_in_order() {
        let mut ctx = raw("\
Port:
  *str name:
  int number:
  - http, 80
App:
  str command: start {port.number}
  Port port: Port(http)
  - ,
");
        bind_instances(&mut ctx).unwrap();
        let app = &ctx.structs["App"].instances[0];
        assert!(app.get("port").and_then(Value::as_reference).is_some_and(|r| !r.is_resolved()));

        index_primary_keys(&mut ctx);
        assert!(ctx.structs["Port"].find_by_primary_key("http").is_some());

        resolve_references(&mut ctx).unwrap();
        let app = &ctx.structs["App"].instances[0];
        assert_eq!(app.get("port").and_then(|p| p.field("number")), Some(&Value::Int(80)));
        assert_eq!(app.get("command").and_then(Value::as_str), Some("start {port.number}"));

        render_templates(&mut ctx);
        let app = &ctx.structs["App"].instances[0];
        assert_eq!(app.get("command"), Some(&Value::from("start 80")));
    }

    #[test]
    fn test_unknown_struct_and_key() {
        let err = parse_str("App:\n  *str name:\n  Db db: Db(main)\n  - a\n").unwrap_err();
        assert!(matches!(err, KeelError::UnknownStruct { ref name, ref key, .. } if name == "Db" && key == "main"));

        let err = parse_str("Db:\n  *str name:\n  - main\nApp:\n  Db db: Db(other)\n  - \n")
            .unwrap_err();
        assert_eq!(err.to_string(), "no 'Db' instance has primary key 'other'");
    }

    #[test]
    fn test_nested_references_resolve() {
        let ctx = parse_str("\
Region:
  *str code:
  str name:
  - eu, Europe
Dc:
  *str id:
  Region region:
  - fra1, Region(eu)
Host:
  *str hostname:
  Dc dc:
  - web-01, Dc(fra1)
").unwrap();
        let host = ctx.structs["Host"].instances[0].get("dc").unwrap();
        let region = host.field("region").unwrap();
        assert_eq!(region.field("name"), Some(&Value::from("Europe")));
    }

    #[test]
    fn test_reference_cycle_is_fatal() {
        let err = parse_str("\
A:
  *str id:
  B b:
  - a1, B(b1)
B:
  *str id:
  A a:
  - b1, A(a1)
").unwrap_err();
        match err {
            KeelError::CircularReference { chain } => assert_eq!(chain, "B(b1) -> A(a1) -> B(b1)"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resolved_copy_is_independent() {
        let mut ctx = parse_str("\
Port:
  *str name:
  int number:
  - http, 80
App:
  *str name:
  Port port:
  - web, Port(http)
").unwrap();
        ctx.structs["Port"].instances[0]
            .fields
            .insert("number".into(), Value::Int(8080));
        let app = &ctx.structs["App"].instances[0];
        assert_eq!(app.get("port").and_then(|p| p.field("number")), Some(&Value::Int(80)));
    }

    #[test]
    fn test_globals_render_against_pass_start() {
        let ctx = parse_str("str a: <{c}>\nstr b: B\nstr c: {b}\nstr d: {a}{c}\n").unwrap();
        assert_eq!(ctx.global("a"), Some(&Value::from("<{b}>")));
        assert_eq!(ctx.global("c"), Some(&Value::from("B")));
        // `a` and `c` are spliced as they were before rendering
        assert_eq!(ctx.global("d"), Some(&Value::from("<{c}>{b}")));
    }

    #[test]
    fn test_rows_see_unrendered_globals() {
        let ctx = parse_str("\
str host: h
str url: {host}:80
Link:
  *str name:
  str link: {url}/x
  - a
").unwrap();
        assert_eq!(ctx.global("url"), Some(&Value::from("h:80")));
        let row = &ctx.structs["Link"].instances[0];
        assert_eq!(row.get("link"), Some(&Value::from("{host}:80/x")));
    }

    #[test]
    fn test_inline_instance_renders_in_own_scope() {
        let ctx = parse_str("\
str env: prod
Endpoint:
  str host:
  str url: https://{host}/{env}
Svc:
  *str name:
  Endpoint ep:
  - api, Endpoint(host: api.local)
").unwrap();
        let ep = ctx.structs["Svc"].instances[0].get("ep").unwrap();
        assert_eq!(ep.field("url"), Some(&Value::from("https://api.local/prod")));
    }

    #[test]
    fn test_cycle_chain() {
        let path: Vec<String> = ["A", "B", "C", "B"].iter().map(|s| s.to_string()).collect();
        assert_eq!(cycle_chain(&path), "B -> C -> B");
        let path: Vec<String> = vec!["N".to_string(); 5];
        assert_eq!(cycle_chain(&path), "N -> N");
    }
}
