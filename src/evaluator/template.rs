//! Template rendering
//!
//! Replaces `{path}` placeholders in string values. Placeholders that do not
//! resolve are kept verbatim. For double-quoted strings the escape sequences
//! are decoded once all substitutions are done.

use indexmap::IndexMap;

use super::scope::Scope;
use super::value::{Instance, Text, Value};
use crate::parser::value::decode_escapes_lossy;

/// Render the placeholders of a template string
pub fn render_template(text: &Text, scope: &Scope<'_>) -> String {
    let source = text.text.as_str();
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(pos) = rest.find(['{', '\\']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with('\\') {
            if text.escapes {
                // Keep the escape encoded; it is decoded after substitution
                let len = tail[1..].chars().next().map_or(1, |c| 1 + c.len_utf8());
                out.push_str(&tail[..len]);
                rest = &tail[len..];
            } else {
                out.push('\\');
                rest = &tail[1..];
            }
            continue;
        }

        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            rest = "";
            break;
        };
        let path = &tail[1..close];
        match scope.lookup(path.trim()) {
            Some(value) => out.push_str(&value.render_text()),
            None => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);

    if text.escapes {
        decode_escapes_lossy(&out)
    } else {
        out
    }
}

/// Render every template reachable from `value`.
///
/// Strings use `scope`; inline instances and resolved reference targets render
/// their own fields against their own values.
pub fn render_value(value: &mut Value, scope: &Scope<'_>) {
    match value {
        Value::String(text) if text.template => {
            *text = Text::plain(render_template(text, scope));
        }
        Value::Array(items) => {
            for item in items {
                render_value(item, scope);
            }
        }
        Value::Instance(instance) => render_instance(instance, scope.globals()),
        Value::Reference(reference) => {
            if let Some(target) = reference.target.as_deref_mut() {
                render_instance(target, scope.globals());
            }
        }
        _ => {}
    }
}

/// Render an instance's fields in order.
///
/// The instance is re-snapshotted before each field, so a field sees the
/// rendered form of earlier fields and the unrendered form of later ones.
pub fn render_instance(instance: &mut Instance, globals: &IndexMap<String, Value>) {
    let names: Vec<String> = instance.fields.keys().cloned().collect();
    for name in names {
        let snapshot = instance.clone();
        let scope = Scope::local(&snapshot, globals);
        if let Some(value) = instance.fields.get_mut(&name) {
            render_value(value, &scope);
        }
    }
}
