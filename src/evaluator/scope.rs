//! Name lookup for template placeholders
//!
//! A placeholder path such as `port.number` is looked up:
//! - against globals only, when it starts with `global.`
//! - otherwise against the current instance's fields first, then against
//!   globals if the local lookup fails at any step
//!
//! Every segment after the first projects into an instance or into the
//! target of a resolved reference.

use indexmap::IndexMap;

use super::value::{Instance, Value};

const GLOBAL_PREFIX: &str = "global.";

/// Lookup scope for rendering one value
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Snapshot of the instance being rendered
    local: Option<&'a Instance>,
    globals: &'a IndexMap<String, Value>,
}

impl<'a> Scope<'a> {
    /// Scope for top-level globals
    pub fn global(globals: &'a IndexMap<String, Value>) -> Self {
        Self {
            local: None,
            globals,
        }
    }

    /// Scope for the fields of `instance`, falling back to `globals`
    pub fn local(instance: &'a Instance, globals: &'a IndexMap<String, Value>) -> Self {
        Self {
            local: Some(instance),
            globals,
        }
    }

    pub fn globals(&self) -> &'a IndexMap<String, Value> {
        self.globals
    }

    /// Look up a dotted placeholder path
    pub fn lookup(&self, path: &str) -> Option<&'a Value> {
        if let Some(rest) = path.strip_prefix(GLOBAL_PREFIX) {
            return walk(self.globals, rest);
        }
        self.local
            .and_then(|instance| walk(&instance.fields, path))
            .or_else(|| walk(self.globals, path))
    }
}

fn walk<'v>(fields: &'v IndexMap<String, Value>, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut value = fields.get(segments.next()?)?;
    for segment in segments {
        value = value.field(segment)?;
    }
    Some(value)
}
