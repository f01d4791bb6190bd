//! Schema binding for instances
//!
//! Inline instances leave the parser holding raw argument tokens, with
//! positional arguments under synthetic `_argN` names. Binding types those
//! tokens against the real struct schema, fills absent fields from defaults,
//! and puts every instance into its struct's canonical field order.

use indexmap::IndexMap;

use super::value::{Instance, Value};
use crate::errors::{KeelError, KeelResult};
use crate::parser::value::ValueParser;
use crate::schema::Struct;

/// Maximum nesting of inline instances before binding gives up.
/// A struct whose default holds an inline instance of itself would otherwise
/// expand forever.
const MAX_BIND_DEPTH: usize = 64;

/// Position of a synthetic `_argN` field name
fn arg_position(name: &str) -> Option<usize> {
    name.strip_prefix("_arg")?.parse().ok()
}

/// Binds instances against a read-only set of struct schemas
pub struct Binder<'a> {
    structs: &'a IndexMap<String, Struct>,
}

impl<'a> Binder<'a> {
    pub fn new(structs: &'a IndexMap<String, Struct>) -> Self {
        Self { structs }
    }

    /// Bind every instance reachable from `value`
    pub fn bind_value(&self, value: &mut Value) -> KeelResult<()> {
        self.bind_value_in(value, &mut Vec::new())
    }

    /// Bind one instance and everything nested in it
    pub fn bind_instance(&self, instance: &mut Instance) -> KeelResult<()> {
        self.bind_instance_in(instance, &mut Vec::new())
    }

    fn bind_value_in(&self, value: &mut Value, path: &mut Vec<String>) -> KeelResult<()> {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.bind_value_in(item, path)?;
                }
            }
            Value::Instance(instance) => self.bind_instance_in(instance, path)?,
            _ => {}
        }
        Ok(())
    }

    fn bind_instance_in(&self, instance: &mut Instance, path: &mut Vec<String>) -> KeelResult<()> {
        path.push(instance.struct_name.clone());
        if path.len() > MAX_BIND_DEPTH {
            return Err(KeelError::CircularReference {
                chain: super::cycle_chain(path),
            });
        }

        if let Some(schema) = self.structs.get(&instance.struct_name) {
            let present = match instance.unbound.take() {
                Some(location) => {
                    let raw = std::mem::take(&mut instance.fields);
                    self.type_raw_fields(schema, raw, ValueParser::new(self.structs, location))?
                }
                None => std::mem::take(&mut instance.fields),
            };
            instance.fields = canonical_order(schema, present);
        }

        for value in instance.fields.values_mut() {
            self.bind_value_in(value, path)?;
        }
        path.pop();
        Ok(())
    }

    /// Type raw inline tokens at their fields' declared types
    fn type_raw_fields(
        &self,
        schema: &Struct,
        raw: IndexMap<String, Value>,
        parser: ValueParser<'_>,
    ) -> KeelResult<IndexMap<String, Value>> {
        let count = raw
            .keys()
            .filter_map(|name| arg_position(name))
            .max()
            .map_or(0, |last| last + 1);

        let mut typed = IndexMap::new();
        for (name, token) in raw {
            let field = match arg_position(&name) {
                Some(position) => schema.fields.get(position).ok_or_else(|| {
                    KeelError::too_many_arguments(&schema.name, count, schema.fields.len())
                })?,
                None => schema.field(&name).ok_or_else(|| {
                    KeelError::unknown_field(&schema.name, &name, &schema.field_names())
                })?,
            };
            let value = parser.parse_for_field(&token.render_text(), field)?;
            typed.insert(field.name.clone(), value);
        }
        Ok(typed)
    }
}

/// Schema fields in declaration order, taking present values or defaults,
/// followed by any fields the schema does not declare in their original order
fn canonical_order(schema: &Struct, mut present: IndexMap<String, Value>) -> IndexMap<String, Value> {
    let mut ordered = IndexMap::with_capacity(schema.fields.len() + present.len());
    for field in &schema.fields {
        let value = present
            .shift_remove(&field.name)
            .or_else(|| field.default.clone())
            .unwrap_or(Value::Null);
        ordered.insert(field.name.clone(), value);
    }
    ordered.extend(present);
    ordered
}
