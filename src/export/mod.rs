//! Structured export of a resolved document
//!
//! [`Node`] is the generic output tree handed to emitters. [`export`] flattens a
//! resolved [`Context`]: globals first in declaration order, then one array per
//! struct that has a primary key. Structs without a primary key only exist to be
//! inlined or referenced and are left out.

use indexmap::IndexMap;
use serde::Serialize;

use crate::evaluator::value::instance_node;
use crate::schema::Context;

/// Generic output tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Node>),
    /// Ordered map of string keys to nodes
    Object(IndexMap<String, Node>),
}

impl Node {
    pub fn as_object(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get a node by key path; numeric segments index into arrays
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        let mut current = self;
        for key in path {
            current = match current {
                Node::Object(obj) => obj.get(*key)?,
                Node::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Convert to serde_json::Value
    pub fn to_serde_json(&self) -> serde_json::Value {
        match self {
            Node::Null => serde_json::Value::Null,
            Node::Bool(b) => serde_json::Value::Bool(*b),
            Node::Int(n) => serde_json::Value::Number((*n).into()),
            Node::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Node::String(s) => serde_json::Value::String(s.clone()),
            Node::Array(arr) => serde_json::Value::Array(arr.iter().map(Node::to_serde_json).collect()),
            Node::Object(obj) => serde_json::Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_serde_json()))
                    .collect(),
            ),
        }
    }
}

/// Export a resolved document
pub fn export(ctx: &Context) -> Node {
    let mut root = IndexMap::new();

    for (name, value) in &ctx.globals {
        root.insert(name.clone(), value.to_node());
    }

    for (name, schema) in &ctx.structs {
        if schema.primary_key.is_none() {
            continue;
        }
        let rows = schema.instances.iter().map(instance_node).collect();
        root.insert(name.clone(), Node::Array(rows));
    }

    Node::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::value::{Instance, Value};
    use crate::schema::types::FieldType;
    use crate::schema::{FieldSchema, Struct};
    use pretty_assertions::assert_eq;

    fn host_struct() -> Struct {
        let mut host = Struct::new("Host");
        host.add_field(FieldSchema::new("hostname", FieldType::parse("str")).primary_key());
        host.add_field(FieldSchema::new("cores", FieldType::parse("int")));
        host.instances.push(
            Instance::new("Host")
                .with_field("hostname", "prod-01")
                .with_field("cores", 64i64),
        );
        host
    }

    #[test]
    fn test_export_orders_globals_before_structs() {
        let mut ctx = Context::new();
        ctx.structs.insert("Host".into(), host_struct());
        ctx.globals.insert("timezone".into(), Value::from("UTC"));

        let node = export(&ctx);
        let keys: Vec<&String> = node.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["timezone", "Host"]);
        assert_eq!(
            node.get_path(&["Host", "0", "cores"]),
            Some(&Node::Int(64))
        );
    }

    #[test]
    fn test_structs_without_primary_key_are_omitted() {
        let mut ctx = Context::new();
        let mut point = Struct::new("Point");
        point.add_field(FieldSchema::new("x", FieldType::parse("int")));
        point.instances.push(Instance::new("Point").with_field("x", 1i64));
        ctx.structs.insert("Point".into(), point);

        assert_eq!(export(&ctx), Node::Object(IndexMap::new()));
    }

    #[test]
    fn test_serialize_preserves_order() {
        let mut obj = IndexMap::new();
        obj.insert("z".to_string(), Node::Int(1));
        obj.insert("a".to_string(), Node::Null);
        let json = serde_json::to_string(&Node::Object(obj)).unwrap();
        assert_eq!(json, r#"{"z":1,"a":null}"#);
    }
}
