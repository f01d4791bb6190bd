//! Schema registry: struct definitions, their rows, and the document context

pub mod types;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::errors::{KeelError, KeelResult};
use crate::evaluator::value::{Instance, Value};
use types::FieldType;

/// A declared field of a struct
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub ty: FieldType,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub default: Option<Value>,
    /// Permitted values, for non-array scalar fields only
    pub choices: Option<Vec<Value>>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_primary_key: false,
            is_nullable: false,
            default: None,
            choices: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_array(&self) -> bool {
        self.ty.array
    }

    /// Check a typed value against the enum constraint, if any
    pub fn check_choice(&self, value: &Value) -> KeelResult<()> {
        let Some(choices) = &self.choices else {
            return Ok(());
        };
        if value.is_null() {
            return Ok(());
        }
        let text = value.render_text();
        if choices.iter().any(|c| c.render_text() == text) {
            return Ok(());
        }
        Err(KeelError::EnumViolation {
            field: self.name.clone(),
            value: text,
            choices: choices
                .iter()
                .map(Value::render_text)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// A record schema with its rows
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub name: String,
    /// Declaration order is the canonical field order
    pub fields: Vec<FieldSchema>,
    pub primary_key: Option<String>,
    pub instances: Vec<Instance>,
    /// Rendered primary key -> position in `instances`
    index: HashMap<String, usize>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key: None,
            instances: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a field. A redeclared name replaces the earlier field in place.
    /// The last field marked as primary key wins.
    pub fn add_field(&mut self, field: FieldSchema) {
        if field.is_primary_key {
            self.primary_key = Some(field.name.clone());
        }
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    fn field_mut(&mut self, name: &str) -> KeelResult<&mut FieldSchema> {
        let names = self.field_names();
        let schema = self.name.clone();
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| KeelError::unknown_field(schema, name, &names))
    }

    /// Replace or clear a field's default
    pub fn set_default(&mut self, field: &str, default: Option<Value>) -> KeelResult<()> {
        self.field_mut(field)?.default = default;
        Ok(())
    }

    /// Replace or clear a field's enum constraint
    pub fn set_enum_choices(&mut self, field: &str, choices: Option<Vec<Value>>) -> KeelResult<()> {
        self.field_mut(field)?.choices = choices;
        Ok(())
    }

    /// Rebuild the primary-key index from the current rows.
    ///
    /// Keys are the rendered text of each row's primary-key value; rows without
    /// one are skipped and a later row with the same text replaces an earlier one.
    pub fn build_primary_index(&mut self) {
        self.index.clear();
        let Some(pk) = &self.primary_key else {
            return;
        };
        for (pos, inst) in self.instances.iter().enumerate() {
            match inst.get(pk) {
                Some(value) if !value.is_null() => {
                    self.index.insert(value.render_text(), pos);
                }
                _ => {}
            }
        }
    }

    /// Exact-text lookup in the primary-key index
    pub fn find_by_primary_key(&self, key: &str) -> Option<&Instance> {
        self.index.get(key).and_then(|&pos| self.instances.get(pos))
    }
}

/// A whole document: globals and struct registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub globals: IndexMap<String, Value>,
    pub structs: IndexMap<String, Struct>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully independent deep copy, used as a read-only view during a pass
    pub fn snapshot(&self) -> Context {
        self.clone()
    }

    pub fn struct_names(&self) -> Vec<String> {
        self.structs.keys().cloned().collect()
    }

    pub fn get_struct(&self, name: &str) -> Option<&Struct> {
        self.structs.get(name)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
}
