//! Type descriptors for declared fields and globals

use std::fmt;

/// The element type of a field, before any `[]` marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Str,
    Date,
    Time,
    DateTime,
    /// A struct name, or any other name parsed with `Name(args)` syntax
    Struct(String),
}

impl ScalarType {
    /// Resolve a type name as written in a declaration
    pub fn from_name(name: &str) -> Self {
        match name {
            "bool" => ScalarType::Bool,
            "int" => ScalarType::Int,
            "float" => ScalarType::Float,
            "str" => ScalarType::Str,
            "date" => ScalarType::Date,
            "time" => ScalarType::Time,
            "datetime" => ScalarType::DateTime,
            other => ScalarType::Struct(other.to_string()),
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, ScalarType::Struct(_))
    }

    pub fn name(&self) -> &str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Str => "str",
            ScalarType::Date => "date",
            ScalarType::Time => "time",
            ScalarType::DateTime => "datetime",
            ScalarType::Struct(name) => name,
        }
    }
}

/// Full type descriptor: `int`, `str[]`, `Port`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    pub scalar: ScalarType,
    pub array: bool,
}

impl FieldType {
    pub fn new(scalar: ScalarType, array: bool) -> Self {
        Self { scalar, array }
    }

    /// Parse a descriptor such as `int` or `Port[]`
    pub fn parse(descriptor: &str) -> Self {
        let descriptor = descriptor.trim();
        match descriptor.strip_suffix("[]") {
            Some(element) => FieldType::new(ScalarType::from_name(element.trim_end()), true),
            None => FieldType::new(ScalarType::from_name(descriptor), false),
        }
    }

    /// The type of one element of an array type
    pub fn element(&self) -> FieldType {
        FieldType::new(self.scalar.clone(), false)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scalar.name())?;
        if self.array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}
