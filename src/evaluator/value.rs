//! Values of the Keel document model
//!
//! Every value is owned by exactly one place in a [`crate::schema::Context`];
//! cloning is always a deep copy, which is what makes the snapshot-based
//! resolution passes safe.

use std::fmt;

use indexmap::IndexMap;

use crate::export::Node;
use crate::lexer::source::SourceLocation;

/// String payload with its rendering state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Text {
    /// Stored text. While `template` is set, escapes are still encoded if `escapes` is set.
    pub text: String,
    /// Contains `{...}` placeholders that have not been rendered yet
    pub template: bool,
    /// Escape sequences are decoded after rendering
    pub escapes: bool,
}

impl Text {
    /// Finished text with nothing left to render
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            template: false,
            escapes: false,
        }
    }

    /// Text awaiting template rendering
    pub fn template(text: impl Into<String>, escapes: bool) -> Self {
        Self {
            text: text.into(),
            template: true,
            escapes,
        }
    }
}

/// One row of a struct, either declared standalone or written inline
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub struct_name: String,
    pub fields: IndexMap<String, Value>,
    /// Set while the fields still hold raw tokens (inline instances before binding);
    /// records where the instance was written.
    pub(crate) unbound: Option<SourceLocation>,
}

impl Instance {
    pub fn new(struct_name: impl Into<String>) -> Self {
        Self {
            struct_name: struct_name.into(),
            fields: IndexMap::new(),
            unbound: None,
        }
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// False until the instance's raw tokens were typed against its schema
    pub fn is_bound(&self) -> bool {
        self.unbound.is_none()
    }
}

/// A row of another struct, looked up by primary key
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub struct_name: String,
    /// Primary-key literal as written
    pub key: String,
    /// Deep copy of the matched row, filled during reference resolution
    pub target: Option<Box<Instance>>,
}

impl Reference {
    pub fn new(struct_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            struct_name: struct_name.into(),
            key: key.into(),
            target: None,
        }
    }

    pub fn target(&self) -> Option<&Instance> {
        self.target.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }
}

/// A value in a Keel document
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Integer (64-bit signed)
    Int(i64),
    /// Floating point (64-bit)
    Float(f64),
    String(Text),
    /// `YYYY-MM-DD` as written
    Date(String),
    /// Time with fractional seconds normalized to 6 digits
    Time(String),
    /// ISO date-time with `T` separator and numeric offset
    DateTime(String),
    Array(Vec<Value>),
    Instance(Instance),
    Reference(Reference),
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Instance(_) => "instance",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text of a string-like value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(t) => Some(&t.text),
            Value::Date(s) | Value::Time(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Project into a field of an instance or of a resolved reference target
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Instance(inst) => inst.get(name),
            Value::Reference(r) => r.target()?.get(name),
            _ => None,
        }
    }

    /// Canonical text form, used for template output and primary-key index keys.
    ///
    /// Arrays, instances and null render as the empty string.
    pub fn render_text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => float_text(*n),
            Value::String(t) => t.text.clone(),
            Value::Date(s) | Value::Time(s) | Value::DateTime(s) => s.clone(),
            Value::Reference(r) => r.key.clone(),
            Value::Null | Value::Array(_) | Value::Instance(_) => String::new(),
        }
    }

    /// Convert to the generic output tree
    pub fn to_node(&self) -> Node {
        match self {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Int(n) => Node::Int(*n),
            Value::Float(n) => Node::Float(*n),
            Value::String(t) => Node::String(t.text.clone()),
            Value::Date(s) | Value::Time(s) | Value::DateTime(s) => Node::String(s.clone()),
            Value::Array(arr) => Node::Array(arr.iter().map(Value::to_node).collect()),
            Value::Instance(inst) => instance_node(inst),
            Value::Reference(r) => r.target().map_or(Node::Null, instance_node),
        }
    }
}

/// Ordered object over an instance's fields
pub fn instance_node(inst: &Instance) -> Node {
    Node::Object(
        inst.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_node()))
            .collect(),
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Instance(inst) => {
                write!(f, "{}(", inst.struct_name)?;
                for (i, (k, v)) in inst.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, ")")
            }
            Value::Reference(r) => write!(f, "{}({})", r.struct_name, r.key),
            other => write!(f, "{}", other.render_text()),
        }
    }
}

/// Plain decimal for moderate magnitudes, exponent form for very large or small ones
fn float_text(n: f64) -> String {
    let magnitude = n.abs();
    if n.is_finite() && n != 0.0 && !(1e-5..1e16).contains(&magnitude) {
        format!("{:e}", n)
    } else {
        n.to_string()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Text::plain(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Text::plain(s))
    }
}

impl From<Instance> for Value {
    fn from(inst: Instance) -> Self {
        Value::Instance(inst)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}
