// Rust 1.93+ triggers false positives on thiserror/miette derive macro fields
#![allow(unused_assignments)]

//! Keel Configuration Language
//!
//! A row-oriented configuration language that compiles to JSON and YAML.
//! Documents declare typed globals and struct schemas, list rows of data
//! under each struct, and connect rows through primary-key references and
//! `{path}` templates.
//!
//! # Example
//!
//! ```keel
//! str env: production
//!
//! Port:
//!   *str name:
//!   int number:
//!   - http, 80
//!
//! Service:
//!   *str name:
//!   Port port:
//!   str url: "{name}.{env}:{port.number}"
//!   - api, Port(http)
//! ```

pub mod compiler;
pub mod emitter;
pub mod errors;
pub mod evaluator;
pub mod export;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod schema;

pub use compiler::{compile_file, parse_file, parse_str, Compiler};
pub use emitter::{emit, Emitter, JsonEmitter, OutputFormat, YamlEmitter};
pub use errors::{KeelError, KeelResult};
pub use evaluator::{resolve, Instance, Reference, Text, Value};
pub use export::{export, Node};
pub use lexer::source::{SourceLine, SourceLocation};
pub use lexer::{assemble, LogicalLine};
pub use parser::Parser;
pub use resolver::{DiskLoader, IncludeResolver, SourceLoader, VirtualLoader};
pub use schema::types::{FieldType, ScalarType};
pub use schema::{Context, FieldSchema, Struct};
