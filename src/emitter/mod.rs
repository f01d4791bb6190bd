//! Emitters for resolved Keel documents
//!
//! Serializes an exported [`Node`] tree to JSON or YAML.

mod json;
mod yaml;

pub use json::JsonEmitter;
pub use yaml::YamlEmitter;

use crate::errors::{KeelError, KeelResult};
use crate::export::Node;

/// Output format for emission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Yaml,
}

impl OutputFormat {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }

    /// Infer the format from an output file extension; pretty JSON otherwise
    pub fn from_extension(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                OutputFormat::Yaml
            }
            _ => OutputFormat::JsonPretty,
        }
    }
}

/// Trait for output emitters
pub trait Emitter {
    /// Emit a node tree to string
    fn emit(&self, node: &Node) -> KeelResult<String>;

    /// Emit a node tree to a writer
    fn emit_to_writer<W: std::io::Write>(&self, node: &Node, writer: &mut W) -> KeelResult<()> {
        let output = self.emit(node)?;
        writer
            .write_all(output.as_bytes())
            .map_err(|e| KeelError::io_error(e.to_string()))
    }
}

/// Emit a node tree to a string in the specified format
pub fn emit(node: &Node, format: OutputFormat) -> KeelResult<String> {
    match format {
        OutputFormat::Json => JsonEmitter::new(false).emit(node),
        OutputFormat::JsonPretty => JsonEmitter::new(true).emit(node),
        OutputFormat::Yaml => YamlEmitter::new().emit(node),
    }
}
