//! YAML emitter

use super::Emitter;
use crate::errors::{KeelError, KeelResult};
use crate::export::Node;

/// YAML output emitter
#[derive(Debug, Default)]
pub struct YamlEmitter;

impl YamlEmitter {
    /// Create a new YAML emitter
    pub fn new() -> Self {
        Self
    }
}

impl Emitter for YamlEmitter {
    fn emit(&self, node: &Node) -> KeelResult<String> {
        serde_yaml::to_string(node)
            .map_err(|e| KeelError::io_error(format!("YAML serialization failed: {}", e)))
    }
}
