//! JSON emitter

use tracing::warn;

use super::Emitter;
use crate::errors::{KeelError, KeelResult};
use crate::export::Node;

/// JSON output emitter
pub struct JsonEmitter {
    /// Whether to pretty-print with indentation
    pretty: bool,
}

impl JsonEmitter {
    /// Create a new JSON emitter
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

/// True if any float in the tree is NaN or infinite
fn has_non_finite(node: &Node) -> bool {
    match node {
        Node::Float(n) => !n.is_finite(),
        Node::Array(items) => items.iter().any(has_non_finite),
        Node::Object(obj) => obj.values().any(has_non_finite),
        _ => false,
    }
}

impl Emitter for JsonEmitter {
    fn emit(&self, node: &Node) -> KeelResult<String> {
        if has_non_finite(node) {
            warn!("non-finite float converted to null in JSON output; use --format yaml to keep it");
        }
        let result = if self.pretty {
            serde_json::to_string_pretty(node)
        } else {
            serde_json::to_string(node)
        };
        result.map_err(|e| KeelError::io_error(format!("JSON serialization failed: {}", e)))
    }
}
