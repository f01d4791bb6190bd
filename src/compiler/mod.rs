//! Compiler for the Keel configuration language
//!
//! The compiler orchestrates the full pipeline:
//! 1. Expand includes into source lines
//! 2. Assemble logical lines
//! 3. Parse globals, structs and rows
//! 4. Run the four resolution passes
//! 5. Export the resolved document

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{KeelError, KeelResult};
use crate::evaluator::resolve;
use crate::export::{export, Node};
use crate::lexer::assemble;
use crate::lexer::source::SourceLine;
use crate::parser::Parser;
use crate::resolver::{DiskLoader, IncludeResolver, SourceLoader};
use crate::schema::Context;

/// Compiler for Keel documents
pub struct Compiler {
    /// Directory that includes in in-memory source resolve against
    base_dir: PathBuf,
    loader: Box<dyn SourceLoader>,
}

impl Compiler {
    /// Create a compiler that reads files from disk
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_loader(base_dir, DiskLoader)
    }

    /// Create a compiler over a custom file loader
    pub fn with_loader(base_dir: impl Into<PathBuf>, loader: impl SourceLoader + 'static) -> Self {
        Self {
            base_dir: base_dir.into(),
            loader: Box::new(loader),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Parse and resolve source text (for stdin/inline input)
    pub fn parse_source(&self, source: &str) -> KeelResult<Context> {
        let lines =
            IncludeResolver::new(self.loader.as_ref()).expand_source(source, &self.base_dir)?;
        self.build(&lines)
    }

    /// Parse and resolve a file; relative paths start at the base directory
    pub fn parse_file(&self, path: impl AsRef<Path>) -> KeelResult<Context> {
        let path = self.base_dir.join(path.as_ref());
        let lines = IncludeResolver::new(self.loader.as_ref()).expand_file(&path)?;
        self.build(&lines)
    }

    /// Compile source text to its exported tree
    pub fn compile_source(&self, source: &str) -> KeelResult<Node> {
        Ok(export(&self.parse_source(source)?))
    }

    /// Compile a file to its exported tree
    pub fn compile(&self, path: impl AsRef<Path>) -> KeelResult<Node> {
        Ok(export(&self.parse_file(path)?))
    }

    fn build(&self, lines: &[SourceLine]) -> KeelResult<Context> {
        let logical = assemble(lines)?;
        debug!(
            "assembled {} physical line(s) into {} logical line(s)",
            lines.len(),
            logical.len()
        );
        let mut ctx = Parser::new().parse(&logical)?;
        debug!(
            "parsed {} global(s) and {} struct(s)",
            ctx.globals.len(),
            ctx.structs.len()
        );
        resolve(&mut ctx)?;
        Ok(ctx)
    }
}

/// Parse and resolve source text; includes resolve from the current directory
pub fn parse_str(content: &str) -> KeelResult<Context> {
    Compiler::new(".").parse_source(content)
}

/// Parse and resolve a file from disk
pub fn parse_file(path: impl AsRef<Path>) -> KeelResult<Context> {
    let path = path.as_ref();

    // Canonicalize the path first to get absolute path
    let canonical = path.canonicalize().map_err(|e| {
        KeelError::io_error(format!("failed to resolve path {}: {}", path.display(), e))
    })?;

    let base_dir = canonical.parent().unwrap_or(Path::new("."));
    Compiler::new(base_dir).parse_file(&canonical)
}

/// Convenience function to compile a file to its exported tree
pub fn compile_file(path: impl AsRef<Path>) -> KeelResult<Node> {
    Ok(export(&parse_file(path)?))
}
