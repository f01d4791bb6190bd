//! Include resolver for the Keel configuration language
//!
//! Expands `#include "relative/path"` directives into the lines of the named
//! file, recursively. Paths resolve relative to the including file. Every file
//! is expanded at most once per document: a repeated or circular include is
//! skipped without producing any lines. Each produced line remembers its
//! origin file and line number for diagnostics.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{KeelError, KeelResult};
use crate::lexer::source::SourceLine;

const INCLUDE_DIRECTIVE: &str = "#include";

/// Normalize a path by resolving `.` and `..` components
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                // Pop the last component if possible
                if !components.is_empty() {
                    components.pop();
                }
            }
            std::path::Component::CurDir => {}
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Where source files come from
pub trait SourceLoader {
    /// Canonical identity of `path`, or `None` if there is no such file
    fn canonicalize(&self, path: &Path) -> Option<PathBuf>;

    /// Read a file previously returned by [`SourceLoader::canonicalize`]
    fn read(&self, path: &Path) -> KeelResult<String>;
}

/// Loads files from the filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskLoader;

impl SourceLoader for DiskLoader {
    fn canonicalize(&self, path: &Path) -> Option<PathBuf> {
        path.canonicalize().ok().filter(|p| p.is_file())
    }

    fn read(&self, path: &Path) -> KeelResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| KeelError::io_error(format!("failed to read {}: {}", path.display(), e)))
    }
}

/// In-memory files, keyed by normalized path
#[derive(Debug, Default, Clone)]
pub struct VirtualLoader {
    files: HashMap<PathBuf, String>,
}

impl VirtualLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a virtual file
    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .insert(normalize_path(&path.into()), content.into());
    }

    /// Builder-style [`VirtualLoader::add_file`]
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }
}

impl SourceLoader for VirtualLoader {
    fn canonicalize(&self, path: &Path) -> Option<PathBuf> {
        let path = normalize_path(path);
        self.files.contains_key(&path).then_some(path)
    }

    fn read(&self, path: &Path) -> KeelResult<String> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| KeelError::io_error(format!("file not found: {}", path.display())))
    }
}

/// Parse an include directive, returning the path and its 1-based column
fn include_target(line: &SourceLine) -> KeelResult<Option<(&str, usize)>> {
    let text = line.text.as_str();
    let body = text.trim_start();
    let Some(rest) = body.strip_prefix(INCLUDE_DIRECTIVE) else {
        return Ok(None);
    };
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return Ok(None);
    }

    let quoted = rest.trim();
    let column = text[..text.len() - rest.trim_start().len()].chars().count() + 1;
    let path = ['"', '\'']
        .iter()
        .find_map(|&q| quoted.strip_prefix(q).and_then(|s| s.strip_suffix(q)))
        .filter(|p| !p.is_empty() && quoted.len() >= 2);

    match path {
        Some(path) => Ok(Some((path, column + 1))),
        None => Err(KeelError::unexpected_line(
            line.location(column, quoted.chars().count().max(1)),
            "malformed include directive",
            "write the path in quotes: #include \"common.keel\"",
        )),
    }
}

/// Expands include directives over a [`SourceLoader`]
pub struct IncludeResolver<'l> {
    loader: &'l dyn SourceLoader,
    /// Canonical paths already expanded into this document
    visited: HashSet<PathBuf>,
}

impl<'l> IncludeResolver<'l> {
    pub fn new(loader: &'l dyn SourceLoader) -> Self {
        Self {
            loader,
            visited: HashSet::new(),
        }
    }

    /// Expand a file and everything it includes
    pub fn expand_file(&mut self, path: impl AsRef<Path>) -> KeelResult<Vec<SourceLine>> {
        let path = path.as_ref();
        let canonical = self
            .loader
            .canonicalize(path)
            .ok_or_else(|| KeelError::io_error(format!("file not found: {}", path.display())))?;
        self.expand_canonical(canonical)
    }

    /// Expand in-memory source; its includes resolve relative to `base_dir`
    pub fn expand_source(&mut self, source: &str, base_dir: &Path) -> KeelResult<Vec<SourceLine>> {
        self.expand_lines(SourceLine::from_text(source), base_dir)
    }

    fn expand_canonical(&mut self, path: PathBuf) -> KeelResult<Vec<SourceLine>> {
        if !self.visited.insert(path.clone()) {
            debug!("skipping {}, already included", path.display());
            return Ok(Vec::new());
        }
        debug!("including {}", path.display());

        let source = self.loader.read(&path)?;
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, text)| SourceLine::new(text, Some(path.clone()), i + 1))
            .collect();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.expand_lines(lines, &dir)
    }

    fn expand_lines(&mut self, lines: Vec<SourceLine>, dir: &Path) -> KeelResult<Vec<SourceLine>> {
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            let Some((target, column)) = include_target(&line)? else {
                out.push(line);
                continue;
            };

            let candidate = dir.join(target);
            let Some(canonical) = self.loader.canonicalize(&candidate) else {
                return Err(KeelError::IncludeNotFound {
                    location: line.location(column, target.chars().count()),
                    path: target.to_string(),
                });
            };
            out.extend(self.expand_canonical(canonical)?);
        }
        Ok(out)
    }
}
