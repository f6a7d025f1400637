//! Unit analysis boundary
//!
//! The monitor never inspects source code itself. It asks a
//! [`UnitAnalyzer`] for two fact lists per unit:
//! - `imports`: `(symbol, target, level)` triples
//! - `types`: class declarations with their base references
//!
//! [`PythonAnalyzer`] is the tree-sitter implementation used by default.

mod python;

pub use python::PythonAnalyzer;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while analyzing a unit
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Source is not valid UTF-8
    #[error("Not valid UTF-8: {0}")]
    NotUtf8(PathBuf),
    /// Source failed to parse
    #[error("Syntax error in {path} at line {line}")]
    Syntax { path: PathBuf, line: usize },
    /// Grammar could not be loaded (indicates a build problem)
    #[error("Failed to load grammar: {0}")]
    Grammar(String),
}

impl AnalysisError {
    /// True when the file itself is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalysisError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// One import binding found in a unit
///
/// `level` follows the import statement: `0` is absolute, a positive value
/// counts leading dots of a relative import, and a negative value means
/// "relative to the current package first, then absolute".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFact {
    /// Name bound in the importing module (alias if present)
    pub symbol: String,
    /// Imported dotted name, without the leading dots
    pub target: String,
    pub level: i32,
}

impl ImportFact {
    pub fn new(symbol: impl Into<String>, target: impl Into<String>, level: i32) -> Self {
        Self {
            symbol: symbol.into(),
            target: target.into(),
            level,
        }
    }
}

/// A class declared in a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDeclaration {
    pub name: String,
    /// Base class references as written (`Base`, `mod.Base`)
    pub bases: Vec<String>,
}

/// Everything the graph needs to know about one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facts {
    pub imports: Vec<ImportFact>,
    pub types: Vec<TypeDeclaration>,
}

impl Facts {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.types.is_empty()
    }
}

/// Extracts import and class facts from a unit
pub trait UnitAnalyzer {
    /// Analyze already-loaded source text
    fn analyze(&self, path: &Path, source: &str) -> Result<Facts, AnalysisError>;

    /// Read and analyze the file at `path`
    fn analyze_file(&self, path: &Path) -> Result<Facts, AnalysisError> {
        let _span = tracing::debug_span!("analyze", path = %path.display()).entered();
        let bytes = std::fs::read(path)?;
        let source =
            String::from_utf8(bytes).map_err(|_| AnalysisError::NotUtf8(path.to_path_buf()))?;
        // Normalize line endings (CRLF -> LF) so line numbers are stable
        let source = source.replace("\r\n", "\n");
        self.analyze(path, &source)
    }
}

impl<A: UnitAnalyzer + ?Sized> UnitAnalyzer for Box<A> {
    fn analyze(&self, path: &Path, source: &str) -> Result<Facts, AnalysisError> {
        (**self).analyze(path, source)
    }
}
