//! Module system errors

use std::path::PathBuf;
use thiserror::Error;

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors that can occur while locating and loading source units
#[derive(Debug, Error)]
pub enum ModuleError {
    /// No file exists at the resolved location
    #[error("module not found: \"{path}\" (looked for {})", .candidate.display())]
    ModuleNotFound { path: String, candidate: PathBuf },

    /// IO error while reading a module file
    #[error("IO error reading {}: {1}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),

    /// The file stem cannot be written as `name.function()`
    #[error("\"{name}\" is not a valid module name (from {})", .path.display())]
    InvalidName { name: String, path: PathBuf },

    /// A unit imported itself, directly or through other units
    #[error("circular import: {}", .0.join(" -> "))]
    CircularImport(Vec<String>),
}
