//! Module resolution
//!
//! Responsible for finding and loading source units from the filesystem.

use crate::error::{ModuleError, ModuleResult};
use quill_lexer::is_identifier;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// File extension appended to extension-less import paths
pub const SOURCE_EXTENSION: &str = "ql";

/// Unique identifier for a source unit, stable for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// A located source unit with its text
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: ModuleId,
    /// Canonical path to the unit
    pub path: PathBuf,
    /// Name the importer binds the unit under (the file stem)
    pub name: SmolStr,
    pub source: String,
}

/// File system-based module resolver
#[derive(Debug, Default)]
pub struct FileSystemResolver {
    /// Maps module IDs to canonical file paths
    id_to_path: FxHashMap<ModuleId, PathBuf>,
    /// Maps canonical file paths to module IDs
    path_to_id: FxHashMap<PathBuf, ModuleId>,
    next_id: usize,
}

impl FileSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a module ID for a canonical path
    fn get_or_create_id(&mut self, path: PathBuf) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }

        let id = ModuleId(self.next_id);
        self.next_id += 1;
        self.id_to_path.insert(id, path.clone());
        self.path_to_id.insert(path, id);
        id
    }

    /// Where `import_path` points when written in `importer`.
    ///
    /// Relative paths resolve against the importer's directory, or the working
    /// directory when there is no importing file.
    pub fn candidate(import_path: &str, importer: Option<&Path>) -> PathBuf {
        let path = Path::new(import_path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match importer.and_then(Path::parent) {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Resolve an import to the canonical identity of an existing file
    pub fn resolve(&mut self, import_path: &str, importer: Option<&Path>) -> ModuleResult<ModuleId> {
        let candidate = Self::candidate(import_path, importer);
        let found = if candidate.is_file() {
            candidate.clone()
        } else if candidate.extension().is_none() {
            candidate.with_extension(SOURCE_EXTENSION)
        } else {
            candidate.clone()
        };

        if !found.is_file() {
            return Err(ModuleError::ModuleNotFound {
                path: import_path.to_string(),
                candidate,
            });
        }

        let canonical = found
            .canonicalize()
            .map_err(|e| ModuleError::IoError(found.clone(), e))?;
        trace!(import = import_path, path = %canonical.display(), "resolved import");
        Ok(self.get_or_create_id(canonical))
    }

    pub fn path(&self, id: ModuleId) -> Option<&Path> {
        self.id_to_path.get(&id).map(PathBuf::as_path)
    }

    /// Name a unit is bound under in its importer: its file stem, which must
    /// be a plain identifier
    pub fn module_name(path: &Path) -> ModuleResult<SmolStr> {
        let file_stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if !is_identifier(file_stem) {
            return Err(ModuleError::InvalidName {
                name: file_stem.to_string(),
                path: path.to_path_buf(),
            });
        }
        Ok(SmolStr::new(file_stem))
    }

    /// Read a resolved unit
    pub fn load(&self, id: ModuleId) -> ModuleResult<SourceFile> {
        let path = self
            .id_to_path
            .get(&id)
            .ok_or_else(|| ModuleError::ModuleNotFound {
                path: format!("{:?}", id),
                candidate: PathBuf::new(),
            })?
            .clone();

        let source = fs::read_to_string(&path).map_err(|e| ModuleError::IoError(path.clone(), e))?;
        let name = Self::module_name(&path)?;

        Ok(SourceFile {
            id,
            path,
            name,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, text: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_candidate_is_relative_to_importer_directory() {
        let importer = Path::new("/project/src/main.ql");
        assert_eq!(
            FileSystemResolver::candidate("lib/math.ql", Some(importer)),
            PathBuf::from("/project/src/lib/math.ql")
        );
        assert_eq!(
            FileSystemResolver::candidate("/abs/x.ql", Some(importer)),
            PathBuf::from("/abs/x.ql")
        );
        assert_eq!(
            FileSystemResolver::candidate("x.ql", None),
            PathBuf::from("x.ql")
        );
    }

    #[test]
    fn test_resolve_and_load() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.ql", "import \"lib/math.ql\"");
        write(dir.path(), "lib/math.ql", "var pi float = 3.14");

        let mut resolver = FileSystemResolver::new();
        let id = resolver.resolve("lib/math.ql", Some(&main)).unwrap();
        let file = resolver.load(id).unwrap();

        assert_eq!(file.name, "math");
        assert_eq!(file.source, "var pi float = 3.14");
        assert!(file.path.is_absolute());
    }

    #[test]
    fn test_extension_is_optional() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.ql", "");
        write(dir.path(), "util.ql", "");

        let mut resolver = FileSystemResolver::new();
        let with_ext = resolver.resolve("util.ql", Some(&main)).unwrap();
        let without_ext = resolver.resolve("util", Some(&main)).unwrap();
        assert_eq!(with_ext, without_ext);
    }

    #[test]
    fn test_same_file_through_different_paths_has_one_id() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.ql", "");
        write(dir.path(), "a/shared.ql", "");

        let mut resolver = FileSystemResolver::new();
        let first = resolver.resolve("a/shared.ql", Some(&main)).unwrap();
        let second = resolver.resolve("a/../a/shared.ql", Some(&main)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_module_name_must_be_an_identifier() {
        assert_eq!(
            FileSystemResolver::module_name(Path::new("/p/lib/math.ql")).unwrap(),
            "math"
        );
        let err = FileSystemResolver::module_name(Path::new("/p/my-lib.ql")).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidName { ref name, .. } if name == "my-lib"));
        assert!(FileSystemResolver::module_name(Path::new("/p/print.ql")).is_err());
    }

    #[test]
    fn test_missing_module() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "main.ql", "");

        let mut resolver = FileSystemResolver::new();
        let err = resolver.resolve("nope.ql", Some(&main)).unwrap_err();
        assert!(matches!(err, ModuleError::ModuleNotFound { ref path, .. } if path == "nope.ql"));
    }
}
