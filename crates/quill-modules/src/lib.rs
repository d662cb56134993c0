//! Quill Module System
//!
//! The filesystem side of `import`: locating a source unit relative to its
//! importer, assigning canonical identities, and tracking which units are
//! loaded or still loading. Evaluating a unit is the interpreter's job.

pub mod cache;
pub mod error;
pub mod resolver;

pub use cache::{LoadState, ModuleCache};
pub use error::{ModuleError, ModuleResult};
pub use resolver::{FileSystemResolver, ModuleId, SourceFile, SOURCE_EXTENSION};
