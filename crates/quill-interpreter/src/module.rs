//! Modules: built-in libraries and imported source units.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use quill_lexer::Span;
use quill_modules::{FileSystemResolver, ModuleCache};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::console::Console;
use crate::environment::Streams;
use crate::eval::Interpreter;
use crate::value::Value;
use crate::{Result, RuntimeError};

/// The exported surface of a library or another source unit.
pub trait Module {
    fn name(&self) -> &str;

    /// Call `function` with `args`. Errors about the call itself (unknown
    /// function, arity, argument types) come back without a position so the
    /// caller can attach its own.
    fn call(&self, function: &str, args: Vec<Value>, streams: &Streams) -> Result<Vec<Value>>;
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module({})", self.name())
    }
}

type Factory = fn() -> Rc<dyn Module>;

/// Registry of built-in libraries, consulted before the filesystem.
#[derive(Debug, Clone)]
pub struct Libraries {
    factories: FxHashMap<SmolStr, Factory>,
}

impl Default for Libraries {
    fn default() -> Self {
        Self::standard()
    }
}

impl Libraries {
    pub fn empty() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Every library that ships with the interpreter.
    pub fn standard() -> Self {
        let mut libraries = Self::empty();
        libraries.register("console", Console::create);
        libraries
    }

    pub fn register(&mut self, name: impl Into<SmolStr>, factory: Factory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Module>> {
        self.factories.get(name).map(|factory| factory())
    }
}

/// A source unit whose top level has run, frozen with its own environment.
///
/// Calls run inside that environment, so the functions of the unit see the
/// unit's own globals and imports rather than the caller's.
pub struct SourceModule {
    name: SmolStr,
    interpreter: RefCell<Interpreter>,
}

impl SourceModule {
    pub fn new(name: impl Into<SmolStr>, interpreter: Interpreter) -> Self {
        Self {
            name: name.into(),
            interpreter: RefCell::new(interpreter),
        }
    }
}

impl Module for SourceModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, function: &str, args: Vec<Value>, _streams: &Streams) -> Result<Vec<Value>> {
        let mut interpreter =
            self.interpreter
                .try_borrow_mut()
                .map_err(|_| RuntimeError::ModuleBusy {
                    name: self.name.clone(),
                    span: Span::dummy(),
                })?;
        interpreter.call_export(function, args)
    }
}

/// Run-wide state for resolving imports.
pub(crate) struct Loader {
    pub resolver: FileSystemResolver,
    pub cache: ModuleCache<Rc<dyn Module>>,
    pub libraries: Libraries,
}

impl Loader {
    pub fn new(libraries: Libraries) -> Self {
        Self {
            resolver: FileSystemResolver::new(),
            cache: ModuleCache::new(),
            libraries,
        }
    }
}

/// How an environment reaches the loader. The top-level environment owns it;
/// module environments only borrow it so the cache never keeps itself alive.
#[derive(Clone)]
pub(crate) enum LoaderHandle {
    Owned(Rc<RefCell<Loader>>),
    Shared(Weak<RefCell<Loader>>),
}

impl LoaderHandle {
    pub fn new(libraries: Libraries) -> Self {
        LoaderHandle::Owned(Rc::new(RefCell::new(Loader::new(libraries))))
    }

    pub fn get(&self) -> Option<Rc<RefCell<Loader>>> {
        match self {
            LoaderHandle::Owned(loader) => Some(Rc::clone(loader)),
            LoaderHandle::Shared(loader) => loader.upgrade(),
        }
    }

    /// A non-owning handle for a module's environment.
    pub fn share(&self) -> LoaderHandle {
        match self {
            LoaderHandle::Owned(loader) => LoaderHandle::Shared(Rc::downgrade(loader)),
            LoaderHandle::Shared(loader) => LoaderHandle::Shared(Weak::clone(loader)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_libraries() {
        let libraries = Libraries::standard();
        assert_eq!(libraries.get("console").map(|m| m.name().to_string()), Some("console".into()));
        assert!(libraries.get("math").is_none());
        assert!(Libraries::empty().get("console").is_none());
    }

    #[test]
    fn test_shared_loader_does_not_keep_it_alive() {
        let owner = LoaderHandle::new(Libraries::empty());
        let shared = owner.share();
        assert!(shared.get().is_some());
        drop(owner);
        assert!(shared.get().is_none());
    }
}
