//! Module cache
//!
//! Keeps every unit resolved during a run, keyed by canonical identity, so a
//! second import of the same file is a lookup instead of a re-evaluation.

use crate::error::{ModuleError, ModuleResult};
use crate::resolver::ModuleId;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Progress of one unit
#[derive(Debug, Clone)]
pub enum LoadState<M> {
    /// Top level is being evaluated
    Loading,
    Ready(M),
}

/// Run-wide cache of loaded modules
#[derive(Debug)]
pub struct ModuleCache<M> {
    modules: FxHashMap<ModuleId, (SmolStr, LoadState<M>)>,
    /// Units currently loading, outermost first
    loading: Vec<ModuleId>,
}

impl<M: Clone> ModuleCache<M> {
    pub fn new() -> Self {
        Self {
            modules: FxHashMap::default(),
            loading: Vec::new(),
        }
    }

    /// A finished module, if `id` has been loaded
    pub fn get(&self, id: ModuleId) -> Option<M> {
        match self.modules.get(&id) {
            Some((_, LoadState::Ready(module))) => Some(module.clone()),
            _ => None,
        }
    }

    /// Mark `id` as loading. Fails if it is already loading further up the import chain.
    pub fn begin(&mut self, id: ModuleId, name: SmolStr) -> ModuleResult<()> {
        if let Some((_, LoadState::Loading)) = self.modules.get(&id) {
            let start = self.loading.iter().position(|&l| l == id).unwrap_or(0);
            let mut cycle: Vec<String> = self.loading[start..]
                .iter()
                .filter_map(|l| self.modules.get(l).map(|(n, _)| n.to_string()))
                .collect();
            cycle.push(name.to_string());
            return Err(ModuleError::CircularImport(cycle));
        }

        self.modules.insert(id, (name, LoadState::Loading));
        self.loading.push(id);
        Ok(())
    }

    /// Store the loaded module for `id`
    pub fn finish(&mut self, id: ModuleId, module: M) {
        self.loading.retain(|&l| l != id);
        if let Some((_, state)) = self.modules.get_mut(&id) {
            *state = LoadState::Ready(module);
        }
    }

    /// Forget a unit whose load failed
    pub fn abandon(&mut self, id: ModuleId) {
        self.loading.retain(|&l| l != id);
        self.modules.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<M: Clone> Default for ModuleCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_begin_finish_get() {
        let mut cache: ModuleCache<&'static str> = ModuleCache::new();
        let id = ModuleId(0);

        assert_eq!(cache.get(id), None);
        cache.begin(id, "math".into()).unwrap();
        assert_eq!(cache.get(id), None);
        cache.finish(id, "module");
        assert_eq!(cache.get(id), Some("module"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cycle_is_detected() {
        let mut cache: ModuleCache<u8> = ModuleCache::new();
        cache.begin(ModuleId(0), "a".into()).unwrap();
        cache.begin(ModuleId(1), "b".into()).unwrap();

        let err = cache.begin(ModuleId(0), "a".into()).unwrap_err();
        match err {
            ModuleError::CircularImport(chain) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected circular import, got {:?}", other),
        }
    }

    #[test]
    fn test_abandon_allows_retry() {
        let mut cache: ModuleCache<u8> = ModuleCache::new();
        cache.begin(ModuleId(3), "broken".into()).unwrap();
        cache.abandon(ModuleId(3));
        assert!(cache.is_empty());
        assert!(cache.begin(ModuleId(3), "broken".into()).is_ok());
    }
}
