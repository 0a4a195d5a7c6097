//! Module storage.
//!
//! Modules reference each other only by name, so mutually dependent
//! modules never form ownership cycles. The arena owns every registered
//! module together with its home search space.

use modlink_ir::{Module, ModuleName};
use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::space::SpaceId;

/// Index of a module in the arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ModuleIdx(u32);

impl ModuleIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A registered module and the space its own dependencies resolve in.
#[derive(Clone, Debug)]
pub struct ModuleEntry {
    pub module: Module,
    pub home: SpaceId,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleArena {
    entries: Vec<ModuleEntry>,
    by_name: FxHashMap<ModuleName, ModuleIdx>,
}

impl ModuleArena {
    pub fn new() -> Self {
        ModuleArena::default()
    }

    pub fn insert(&mut self, module: Module, home: SpaceId) -> Result<ModuleIdx, RegistryError> {
        if self.by_name.contains_key(&module.name) {
            return Err(RegistryError::DuplicateModule(module.name));
        }
        let idx = ModuleIdx(u32::try_from(self.entries.len()).unwrap_or(u32::MAX));
        self.by_name.insert(module.name.clone(), idx);
        self.entries.push(ModuleEntry { module, home });
        Ok(idx)
    }

    pub fn get(&self, name: &ModuleName) -> Option<&ModuleEntry> {
        self.by_name.get(name).map(|idx| &self.entries[idx.index()])
    }

    pub fn module(&self, name: &ModuleName) -> Option<&Module> {
        self.get(name).map(|entry| &entry.module)
    }

    pub fn contains(&self, name: &ModuleName) -> bool {
        self.by_name.contains_key(name)
    }

    /// Module names in sorted order.
    pub fn names(&self) -> Vec<&ModuleName> {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
