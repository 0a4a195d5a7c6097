//! Interface registry: `InterfaceId` → `Interface`.
//!
//! Populated once per build session by the loader; read-only afterwards.

use modlink_ir::{Interface, InterfaceId};
use rustc_hash::FxHashMap;

use crate::error::RegistryError;

/// All interfaces of a program, keyed by id.
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    interfaces: FxHashMap<InterfaceId, Interface>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        InterfaceRegistry::default()
    }

    /// Register an interface. Ids are unique per program.
    pub fn register(&mut self, interface: Interface) -> Result<(), RegistryError> {
        if self.interfaces.contains_key(&interface.id) {
            return Err(RegistryError::DuplicateInterfaceId(interface.id));
        }
        tracing::trace!(id = %interface.id, signatures = interface.signatures.len(), "interface registered");
        self.interfaces.insert(interface.id.clone(), interface);
        Ok(())
    }

    pub fn lookup(&self, id: &InterfaceId) -> Result<&Interface, RegistryError> {
        self.interfaces
            .get(id)
            .ok_or_else(|| RegistryError::UnknownInterface(id.clone()))
    }

    pub fn contains(&self, id: &InterfaceId) -> bool {
        self.interfaces.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<&InterfaceId> {
        let mut ids: Vec<_> = self.interfaces.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlink_ir::Signature;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = InterfaceRegistry::new();
        registry
            .register(Interface::new("Data.Set").with_signature(Signature::function("has", 2)))
            .unwrap();

        let found = registry.lookup(&InterfaceId::new("Data.Set")).unwrap();
        assert_eq!(found.signatures.len(), 1);
        assert!(registry.contains(&"Data.Set".into()));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = InterfaceRegistry::new();
        registry.register(Interface::new("Data.Set")).unwrap();
        let err = registry.register(Interface::new("Data.Set")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateInterfaceId("Data.Set".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_interface() {
        let registry = InterfaceRegistry::new();
        let err = registry.lookup(&"Data.Map".into()).unwrap_err();
        assert_eq!(err, RegistryError::UnknownInterface("Data.Map".into()));
    }

    #[test]
    fn test_ids_sorted() {
        let mut registry = InterfaceRegistry::new();
        for id in ["Data.Set", "Data.Map", "Control.Monad"] {
            registry.register(Interface::new(id)).unwrap();
        }
        let ids: Vec<_> = registry.ids().into_iter().map(InterfaceId::as_str).collect();
        assert_eq!(ids, vec!["Control.Monad", "Data.Map", "Data.Set"]);
    }
}
