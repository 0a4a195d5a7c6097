//! Application description: program-wide choices per interface.
//!
//! Only the resolved contribution is modelled here; the file syntax
//! belongs to the loader.

use modlink_ir::{ConstraintExpr, InterfaceId, Module, ModuleName};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// What the application says about one interface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Only this module may be bound.
    Module(ModuleName),
    /// Extra clauses ANDed with every in-module constraint.
    Clauses(ConstraintExpr),
}

#[derive(Clone, Debug, Default)]
pub struct AppDescription {
    selectors: FxHashMap<InterfaceId, Selector>,
}

impl AppDescription {
    pub fn new() -> Self {
        AppDescription::default()
    }

    #[must_use]
    pub fn select(mut self, interface: impl Into<InterfaceId>, module: impl Into<ModuleName>) -> Self {
        self.selectors
            .insert(interface.into(), Selector::Module(module.into()));
        self
    }

    #[must_use]
    pub fn require(mut self, interface: impl Into<InterfaceId>, clauses: ConstraintExpr) -> Self {
        self.selectors
            .insert(interface.into(), Selector::Clauses(clauses));
        self
    }

    pub fn insert(&mut self, interface: InterfaceId, selector: Selector) {
        self.selectors.insert(interface, selector);
    }

    pub fn selector(&self, interface: &InterfaceId) -> Option<&Selector> {
        self.selectors.get(interface)
    }

    /// The in-module constraint with any application clauses ANDed on.
    pub fn effective_constraint(
        &self,
        interface: &InterfaceId,
        constraint: &ConstraintExpr,
    ) -> ConstraintExpr {
        match self.selector(interface) {
            Some(Selector::Clauses(clauses)) => constraint.clone().conjoin(clauses.clone()),
            Some(Selector::Module(_)) | None => constraint.clone(),
        }
    }

    /// Whether an explicit module selector allows `module`.
    pub fn admits(&self, module: &Module) -> bool {
        match self.selector(&module.implements) {
            Some(Selector::Module(name)) => *name == module.name,
            Some(Selector::Clauses(_)) | None => true,
        }
    }

    /// Selectors in interface id order.
    pub fn iter(&self) -> impl Iterator<Item = (&InterfaceId, &Selector)> {
        let mut selectors: Vec<_> = self.selectors.iter().collect();
        selectors.sort_by(|a, b| a.0.cmp(b.0));
        selectors.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modlink_ir::Relation;

    #[test]
    fn test_clauses_are_anded() {
        let app = AppDescription::new().require(
            "Data.Set",
            ConstraintExpr::meta(["Author"], Relation::is("Quil")),
        );
        let own = ConstraintExpr::id_equals("Data.Set");
        let effective = app.effective_constraint(&"Data.Set".into(), &own);
        assert_eq!(
            effective,
            ConstraintExpr::and([own.clone(), ConstraintExpr::meta(["Author"], Relation::is("Quil"))])
        );
        assert_eq!(app.effective_constraint(&"Data.Map".into(), &own), own);
    }

    #[test]
    fn test_module_selector_admits_only_named() {
        let app = AppDescription::new().select("Data.Set", "Set_B");
        assert!(app.admits(&Module::new("Set_B", "Data.Set")));
        assert!(!app.admits(&Module::new("Set_A", "Data.Set")));
        assert!(app.admits(&Module::new("Map_T", "Data.Map")));
    }
}
