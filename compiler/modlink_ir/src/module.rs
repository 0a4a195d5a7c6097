//! Interfaces, modules, and dependencies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ConstraintExpr, ContentHash, Definition, InterfaceId, Metadata, ModuleName, Signature, Value};

/// A named, versionless contract: required signatures plus metadata that
/// every implementation inherits.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

impl Interface {
    pub fn new(id: impl Into<InterfaceId>) -> Self {
        Interface {
            id: id.into(),
            metadata: Metadata::new(),
            signatures: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(name, value);
        self
    }

    /// Find a declared signature by name.
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.name() == name)
    }
}

/// A declared requirement on some implementation of an interface.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Dependency {
    pub interface: InterfaceId,
    /// Signature names the consumer intends to use (`uses X exposing ...`).
    #[serde(default)]
    pub exposing: BTreeSet<String>,
    #[serde(default)]
    pub constraint: ConstraintExpr,
}

impl Dependency {
    /// Depend on `interface` with no extra constraint.
    pub fn on(interface: impl Into<InterfaceId>) -> Self {
        Dependency {
            interface: interface.into(),
            exposing: BTreeSet::new(),
            constraint: ConstraintExpr::True,
        }
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: ConstraintExpr) -> Self {
        self.constraint = constraint;
        self
    }

    #[must_use]
    pub fn exposing<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.exposing.extend(names.into_iter().map(Into::into));
        self
    }
}

/// An implementation of exactly one interface.
///
/// `definitions` is a superset of the interface's signatures; extras are
/// private to the module. Bodies are late-bound and never inspected here.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Module {
    pub name: ModuleName,
    pub implements: InterfaceId,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Module {
    pub fn new(name: impl Into<ModuleName>, implements: impl Into<InterfaceId>) -> Self {
        Module {
            name: name.into(),
            implements: implements.into(),
            metadata: Metadata::new(),
            definitions: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_definition(mut self, signature: Signature) -> Self {
        self.definitions.push(Definition::declared(signature));
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Find a definition by name.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name() == name)
    }

    /// Whether a structurally equal signature is defined.
    pub fn has_signature(&self, signature: &Signature) -> bool {
        self.definitions
            .iter()
            .any(|d| d.signature.structurally_eq(signature))
    }

    /// Layer this module's local annotations over the interface's.
    #[must_use]
    pub fn inherit(mut self, interface: &Interface) -> Self {
        self.metadata = interface.metadata.overlay(&self.metadata);
        self
    }

    /// Fingerprint of everything the linker can observe about this module.
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::of(self)
    }
}
