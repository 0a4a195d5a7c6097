//! Hierarchical, trust-scoped search spaces.
//!
//! Spaces form a tree stored in an arena: each node has a parent, a trust
//! label, the modules registered directly into it, and a [`Restriction`].
//! Lookups walk from a node up to the root. Every restriction on that path
//! applies to every module found on it, so a child can narrow what its
//! ancestors grant but never widen it, and an ancestor's restriction also
//! covers modules registered directly into a descendant. Siblings and
//! descendants are never visited.

use std::collections::BTreeSet;
use std::fmt;

use modlink_ir::{InterfaceId, Module, ModuleName};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Index of a node in the [`SearchTree`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SpaceId(u32);

impl SpaceId {
    /// The root space every tree starts with.
    pub const ROOT: SpaceId = SpaceId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ROOT {
            write!(f, "SpaceId::ROOT")
        } else {
            write!(f, "SpaceId({})", self.0)
        }
    }
}

/// Capability filter attached to a space.
///
/// The default restriction permits everything.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Restriction {
    /// When set, only these interfaces are visible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_interfaces: Option<BTreeSet<InterfaceId>>,
    pub deny_interfaces: BTreeSet<InterfaceId>,
    pub deny_modules: BTreeSet<ModuleName>,
}

impl Restriction {
    pub fn none() -> Self {
        Restriction::default()
    }

    /// Only modules implementing one of `ids` are visible.
    pub fn allow_only<I: Into<InterfaceId>>(ids: impl IntoIterator<Item = I>) -> Self {
        Restriction {
            allow_interfaces: Some(ids.into_iter().map(Into::into).collect()),
            ..Restriction::default()
        }
    }

    #[must_use]
    pub fn deny_interface(mut self, id: impl Into<InterfaceId>) -> Self {
        self.deny_interfaces.insert(id.into());
        self
    }

    #[must_use]
    pub fn deny_module(mut self, name: impl Into<ModuleName>) -> Self {
        self.deny_modules.insert(name.into());
        self
    }

    pub fn permits(&self, interface: &InterfaceId, module: &ModuleName) -> bool {
        if let Some(allowed) = &self.allow_interfaces {
            if !allowed.contains(interface) {
                return false;
            }
        }
        !self.deny_interfaces.contains(interface) && !self.deny_modules.contains(module)
    }

    /// The restriction that permits only what both `self` and `other` permit.
    #[must_use]
    pub fn narrow(&self, other: &Restriction) -> Restriction {
        let allow_interfaces = match (&self.allow_interfaces, &other.allow_interfaces) {
            (None, None) => None,
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (Some(a), Some(b)) => Some(a.intersection(b).cloned().collect()),
        };
        Restriction {
            allow_interfaces,
            deny_interfaces: self.deny_interfaces.union(&other.deny_interfaces).cloned().collect(),
            deny_modules: self.deny_modules.union(&other.deny_modules).cloned().collect(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allow_interfaces.is_none()
            && self.deny_interfaces.is_empty()
            && self.deny_modules.is_empty()
    }
}

/// One node of the tree.
#[derive(Clone, Debug)]
pub struct SpaceNode {
    pub name: String,
    /// Informative label for audit; not enforced beyond the restriction.
    pub trust: String,
    pub parent: Option<SpaceId>,
    pub restriction: Restriction,
    modules: FxHashMap<InterfaceId, BTreeSet<ModuleName>>,
}

impl SpaceNode {
    fn new(name: String, trust: String, parent: Option<SpaceId>, restriction: Restriction) -> Self {
        SpaceNode {
            name,
            trust,
            parent,
            restriction,
            modules: FxHashMap::default(),
        }
    }

    /// Number of modules registered directly into this node.
    pub fn own_len(&self) -> usize {
        self.modules.values().map(BTreeSet::len).sum()
    }
}

/// Arena of search spaces rooted at [`SpaceId::ROOT`].
#[derive(Clone, Debug)]
pub struct SearchTree {
    nodes: Vec<SpaceNode>,
    by_name: FxHashMap<String, SpaceId>,
}

impl Default for SearchTree {
    fn default() -> Self {
        SearchTree::new("root", "trusted")
    }
}

impl SearchTree {
    /// Create a tree with an unrestricted root.
    pub fn new(root_name: impl Into<String>, trust: impl Into<String>) -> Self {
        let root_name = root_name.into();
        let mut by_name = FxHashMap::default();
        by_name.insert(root_name.clone(), SpaceId::ROOT);
        SearchTree {
            nodes: vec![SpaceNode::new(root_name, trust.into(), None, Restriction::none())],
            by_name,
        }
    }

    /// Add a child space under `parent`.
    pub fn add_space(
        &mut self,
        name: impl Into<String>,
        trust: impl Into<String>,
        parent: SpaceId,
        restriction: Restriction,
    ) -> Result<SpaceId, RegistryError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateSpace(name));
        }
        if parent.index() >= self.nodes.len() {
            return Err(RegistryError::UnknownSpace(format!("{parent:?}")));
        }
        let id = SpaceId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        tracing::trace!(space = %name, ?parent, "search space added");
        self.by_name.insert(name.clone(), id);
        self.nodes
            .push(SpaceNode::new(name, trust.into(), Some(parent), restriction));
        Ok(id)
    }

    /// Look a space up by name.
    pub fn find(&self, name: &str) -> Option<SpaceId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: SpaceId) -> Option<&SpaceNode> {
        self.nodes.get(id.index())
    }

    pub fn trust(&self, id: SpaceId) -> &str {
        self.node(id).map_or("", |node| node.trust.as_str())
    }

    /// Register a module directly into `space`.
    pub fn insert(&mut self, space: SpaceId, module: &Module) -> Result<(), RegistryError> {
        let node = self
            .nodes
            .get_mut(space.index())
            .ok_or_else(|| RegistryError::UnknownSpace(format!("{space:?}")))?;
        node.modules
            .entry(module.implements.clone())
            .or_default()
            .insert(module.name.clone());
        Ok(())
    }

    /// `space` followed by its ancestors up to the root.
    pub fn path(&self, space: SpaceId) -> Vec<SpaceId> {
        let mut path = Vec::new();
        let mut current = self.node(space).map(|_| space);
        while let Some(id) = current {
            path.push(id);
            current = self.nodes[id.index()].parent;
        }
        path
    }

    /// Conjunction of every restriction between `space` and the root.
    pub fn effective_restriction(&self, space: SpaceId) -> Restriction {
        self.path(space)
            .into_iter()
            .fold(Restriction::none(), |acc, id| {
                acc.narrow(&self.nodes[id.index()].restriction)
            })
    }

    /// Every module visible from `space`, sorted by name.
    pub fn visible(&self, space: SpaceId) -> Vec<&ModuleName> {
        let restriction = self.effective_restriction(space);
        let mut out: Vec<&ModuleName> = self
            .path(space)
            .into_iter()
            .flat_map(|id| self.nodes[id.index()].modules.iter())
            .flat_map(|(interface, names)| {
                let restriction = &restriction;
                names
                    .iter()
                    .filter(move |name| restriction.permits(interface, name))
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Visible modules implementing `interface`, sorted by name.
    pub fn candidates(&self, space: SpaceId, interface: &InterfaceId) -> Vec<&ModuleName> {
        let restriction = self.effective_restriction(space);
        let mut out: Vec<&ModuleName> = self
            .path(space)
            .into_iter()
            .filter_map(|id| self.nodes[id.index()].modules.get(interface))
            .flatten()
            .filter(|name| restriction.permits(interface, name))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Whether `module` can be seen from `space`.
    pub fn is_visible(&self, space: SpaceId, module: &Module) -> bool {
        if !self
            .effective_restriction(space)
            .permits(&module.implements, &module.name)
        {
            return false;
        }
        self.path(space).into_iter().any(|id| {
            self.nodes[id.index()]
                .modules
                .get(&module.implements)
                .is_some_and(|names| names.contains(&module.name))
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpaceId, &SpaceNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (SpaceId(u32::try_from(i).unwrap_or(u32::MAX)), node))
    }
}
