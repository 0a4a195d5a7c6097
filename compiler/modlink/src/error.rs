//! Error taxonomy, one enum per phase.
//!
//! Registry and conformance errors are raised while the session is being
//! populated; analysis errors before any linking starts; link and cache
//! errors are collected per dependency and reported in batch.

use std::fmt;
use std::path::PathBuf;

use modlink_ir::{InterfaceId, ModuleName, Signature};

use crate::cache::LinkKey;

/// Interface, module and search space registration failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("interface `{0}` is already registered")]
    DuplicateInterfaceId(InterfaceId),
    #[error("unknown interface `{0}`")]
    UnknownInterface(InterfaceId),
    #[error("module `{0}` is already registered")]
    DuplicateModule(ModuleName),
    #[error("unknown search space `{0}`")]
    UnknownSpace(String),
    #[error("search space `{0}` is already defined")]
    DuplicateSpace(String),
}

/// One reason a module does not conform to its interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConformanceFailure {
    MissingSignature {
        name: String,
        expected: Signature,
    },
    ShapeMismatch {
        name: String,
        expected: Signature,
        found: Signature,
    },
}

impl ConformanceFailure {
    pub fn name(&self) -> &str {
        match self {
            ConformanceFailure::MissingSignature { name, .. }
            | ConformanceFailure::ShapeMismatch { name, .. } => name,
        }
    }
}

impl fmt::Display for ConformanceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConformanceFailure::MissingSignature { name, expected } => {
                write!(f, "missing `{name}` (expected {expected})")
            }
            ConformanceFailure::ShapeMismatch {
                name,
                expected,
                found,
            } => write!(f, "`{name}` has shape {found}, expected {expected}"),
        }
    }
}

/// A module does not cover its interface's signatures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("module `{module}` does not conform to `{interface}`: {}", join_failures(.failures))]
pub struct ConformanceError {
    pub module: ModuleName,
    pub interface: InterfaceId,
    pub failures: Vec<ConformanceFailure>,
}

fn join_failures(failures: &[ConformanceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Malformed dependency declarations, found before linking.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("malformed constraint in `{module}` dependency #{slot}: {reason}")]
    ConstraintSyntax {
        module: ModuleName,
        slot: u32,
        reason: String,
    },
    #[error("`{module}` dependency #{slot} exposes `{name}`, which `{interface}` does not declare")]
    UnknownExposedName {
        module: ModuleName,
        slot: u32,
        interface: InterfaceId,
        name: String,
    },
    #[error("`{module}` dependency #{slot} uses unknown interface `{interface}`")]
    UnknownInterface {
        module: ModuleName,
        slot: u32,
        interface: InterfaceId,
    },
    #[error("application selector for `{interface}`: {reason}")]
    Selector { interface: InterfaceId, reason: String },
}

/// Why a registration was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Conformance(#[from] ConformanceError),
    #[error("{} malformed dependency declaration(s) in `{module}`", .errors.len())]
    Analysis {
        module: ModuleName,
        errors: Vec<AnalysisError>,
    },
}

/// Why a pinned binding failed revalidation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    /// The pinned module is no longer part of the program.
    Missing,
    /// The pinned module is not visible from the consumer's search space.
    NotVisible,
    /// The pinned module no longer satisfies the dependency's constraint.
    ConstraintFailed,
    /// The application description selects a different module.
    SelectorMismatch,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaleReason::Missing => "the module no longer exists",
            StaleReason::NotVisible => "the module is no longer visible from the consumer",
            StaleReason::ConstraintFailed => "the module no longer satisfies the constraint",
            StaleReason::SelectorMismatch => "the application selects a different module",
        })
    }
}

/// Link cache failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("pin {key} -> `{module}` is stale: {reason}; refresh it to re-resolve")]
    StalePin {
        key: LinkKey,
        module: ModuleName,
        reason: StaleReason,
    },
    #[error("cache I/O error at '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },
    #[error("cache file '{}' is corrupt: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },
    #[error("cache file '{}' has format version {found}, expected {expected}", .path.display())]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// Failure to resolve one dependency.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("no module implementing `{interface}` satisfies {key}: {constraint}")]
    NoMatch {
        key: LinkKey,
        interface: InterfaceId,
        constraint: String,
    },
    #[error("{key} is ambiguous: {} modules implementing `{interface}` match ({})", .matches.len(), join_names(.matches))]
    Ambiguous {
        key: LinkKey,
        interface: InterfaceId,
        matches: Vec<ModuleName>,
    },
    #[error("constraint of {key} depends on its own result through slots {cycle:?}")]
    CyclicConstraint { key: LinkKey, cycle: Vec<u32> },
    #[error("{key} reads dependency #{peer}, which did not resolve")]
    PeerUnresolved { key: LinkKey, peer: u32 },
    #[error("{key} does not name a dependency slot")]
    UnknownSlot { key: LinkKey },
    #[error("unknown module `{0}`")]
    UnknownModule(ModuleName),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("linking {key} was cancelled")]
    Cancelled { key: LinkKey },
}

impl LinkError {
    /// The dependency this error is about, if it is about one.
    pub fn key(&self) -> Option<&LinkKey> {
        match self {
            LinkError::NoMatch { key, .. }
            | LinkError::Ambiguous { key, .. }
            | LinkError::CyclicConstraint { key, .. }
            | LinkError::PeerUnresolved { key, .. }
            | LinkError::UnknownSlot { key }
            | LinkError::Cancelled { key }
            | LinkError::Cache(CacheError::StalePin { key, .. }) => Some(key),
            LinkError::UnknownModule(_) | LinkError::Cache(_) => None,
        }
    }
}

fn join_names(names: &[ModuleName]) -> String {
    names
        .iter()
        .map(ModuleName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
