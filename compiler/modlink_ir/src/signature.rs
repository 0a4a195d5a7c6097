//! Structural signatures and module definitions.
//!
//! Signatures are shape descriptors used for conformance and `Has` checks,
//! not for type equality. Two signatures are structurally equal when their
//! name, kind, and arity (or variant list, or key set) agree. The `shape`
//! text is carried along for display only; higher-order type contracts are
//! opaque here.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant of a [`Signature`], used in mismatch reports.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SignatureKind {
    Define,
    Function,
    Union,
    Record,
    Type,
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignatureKind::Define => "define",
            SignatureKind::Function => "function",
            SignatureKind::Union => "union",
            SignatureKind::Record => "record",
            SignatureKind::Type => "type",
        })
    }
}

/// A declared shape.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signature {
    Define {
        name: String,
        #[serde(default)]
        shape: String,
    },
    Function {
        name: String,
        arity: u32,
        #[serde(default)]
        shape: String,
    },
    Union {
        name: String,
        /// `(variant-name, arity)` in declaration order.
        variants: Vec<(String, u32)>,
    },
    Record {
        name: String,
        keys: BTreeSet<String>,
    },
    Type {
        name: String,
        #[serde(default)]
        shape: String,
    },
}

impl Signature {
    /// `Function(name, arity)` with an opaque shape.
    pub fn function(name: impl Into<String>, arity: u32) -> Self {
        Signature::Function {
            name: name.into(),
            arity,
            shape: String::new(),
        }
    }

    /// `Define(name)` with an opaque shape.
    pub fn define(name: impl Into<String>) -> Self {
        Signature::Define {
            name: name.into(),
            shape: String::new(),
        }
    }

    /// `Type(name)` with an opaque shape.
    pub fn type_(name: impl Into<String>) -> Self {
        Signature::Type {
            name: name.into(),
            shape: String::new(),
        }
    }

    pub fn union<N: Into<String>>(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = (N, u32)>,
    ) -> Self {
        Signature::Union {
            name: name.into(),
            variants: variants.into_iter().map(|(n, a)| (n.into(), a)).collect(),
        }
    }

    pub fn record<K: Into<String>>(
        name: impl Into<String>,
        keys: impl IntoIterator<Item = K>,
    ) -> Self {
        Signature::Record {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Signature::Define { name, .. }
            | Signature::Function { name, .. }
            | Signature::Union { name, .. }
            | Signature::Record { name, .. }
            | Signature::Type { name, .. } => name,
        }
    }

    pub fn kind(&self) -> SignatureKind {
        match self {
            Signature::Define { .. } => SignatureKind::Define,
            Signature::Function { .. } => SignatureKind::Function,
            Signature::Union { .. } => SignatureKind::Union,
            Signature::Record { .. } => SignatureKind::Record,
            Signature::Type { .. } => SignatureKind::Type,
        }
    }

    /// Structural equality: name, kind, and arity / variants / keys.
    ///
    /// The opaque `shape` text is ignored.
    pub fn structurally_eq(&self, other: &Signature) -> bool {
        if self.name() != other.name() {
            return false;
        }
        match (self, other) {
            (Signature::Define { .. }, Signature::Define { .. })
            | (Signature::Type { .. }, Signature::Type { .. }) => true,
            (Signature::Function { arity: a, .. }, Signature::Function { arity: b, .. }) => a == b,
            (Signature::Union { variants: a, .. }, Signature::Union { variants: b, .. }) => a == b,
            (Signature::Record { keys: a, .. }, Signature::Record { keys: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Compact structural description, e.g. `function has/2`.
    pub fn describe(&self) -> String {
        match self {
            Signature::Define { name, .. } | Signature::Type { name, .. } => {
                format!("{} {name}", self.kind())
            }
            Signature::Function { name, arity, .. } => format!("function {name}/{arity}"),
            Signature::Union { name, variants } => {
                let parts: Vec<String> = variants.iter().map(|(v, a)| format!("{v}/{a}")).collect();
                format!("union {name} [{}]", parts.join(" | "))
            }
            Signature::Record { name, keys } => {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                format!("record {name} {{{}}}", keys.join(", "))
            }
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.describe())
    }
}

/// A module definition: a signature plus a late-bound body.
///
/// The body is kept as opaque source and is never evaluated during
/// registration or linking; only the evaluator forces it, on first use.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Definition {
    pub signature: Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Definition {
    /// A definition with no recorded body.
    pub fn declared(signature: Signature) -> Self {
        Definition {
            signature,
            body: None,
        }
    }

    pub fn name(&self) -> &str {
        self.signature.name()
    }
}

#[cfg(test)]
mod tests;
