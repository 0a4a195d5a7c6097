//! The constraint language.
//!
//! A dependency names an interface and a boolean [`ConstraintExpr`] that a
//! candidate implementation must satisfy. `Meta` leaves project a metadata
//! path and test it with a [`Relation`], a small comparison language over
//! [`Term`]s that may capture variables. There are no user-defined
//! predicates and no recursion, so every expression is a finite tree.
//!
//! ```text
//! Data.Set && meta(Author: it = "Quil")
//! Data.Set && meta(version as v: v.major = 2 && v.minor > 0)
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{InterfaceId, Signature, Value, VarName};

/// A metadata projection path: an annotation name followed by record fields.
pub type MetaPath = Vec<String>;

/// Comparison operator.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Gt,
    Lt,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
        })
    }
}

/// An operand of a comparison.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// The value projected by the enclosing `Meta` leaf.
    It,
    Lit(Value),
    Var(VarName),
    /// Record field projection (`r.label`).
    Field { base: Box<Term>, field: String },
    /// Metadata of the module bound to another dependency slot of the same
    /// consumer.
    Peer { slot: u32, path: MetaPath },
}

impl Term {
    pub fn it() -> Self {
        Term::It
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Term::Lit(value.into())
    }

    pub fn var(name: impl Into<VarName>) -> Self {
        Term::Var(name.into())
    }

    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        Term::Field {
            base: Box::new(self),
            field: name.into(),
        }
    }

    pub fn peer<S: Into<String>>(slot: u32, path: impl IntoIterator<Item = S>) -> Self {
        Term::Peer {
            slot,
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// The variable at the root of a field chain, if any.
    pub fn root_var(&self) -> Option<&VarName> {
        match self {
            Term::Var(v) => Some(v),
            Term::Field { base, .. } => base.root_var(),
            Term::It | Term::Lit(_) | Term::Peer { .. } => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::It => f.write_str("it"),
            Term::Lit(value) => write!(f, "{value}"),
            Term::Var(name) => write!(f, "{name}"),
            Term::Field { base, field } => write!(f, "{base}.{field}"),
            Term::Peer { slot, path } => write!(f, "@{slot}.{}", path.join(".")),
        }
    }
}

/// A boolean relation over terms, evaluated against one projected value.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Holds for any projected value; a bare `Meta` leaf only tests presence.
    #[default]
    True,
    Compare { lhs: Term, op: CmpOp, rhs: Term },
    And(Vec<Relation>),
    Or(Vec<Relation>),
    Not(Box<Relation>),
}

impl Relation {
    pub fn compare(lhs: Term, op: CmpOp, rhs: Term) -> Self {
        Relation::Compare { lhs, op, rhs }
    }

    pub fn eq(lhs: Term, rhs: Term) -> Self {
        Relation::compare(lhs, CmpOp::Eq, rhs)
    }

    pub fn gt(lhs: Term, rhs: Term) -> Self {
        Relation::compare(lhs, CmpOp::Gt, rhs)
    }

    pub fn lt(lhs: Term, rhs: Term) -> Self {
        Relation::compare(lhs, CmpOp::Lt, rhs)
    }

    /// `it = value`, the common shorthand form.
    pub fn is(value: impl Into<Value>) -> Self {
        Relation::eq(Term::It, Term::lit(value))
    }

    pub fn and(items: impl IntoIterator<Item = Relation>) -> Self {
        Relation::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = Relation>) -> Self {
        Relation::Or(items.into_iter().collect())
    }

    pub fn negate(inner: Relation) -> Self {
        Relation::Not(Box::new(inner))
    }

    /// Visit every term in the relation.
    pub fn for_each_term<'a>(&'a self, f: &mut impl FnMut(&'a Term)) {
        match self {
            Relation::True => {}
            Relation::Compare { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            Relation::And(items) | Relation::Or(items) => {
                for item in items {
                    item.for_each_term(f);
                }
            }
            Relation::Not(inner) => inner.for_each_term(f),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::True => f.write_str("true"),
            Relation::Compare { lhs, op, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Relation::And(items) => write_joined(f, items, " && "),
            Relation::Or(items) => write_joined(f, items, " || "),
            Relation::Not(inner) => write!(f, "!({inner})"),
        }
    }
}

/// A constraint over a candidate module.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintExpr {
    #[default]
    True,
    IdEquals(InterfaceId),
    Has(Signature),
    Meta {
        path: MetaPath,
        /// Capture the projected value into this variable.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bind: Option<VarName>,
        #[serde(default)]
        relation: Relation,
    },
    And(Vec<ConstraintExpr>),
    Or(Vec<ConstraintExpr>),
    Not(Box<ConstraintExpr>),
}

impl ConstraintExpr {
    pub fn id_equals(id: impl Into<InterfaceId>) -> Self {
        ConstraintExpr::IdEquals(id.into())
    }

    pub fn has(signature: Signature) -> Self {
        ConstraintExpr::Has(signature)
    }

    pub fn meta<S: Into<String>>(path: impl IntoIterator<Item = S>, relation: Relation) -> Self {
        ConstraintExpr::Meta {
            path: path.into_iter().map(Into::into).collect(),
            bind: None,
            relation,
        }
    }

    /// `Meta` leaf that also captures the projected value.
    pub fn meta_as<S: Into<String>>(
        path: impl IntoIterator<Item = S>,
        var: impl Into<VarName>,
        relation: Relation,
    ) -> Self {
        ConstraintExpr::Meta {
            path: path.into_iter().map(Into::into).collect(),
            bind: Some(var.into()),
            relation,
        }
    }

    pub fn and(items: impl IntoIterator<Item = ConstraintExpr>) -> Self {
        ConstraintExpr::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = ConstraintExpr>) -> Self {
        ConstraintExpr::Or(items.into_iter().collect())
    }

    pub fn negate(inner: ConstraintExpr) -> Self {
        ConstraintExpr::Not(Box::new(inner))
    }

    /// AND another constraint onto this one, flattening nested conjunctions
    /// and dropping `True`.
    #[must_use]
    pub fn conjoin(self, other: ConstraintExpr) -> Self {
        match (self, other) {
            (ConstraintExpr::True, rhs) => rhs,
            (lhs, ConstraintExpr::True) => lhs,
            (ConstraintExpr::And(mut items), ConstraintExpr::And(more)) => {
                items.extend(more);
                ConstraintExpr::And(items)
            }
            (ConstraintExpr::And(mut items), rhs) => {
                items.push(rhs);
                ConstraintExpr::And(items)
            }
            (lhs, ConstraintExpr::And(mut items)) => {
                items.insert(0, lhs);
                ConstraintExpr::And(items)
            }
            (lhs, rhs) => ConstraintExpr::And(vec![lhs, rhs]),
        }
    }

    /// Visit every `Meta` leaf as `(path, bind, relation)`.
    pub fn for_each_meta<'a>(
        &'a self,
        f: &mut impl FnMut(&'a MetaPath, Option<&'a VarName>, &'a Relation),
    ) {
        match self {
            ConstraintExpr::True | ConstraintExpr::IdEquals(_) | ConstraintExpr::Has(_) => {}
            ConstraintExpr::Meta {
                path,
                bind,
                relation,
            } => f(path, bind.as_ref(), relation),
            ConstraintExpr::And(items) | ConstraintExpr::Or(items) => {
                for item in items {
                    item.for_each_meta(f);
                }
            }
            ConstraintExpr::Not(inner) => inner.for_each_meta(f),
        }
    }

    /// Visit every `IdEquals` leaf.
    pub fn for_each_id<'a>(&'a self, f: &mut impl FnMut(&'a InterfaceId)) {
        match self {
            ConstraintExpr::IdEquals(id) => f(id),
            ConstraintExpr::And(items) | ConstraintExpr::Or(items) => {
                for item in items {
                    item.for_each_id(f);
                }
            }
            ConstraintExpr::Not(inner) => inner.for_each_id(f),
            ConstraintExpr::True | ConstraintExpr::Has(_) | ConstraintExpr::Meta { .. } => {}
        }
    }

    /// Dependency slots read through `Peer` terms.
    pub fn peer_slots(&self) -> BTreeSet<u32> {
        let mut slots = BTreeSet::new();
        self.for_each_meta(&mut |_, _, relation| {
            relation.for_each_term(&mut |term| collect_peer_slots(term, &mut slots));
        });
        slots
    }
}

fn collect_peer_slots(term: &Term, slots: &mut BTreeSet<u32>) {
    match term {
        Term::Peer { slot, .. } => {
            slots.insert(*slot);
        }
        Term::Field { base, .. } => collect_peer_slots(base, slots),
        Term::It | Term::Lit(_) | Term::Var(_) => {}
    }
}

impl fmt::Display for ConstraintExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintExpr::True => f.write_str("true"),
            ConstraintExpr::IdEquals(id) => write!(f, "id == {id}"),
            ConstraintExpr::Has(signature) => write!(f, "has({signature})"),
            ConstraintExpr::Meta {
                path,
                bind,
                relation,
            } => {
                write!(f, "meta({}", path.join("."))?;
                if let Some(var) = bind {
                    write!(f, " as {var}")?;
                }
                write!(f, ": {relation})")
            }
            ConstraintExpr::And(items) => write_joined(f, items, " && "),
            ConstraintExpr::Or(items) => write_joined(f, items, " || "),
            ConstraintExpr::Not(inner) => write!(f, "!({inner})"),
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    if items.is_empty() {
        return f.write_str(if sep == " && " { "true" } else { "false" });
    }
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}
