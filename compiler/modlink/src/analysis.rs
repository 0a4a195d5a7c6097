//! Static checks on a module's dependency declarations.
//!
//! Runs when the module is registered, after conformance and before any
//! linking. A module with analysis errors is rejected the same way as a
//! non-conforming one. All problems across all slots are reported.
//!
//! The application description is checked the same way once every module
//! is registered; see [`analyze_app`].

use std::collections::BTreeSet;
use std::fmt;

use modlink_ir::{CmpOp, ConstraintExpr, Dependency, InterfaceId, Module, ModuleName, Relation, Term, VarName};

use crate::app::{AppDescription, Selector};
use crate::arena::ModuleArena;
use crate::error::AnalysisError;
use crate::registry::InterfaceRegistry;

/// A dependency that is well-formed but suspicious.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisWarning {
    /// `IdEquals` names an interface other than the one depended on, so
    /// the constraint can never hold.
    UnsatisfiableId {
        module: ModuleName,
        slot: u32,
        interface: InterfaceId,
        named: InterfaceId,
    },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::UnsatisfiableId {
                module,
                slot,
                interface,
                named,
            } => write!(
                f,
                "`{module}` dependency #{slot} on `{interface}` requires id == {named}, which no candidate can satisfy"
            ),
        }
    }
}

/// Check every dependency of `module`.
///
/// Returns the warnings when there are no errors.
#[tracing::instrument(level = "debug", skip_all, fields(module = %module.name))]
pub fn analyze(
    module: &Module,
    registry: &InterfaceRegistry,
) -> Result<Vec<AnalysisWarning>, Vec<AnalysisError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let slots = module.dependencies.len();

    for (index, dependency) in module.dependencies.iter().enumerate() {
        let slot = u32::try_from(index).unwrap_or(u32::MAX);
        let mut dep = DependencyCheck {
            module: &module.name,
            slot,
            errors: &mut errors,
        };
        dep.interface(dependency, registry);
        dep.constraint(&dependency.constraint, slots);

        dependency.constraint.for_each_id(&mut |id| {
            if *id != dependency.interface {
                warnings.push(AnalysisWarning::UnsatisfiableId {
                    module: module.name.clone(),
                    slot,
                    interface: dependency.interface.clone(),
                    named: id.clone(),
                });
            }
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        tracing::debug!(count = errors.len(), "malformed dependency declarations");
        Err(errors)
    }
}

struct DependencyCheck<'a> {
    module: &'a ModuleName,
    slot: u32,
    errors: &'a mut Vec<AnalysisError>,
}

impl DependencyCheck<'_> {
    fn syntax(&mut self, reason: String) {
        self.errors.push(AnalysisError::ConstraintSyntax {
            module: self.module.clone(),
            slot: self.slot,
            reason,
        });
    }

    fn interface(&mut self, dependency: &Dependency, registry: &InterfaceRegistry) {
        let Ok(interface) = registry.lookup(&dependency.interface) else {
            self.errors.push(AnalysisError::UnknownInterface {
                module: self.module.clone(),
                slot: self.slot,
                interface: dependency.interface.clone(),
            });
            return;
        };
        for name in &dependency.exposing {
            if interface.signature(name).is_none() {
                self.errors.push(AnalysisError::UnknownExposedName {
                    module: self.module.clone(),
                    slot: self.slot,
                    interface: interface.id.clone(),
                    name: name.clone(),
                });
            }
        }
    }

    fn constraint(&mut self, expr: &ConstraintExpr, slots: usize) {
        let mut problems = constraint_problems(expr);
        for peer in expr.peer_slots() {
            if peer as usize >= slots {
                problems.push(format!(
                    "dependency #{peer} does not exist (module declares {slots})"
                ));
            }
        }
        for reason in problems {
            self.syntax(reason);
        }
    }
}

/// Check the application description against the registered interfaces
/// and modules.
///
/// A module selector must name a registered module implementing the
/// selected interface. Clauses get the same checks as a dependency
/// constraint, and may not read peers: they apply to every consumer.
#[tracing::instrument(level = "debug", skip_all)]
pub fn analyze_app(
    app: &AppDescription,
    registry: &InterfaceRegistry,
    modules: &ModuleArena,
) -> Vec<AnalysisError> {
    let mut errors = Vec::new();
    for (interface, selector) in app.iter() {
        let mut problems = Vec::new();
        if registry.lookup(interface).is_err() {
            problems.push("no such interface is registered".to_string());
        }
        match selector {
            Selector::Module(name) => match modules.module(name) {
                None => problems.push(format!("module `{name}` is not registered")),
                Some(module) if module.implements != *interface => problems.push(format!(
                    "module `{name}` implements `{}`",
                    module.implements
                )),
                Some(_) => {}
            },
            Selector::Clauses(expr) => {
                problems.extend(constraint_problems(expr));
                for peer in expr.peer_slots() {
                    problems.push(format!("clauses cannot read dependency #{peer}"));
                }
            }
        }
        errors.extend(problems.into_iter().map(|reason| AnalysisError::Selector {
            interface: interface.clone(),
            reason,
        }));
    }
    errors
}

/// Shape problems of one constraint: empty paths, variables read but never
/// bound, and ordering against literals that have no order.
fn constraint_problems(expr: &ConstraintExpr) -> Vec<String> {
    let mut bound: BTreeSet<&VarName> = BTreeSet::new();
    let mut read: Vec<&VarName> = Vec::new();
    let mut problems = Vec::new();

    expr.for_each_meta(&mut |path, bind, relation| {
        if path.is_empty() || path.iter().any(String::is_empty) {
            problems.push("empty metadata path".to_string());
        }
        bound.extend(bind);
        for_each_compare(relation, &mut |lhs, op, rhs| {
            if op == CmpOp::Eq {
                for side in [lhs, rhs] {
                    if let Term::Var(var) = side {
                        bound.insert(var);
                    }
                }
            } else {
                for side in [lhs, rhs] {
                    if let Term::Lit(value) = side {
                        if !value.is_orderable() {
                            problems.push(format!(
                                "`{op}` cannot order a {} literal ({value})",
                                value.kind_name()
                            ));
                        }
                    }
                }
            }
            read.extend(lhs.root_var());
            read.extend(rhs.root_var());
        });
    });

    let mut unbound: Vec<&VarName> = read.into_iter().filter(|v| !bound.contains(v)).collect();
    unbound.sort();
    unbound.dedup();
    for var in unbound {
        problems.push(format!("variable `{var}` is never bound"));
    }
    problems
}

fn for_each_compare<'a>(relation: &'a Relation, f: &mut impl FnMut(&'a Term, CmpOp, &'a Term)) {
    match relation {
        Relation::True => {}
        Relation::Compare { lhs, op, rhs } => f(lhs, *op, rhs),
        Relation::And(items) | Relation::Or(items) => {
            for item in items {
                for_each_compare(item, f);
            }
        }
        Relation::Not(inner) => for_each_compare(inner, f),
    }
}
