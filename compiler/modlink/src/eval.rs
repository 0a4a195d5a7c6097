//! Constraint evaluation.
//!
//! Evaluates a [`ConstraintExpr`] against one candidate module. Variables
//! captured by `Meta` leaves and `=` comparisons are solved with a
//! substitution map scoped to a single evaluation; there is no general logic
//! engine behind it. Evaluation is a pure function of the constraint, the
//! candidate's metadata and definitions, and the peer modules in the
//! [`EvalEnv`].
//!
//! # Solving
//!
//! Each goal produces either a list of partial solutions or `Blocked` if it
//! reads a variable that is not bound yet. A partial solution is a
//! substitution plus the goals still waiting on it. Conjunctions keep every
//! goal in one pending list and solve whichever can make progress, so a goal
//! blocked inside one `OR` branch waits for bindings made by any later
//! conjunct. A goal is treated as false only once every goal left pending
//! with it is blocked too, which makes the result independent of conjunct
//! order. `NOT` is negation as failure and waits until its operand can be
//! decided without binding anything new; bindings made inside never escape.
//! Every step replaces a goal by strictly smaller ones, so solving always
//! terminates.

use std::collections::BTreeMap;

use modlink_ir::{CmpOp, ConstraintExpr, Module, Relation, Term, Value, VarName};
use rustc_hash::FxHashMap;

/// Variable substitution produced by a successful evaluation.
pub type Bindings = BTreeMap<VarName, Value>;

/// Modules already bound to other dependency slots of the same consumer,
/// readable through `Peer` terms.
#[derive(Default, Debug)]
pub struct EvalEnv<'a> {
    peers: FxHashMap<u32, &'a Module>,
}

impl<'a> EvalEnv<'a> {
    pub fn new() -> Self {
        EvalEnv::default()
    }

    #[must_use]
    pub fn with_peer(mut self, slot: u32, module: &'a Module) -> Self {
        self.peers.insert(slot, module);
        self
    }

    pub fn insert_peer(&mut self, slot: u32, module: &'a Module) {
        self.peers.insert(slot, module);
    }

    fn peer(&self, slot: u32) -> Option<&'a Module> {
        self.peers.get(&slot).copied()
    }
}

/// Does `module` satisfy `expr`? No peer slots are available.
pub fn evaluate(expr: &ConstraintExpr, module: &Module) -> bool {
    evaluate_in(expr, module, &EvalEnv::default())
}

/// Does `module` satisfy `expr` given the peer modules in `env`?
pub fn evaluate_in(expr: &ConstraintExpr, module: &Module, env: &EvalEnv<'_>) -> bool {
    evaluate_with(expr, module, env, Bindings::new()).is_some()
}

/// Evaluate starting from `bindings`; returns the first solution's full
/// substitution, or `None` if the constraint does not hold.
pub fn evaluate_with(
    expr: &ConstraintExpr,
    module: &Module,
    env: &EvalEnv<'_>,
    bindings: Bindings,
) -> Option<Bindings> {
    solutions(expr, module, env, bindings).into_iter().next()
}

/// Every substitution under which `module` satisfies `expr`.
pub fn solutions(
    expr: &ConstraintExpr,
    module: &Module,
    env: &EvalEnv<'_>,
    bindings: Bindings,
) -> Vec<Bindings> {
    let solver = Solver { module, env };
    let mut out = Vec::new();
    if let Step::Solved(found) = solver.conjoin(vec![Goal::Constraint(expr)], bindings) {
        // Goals still delayed at the top level never got their variables.
        for partial in found {
            if partial.delayed.is_empty() && !out.contains(&partial.bindings) {
                out.push(partial.bindings);
            }
        }
    }
    out
}

#[derive(Clone, Copy)]
enum Goal<'e> {
    Constraint(&'e ConstraintExpr),
    /// A relation applied to the value its `Meta` leaf projected.
    Relation(&'e Relation, &'e Value),
}

/// A substitution together with the goals that were blocked under it.
struct Partial<'e> {
    bindings: Bindings,
    delayed: Vec<Goal<'e>>,
}

impl<'e> Partial<'e> {
    fn done(bindings: Bindings) -> Self {
        Partial {
            bindings,
            delayed: Vec::new(),
        }
    }

    fn waiting(bindings: Bindings, delayed: Vec<Goal<'e>>) -> Self {
        Partial { bindings, delayed }
    }
}

enum Step<'e> {
    Solved(Vec<Partial<'e>>),
    Blocked,
}

impl Step<'_> {
    fn holds(holds: bool, bindings: &Bindings) -> Self {
        if holds {
            Step::Solved(vec![Partial::done(bindings.clone())])
        } else {
            Step::Solved(Vec::new())
        }
    }
}

/// Operand after substitution.
enum Operand<'v> {
    Ground(Value),
    /// A bare variable with no binding yet; `=` can bind it.
    Unbound(&'v VarName),
    /// Depends on an unbound variable in a position that cannot bind it.
    Stuck,
    /// A projection that does not exist; comparisons against it fail.
    Absent,
}

#[derive(Clone, Copy)]
struct Solver<'e> {
    module: &'e Module,
    env: &'e EvalEnv<'e>,
}

impl<'e> Solver<'e> {
    /// Solve `pending` in any order that makes progress.
    ///
    /// `Blocked` means no pending goal can move under `bindings`. When a
    /// goal does move, each resulting branch continues with the rest; a
    /// branch that then blocks is kept as a partial solution so an
    /// enclosing conjunction can still bind what it waits on.
    fn conjoin(&self, pending: Vec<Goal<'e>>, bindings: Bindings) -> Step<'e> {
        if pending.is_empty() {
            return Step::Solved(vec![Partial::done(bindings)]);
        }
        for (i, goal) in pending.iter().enumerate() {
            let Step::Solved(found) = self.goal(*goal, &bindings) else {
                continue;
            };
            let mut rest = pending.clone();
            rest.remove(i);
            let mut out = Vec::new();
            for partial in found {
                let mut next = rest.clone();
                next.extend(partial.delayed);
                match self.conjoin(next.clone(), partial.bindings.clone()) {
                    Step::Solved(more) => out.extend(more),
                    Step::Blocked => out.push(Partial::waiting(partial.bindings, next)),
                }
            }
            return Step::Solved(out);
        }
        Step::Blocked
    }

    fn goal(&self, goal: Goal<'e>, bindings: &Bindings) -> Step<'e> {
        match goal {
            Goal::Constraint(expr) => self.constraint(expr, bindings),
            Goal::Relation(relation, it) => self.relation(relation, it, bindings),
        }
    }

    fn constraint(&self, expr: &'e ConstraintExpr, bindings: &Bindings) -> Step<'e> {
        match expr {
            ConstraintExpr::True => Step::holds(true, bindings),
            ConstraintExpr::IdEquals(id) => Step::holds(self.module.implements == *id, bindings),
            ConstraintExpr::Has(signature) => {
                Step::holds(self.module.has_signature(signature), bindings)
            }
            ConstraintExpr::Meta {
                path,
                bind,
                relation,
            } => {
                let Some(value) = self.module.metadata.project(path) else {
                    return Step::Solved(Vec::new());
                };
                let mut bound = bindings.clone();
                if let Some(var) = bind {
                    if !unify_var(&mut bound, var, value) {
                        return Step::Solved(Vec::new());
                    }
                }
                match self.relation(relation, value, &bound) {
                    // The capture is progress on its own; the relation waits.
                    Step::Blocked if bound.len() > bindings.len() => Step::Solved(vec![
                        Partial::waiting(bound, vec![Goal::Relation(relation, value)]),
                    ]),
                    step => step,
                }
            }
            ConstraintExpr::And(items) => Step::Solved(vec![Partial::waiting(
                bindings.clone(),
                items.iter().map(Goal::Constraint).collect(),
            )]),
            ConstraintExpr::Or(items) => {
                self.disjunction(items.iter().map(Goal::Constraint), bindings)
            }
            ConstraintExpr::Not(inner) => self.negation(Goal::Constraint(inner), bindings),
        }
    }

    fn relation(&self, relation: &'e Relation, it: &'e Value, bindings: &Bindings) -> Step<'e> {
        match relation {
            Relation::True => Step::holds(true, bindings),
            Relation::Compare { lhs, op, rhs } => self.compare(lhs, *op, rhs, it, bindings),
            Relation::And(items) => Step::Solved(vec![Partial::waiting(
                bindings.clone(),
                items.iter().map(|item| Goal::Relation(item, it)).collect(),
            )]),
            Relation::Or(items) => {
                self.disjunction(items.iter().map(|item| Goal::Relation(item, it)), bindings)
            }
            Relation::Not(inner) => self.negation(Goal::Relation(inner, it), bindings),
        }
    }

    fn compare(
        &self,
        lhs: &Term,
        op: CmpOp,
        rhs: &Term,
        it: &Value,
        bindings: &Bindings,
    ) -> Step<'e> {
        let lhs = self.operand(lhs, it, bindings);
        let rhs = self.operand(rhs, it, bindings);
        match (lhs, rhs) {
            (Operand::Absent, _) | (_, Operand::Absent) => Step::Solved(Vec::new()),
            (Operand::Ground(a), Operand::Ground(b)) => {
                Step::holds(compare_values(&a, op, &b), bindings)
            }
            (Operand::Unbound(var), Operand::Ground(value))
            | (Operand::Ground(value), Operand::Unbound(var))
                if op == CmpOp::Eq =>
            {
                let mut bindings = bindings.clone();
                bindings.insert(var.clone(), value);
                Step::Solved(vec![Partial::done(bindings)])
            }
            (Operand::Unbound(a), Operand::Unbound(b)) if op == CmpOp::Eq && a == b => {
                Step::holds(true, bindings)
            }
            _ => Step::Blocked,
        }
    }

    fn operand<'t>(&self, term: &'t Term, it: &Value, bindings: &Bindings) -> Operand<'t> {
        match term {
            Term::It => Operand::Ground(it.clone()),
            Term::Lit(value) => Operand::Ground(value.clone()),
            Term::Var(name) => match bindings.get(name) {
                Some(value) => Operand::Ground(value.clone()),
                None => Operand::Unbound(name),
            },
            Term::Field { base, field } => match self.operand(base, it, bindings) {
                Operand::Ground(value) => match value.field(field) {
                    Some(inner) => Operand::Ground(inner.clone()),
                    None => Operand::Absent,
                },
                Operand::Unbound(_) | Operand::Stuck => Operand::Stuck,
                Operand::Absent => Operand::Absent,
            },
            Term::Peer { slot, path } => {
                match self.env.peer(*slot).and_then(|m| m.metadata.project(path)) {
                    Some(value) => Operand::Ground(value.clone()),
                    None => Operand::Absent,
                }
            }
        }
    }

    /// Every branch's solutions. A blocked branch is kept as a partial
    /// waiting on itself; only when all branches block is the whole `OR`
    /// blocked.
    fn disjunction(
        &self,
        branches: impl Iterator<Item = Goal<'e>>,
        bindings: &Bindings,
    ) -> Step<'e> {
        let mut out = Vec::new();
        let mut progressed = false;
        let mut waiting = Vec::new();
        for branch in branches {
            match self.conjoin(vec![branch], bindings.clone()) {
                Step::Solved(found) => {
                    progressed = true;
                    out.extend(found);
                }
                Step::Blocked => waiting.push(Partial::waiting(bindings.clone(), vec![branch])),
            }
        }
        if !progressed && !waiting.is_empty() {
            return Step::Blocked;
        }
        out.extend(waiting);
        Step::Solved(out)
    }

    /// Negation as failure, decided only once the operand needs no new
    /// bindings and leaves nothing delayed.
    fn negation(&self, inner: Goal<'e>, bindings: &Bindings) -> Step<'e> {
        match self.conjoin(vec![inner], bindings.clone()) {
            Step::Solved(found) => {
                let undecided = found
                    .iter()
                    .any(|p| !p.delayed.is_empty() || p.bindings.len() > bindings.len());
                if undecided {
                    Step::Blocked
                } else {
                    Step::holds(found.is_empty(), bindings)
                }
            }
            Step::Blocked => Step::Blocked,
        }
    }
}

/// Bind `var` to `value`, or check it agrees with an existing binding.
fn unify_var(bindings: &mut Bindings, var: &VarName, value: &Value) -> bool {
    match bindings.get(var) {
        Some(bound) => bound == value,
        None => {
            bindings.insert(var.clone(), value.clone());
            true
        }
    }
}

fn compare_values(a: &Value, op: CmpOp, b: &Value) -> bool {
    use std::cmp::Ordering;
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Gt => a.compare(b) == Some(Ordering::Greater),
        CmpOp::Lt => a.compare(b) == Some(Ordering::Less),
    }
}

#[cfg(test)]
mod tests;
