//! The linker: binds each dependency slot to exactly one module.
//!
//! # Resolving one dependency
//!
//! 1. Slots the constraint reads through `Peer` terms are resolved first.
//!    A cycle among them is a `CyclicConstraint`.
//! 2. An existing binding is revalidated, not re-searched, unless the
//!    refresh policy covers the key. A binding that fails revalidation is
//!    marked stale and reported; it is never silently replaced.
//! 3. Otherwise the consumer's home space yields the candidates for the
//!    dependency's interface, and the constraint filters them. Exactly one
//!    survivor is bound. Zero is `NoMatch`; more than one is `Ambiguous`.
//!    There is no tie-break.
//!
//! Resolution of a key is serialized through the cache's per-key lock and
//! memoized for the session, so concurrent requesters see one decision.
//!
//! # Linking a program
//!
//! Starting from the root modules, every dependency of the current frontier
//! is resolved in parallel. Winners not seen before form the next frontier.
//! Modules are only ever inspected for their declared shapes and metadata,
//! so mutually dependent modules link fine: the visited set stops the walk.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use modlink_ir::{ConstraintExpr, Dependency, Module, ModuleName};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::app::AppDescription;
use crate::arena::{ModuleArena, ModuleEntry};
use crate::cache::{LinkBinding, LinkCache, LinkKey};
use crate::config::LinkConfig;
use crate::error::{CacheError, LinkError, StaleReason};
use crate::eval::{evaluate_in, EvalEnv};
use crate::space::SearchTree;

/// Where a dependency is in its resolution lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyState {
    Unresolved,
    Resolving,
    Resolved(ModuleName),
    Ambiguous,
    Unsatisfied,
    /// A previous binding failed revalidation.
    Stale,
}

impl DependencyState {
    /// Whether `self → next` is a legal transition.
    pub fn can_become(&self, next: &DependencyState) -> bool {
        use DependencyState::{Ambiguous, Resolved, Resolving, Stale, Unresolved, Unsatisfied};
        matches!(
            (self, next),
            (Unresolved | Stale, Resolving)
                | (Resolving, Resolved(_) | Ambiguous | Unsatisfied)
                | (Resolved(_), Stale)
        )
    }
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyState::Unresolved => f.write_str("unresolved"),
            DependencyState::Resolving => f.write_str("resolving"),
            DependencyState::Resolved(module) => write!(f, "resolved to `{module}`"),
            DependencyState::Ambiguous => f.write_str("ambiguous"),
            DependencyState::Unsatisfied => f.write_str("unsatisfied"),
            DependencyState::Stale => f.write_str("stale"),
        }
    }
}

/// Shared flag that stops a link in progress.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dependency key → concrete module, handed to the evaluator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedProgram {
    bindings: BTreeMap<LinkKey, ModuleName>,
}

impl ResolvedProgram {
    pub fn get(&self, key: &LinkKey) -> Option<&ModuleName> {
        self.bindings.get(key)
    }

    /// Bindings of every slot of `consumer`, in slot order.
    pub fn dependencies_of<'a>(
        &'a self,
        consumer: &'a ModuleName,
    ) -> impl Iterator<Item = (u32, &'a ModuleName)> + 'a {
        self.bindings
            .iter()
            .filter(move |(key, _)| key.consumer == *consumer)
            .map(|(key, module)| (key.slot, module))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkKey, &ModuleName)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Outcome of linking a program: every binding made and every failure.
#[derive(Clone, Debug, Default)]
pub struct LinkReport {
    pub program: ResolvedProgram,
    /// Sorted by dependency key.
    pub errors: Vec<LinkError>,
    /// Modules reached from the roots, sorted.
    pub linked_modules: Vec<ModuleName>,
}

impl LinkReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolves dependencies against a populated session.
pub struct Linker<'s> {
    modules: &'s ModuleArena,
    spaces: &'s SearchTree,
    app: &'s AppDescription,
    cache: &'s LinkCache,
    config: &'s LinkConfig,
    cancel: &'s CancelToken,
    states: DashMap<LinkKey, DependencyState>,
    decisions: DashMap<LinkKey, Result<ModuleName, LinkError>>,
}

impl<'s> Linker<'s> {
    pub fn new(
        modules: &'s ModuleArena,
        spaces: &'s SearchTree,
        app: &'s AppDescription,
        cache: &'s LinkCache,
        config: &'s LinkConfig,
        cancel: &'s CancelToken,
    ) -> Self {
        Linker {
            modules,
            spaces,
            app,
            cache,
            config,
            cancel,
            states: DashMap::new(),
            decisions: DashMap::new(),
        }
    }

    /// Lifecycle state of `key` in this session.
    pub fn state(&self, key: &LinkKey) -> DependencyState {
        self.states
            .get(key)
            .map_or(DependencyState::Unresolved, |state| state.clone())
    }

    fn transition(&self, key: &LinkKey, next: DependencyState) {
        let current = self.state(key);
        if !current.can_become(&next) {
            tracing::warn!(%key, from = %current, to = %next, "unexpected dependency state transition");
        }
        tracing::trace!(%key, state = %next);
        self.states.insert(key.clone(), next);
    }

    /// Resolve one dependency slot to its module.
    pub fn resolve(&self, key: &LinkKey) -> Result<&'s Module, LinkError> {
        let name = self.resolve_name(key)?;
        self.modules
            .module(&name)
            .ok_or(LinkError::UnknownModule(name))
    }

    fn resolve_name(&self, key: &LinkKey) -> Result<ModuleName, LinkError> {
        if let Some(decided) = self.decision(key) {
            return decided;
        }
        if self.cancel.is_cancelled() {
            return Err(LinkError::Cancelled { key: key.clone() });
        }

        let (consumer, dependency) = self.slot(key)?;
        let env = match self.peers(key, consumer) {
            Ok(env) => env,
            Err(err @ LinkError::Cancelled { .. }) => return Err(err),
            Err(err) => {
                // Peer failures are decided before taking the key lock, so
                // record the outcome under it to keep one decision per key.
                let lock = self.cache.key_lock(key);
                let _guard = lock.lock();
                if let Some(decided) = self.decision(key) {
                    return decided;
                }
                self.transition(key, DependencyState::Resolving);
                self.transition(key, DependencyState::Unsatisfied);
                return self.decide(key, Err(err));
            }
        };

        let lock = self.cache.key_lock(key);
        let _guard = lock.lock();
        if let Some(decided) = self.decision(key) {
            return decided;
        }
        let outcome = self.resolve_locked(key, consumer, dependency, &env);
        self.decide(key, outcome)
    }

    fn decision(&self, key: &LinkKey) -> Option<Result<ModuleName, LinkError>> {
        self.decisions.get(key).map(|decided| decided.clone())
    }

    fn decide(
        &self,
        key: &LinkKey,
        outcome: Result<ModuleName, LinkError>,
    ) -> Result<ModuleName, LinkError> {
        // A cancelled attempt is not a decision; it may be retried.
        if !matches!(outcome, Err(LinkError::Cancelled { .. })) {
            self.decisions.insert(key.clone(), outcome.clone());
        }
        outcome
    }

    fn slot(&self, key: &LinkKey) -> Result<(&'s ModuleEntry, &'s Dependency), LinkError> {
        let consumer = self
            .modules
            .get(&key.consumer)
            .ok_or_else(|| LinkError::UnknownModule(key.consumer.clone()))?;
        let dependency = consumer
            .module
            .dependencies
            .get(key.slot as usize)
            .ok_or_else(|| LinkError::UnknownSlot { key: key.clone() })?;
        Ok((consumer, dependency))
    }

    /// Resolve the slots `key`'s constraint reads through `Peer` terms.
    fn peers(&self, key: &LinkKey, consumer: &'s ModuleEntry) -> Result<EvalEnv<'s>, LinkError> {
        let deps = &consumer.module.dependencies;
        if let Some(cycle) = peer_cycle(deps, self.app, key.slot) {
            tracing::debug!(%key, ?cycle, "cyclic constraint");
            return Err(LinkError::CyclicConstraint {
                key: key.clone(),
                cycle,
            });
        }

        let mut env = EvalEnv::new();
        for peer in peer_slots(deps, self.app, key.slot) {
            let peer_key = LinkKey::new(key.consumer.clone(), peer);
            match self.resolve(&peer_key) {
                Ok(module) => env.insert_peer(peer, module),
                Err(LinkError::Cancelled { .. }) => {
                    return Err(LinkError::Cancelled { key: key.clone() })
                }
                Err(_) => {
                    return Err(LinkError::PeerUnresolved {
                        key: key.clone(),
                        peer,
                    })
                }
            }
        }
        Ok(env)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(%key))]
    fn resolve_locked(
        &self,
        key: &LinkKey,
        consumer: &'s ModuleEntry,
        dependency: &'s Dependency,
        env: &EvalEnv<'s>,
    ) -> Result<ModuleName, LinkError> {
        let constraint = self
            .app
            .effective_constraint(&dependency.interface, &dependency.constraint);
        self.transition(key, DependencyState::Resolving);

        let previous = self.cache.get(key);
        let mut keep_pinned = false;
        if let Some(binding) = previous {
            keep_pinned = binding.pinned;
            self.transition(key, DependencyState::Resolved(binding.module.clone()));

            let refresh = self.config.refresh.covers(key);
            let verdict = self.revalidate(&binding, consumer, &constraint, env);
            match verdict {
                Ok(()) if !refresh => {
                    tracing::debug!(module = %binding.module, "binding revalidated");
                    if self.config.pin_new && !binding.pinned {
                        self.cache.pin(key);
                    }
                    return Ok(binding.module);
                }
                Ok(()) => {
                    tracing::debug!(module = %binding.module, "refresh requested");
                    self.transition(key, DependencyState::Stale);
                    self.transition(key, DependencyState::Resolving);
                }
                Err(reason) => {
                    tracing::debug!(module = %binding.module, %reason, "binding is stale");
                    self.cache.mark_stale(key);
                    self.transition(key, DependencyState::Stale);
                    if !refresh {
                        return Err(CacheError::StalePin {
                            key: key.clone(),
                            module: binding.module,
                            reason,
                        }
                        .into());
                    }
                    self.transition(key, DependencyState::Resolving);
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(LinkError::Cancelled { key: key.clone() });
        }

        let matches: Vec<&Module> = self
            .spaces
            .candidates(consumer.home, &dependency.interface)
            .into_iter()
            .filter_map(|name| self.modules.module(name))
            .filter(|module| self.app.admits(module))
            .filter(|module| evaluate_in(&constraint, module, env))
            .collect();

        match matches.as_slice() {
            [] => {
                self.transition(key, DependencyState::Unsatisfied);
                Err(LinkError::NoMatch {
                    key: key.clone(),
                    interface: dependency.interface.clone(),
                    constraint: constraint.to_string(),
                })
            }
            [winner] => {
                let pinned = keep_pinned || self.config.pin_new;
                let trust = self
                    .modules
                    .get(&winner.name)
                    .map_or("", |entry| self.spaces.trust(entry.home));
                self.cache.put(
                    LinkBinding::new(key.clone(), winner.name.clone(), winner.fingerprint())
                        .pinned(pinned)
                        .with_trust(trust),
                );
                tracing::debug!(module = %winner.name, pinned, "dependency resolved");
                self.transition(key, DependencyState::Resolved(winner.name.clone()));
                Ok(winner.name.clone())
            }
            several => {
                self.transition(key, DependencyState::Ambiguous);
                Err(LinkError::Ambiguous {
                    key: key.clone(),
                    interface: dependency.interface.clone(),
                    matches: several.iter().map(|m| m.name.clone()).collect(),
                })
            }
        }
    }

    /// Check an existing binding without searching.
    fn revalidate(
        &self,
        binding: &LinkBinding,
        consumer: &ModuleEntry,
        constraint: &ConstraintExpr,
        env: &EvalEnv<'_>,
    ) -> Result<(), StaleReason> {
        let Some(module) = self.modules.module(&binding.module) else {
            return Err(StaleReason::Missing);
        };
        if !self.spaces.is_visible(consumer.home, module) {
            return Err(StaleReason::NotVisible);
        }
        if !self.app.admits(module) {
            return Err(StaleReason::SelectorMismatch);
        }
        if !evaluate_in(constraint, module, env) {
            return Err(StaleReason::ConstraintFailed);
        }
        Ok(())
    }

    /// Link every dependency reachable from `roots`.
    #[tracing::instrument(level = "debug", skip_all, fields(roots = roots.len()))]
    pub fn link_program(&self, roots: &[ModuleName]) -> LinkReport {
        let threads = self.config.effective_threads();
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_scoped(rayon::ThreadBuilder::run, |pool| {
                pool.install(|| self.walk(roots, true))
            })
            .unwrap_or_else(|e| {
                tracing::warn!("failed to create thread pool ({e}), linking sequentially");
                self.walk(roots, false)
            })
    }

    fn walk(&self, roots: &[ModuleName], parallel: bool) -> LinkReport {
        let mut report = LinkReport::default();
        let mut bindings = BTreeMap::new();
        let mut visited: FxHashSet<ModuleName> = FxHashSet::default();

        let mut frontier: Vec<ModuleName> = Vec::new();
        for root in roots {
            if !self.modules.contains(root) {
                report.errors.push(LinkError::UnknownModule(root.clone()));
            } else if visited.insert(root.clone()) {
                frontier.push(root.clone());
            }
        }
        frontier.sort();

        let mut level = 0usize;
        while !frontier.is_empty() {
            let keys: Vec<LinkKey> = frontier
                .iter()
                .filter_map(|name| self.modules.module(name))
                .flat_map(|module| {
                    (0..module.dependencies.len()).map(move |slot| {
                        LinkKey::new(module.name.clone(), u32::try_from(slot).unwrap_or(u32::MAX))
                    })
                })
                .collect();
            tracing::debug!(level, modules = frontier.len(), dependencies = keys.len(), "linking level");

            let outcomes: Vec<(LinkKey, Result<ModuleName, LinkError>)> = if parallel {
                keys.into_par_iter()
                    .map(|key| {
                        let outcome = self.resolve_name(&key);
                        (key, outcome)
                    })
                    .collect()
            } else {
                keys.into_iter()
                    .map(|key| {
                        let outcome = self.resolve_name(&key);
                        (key, outcome)
                    })
                    .collect()
            };

            let mut next = BTreeSet::new();
            for (key, outcome) in outcomes {
                match outcome {
                    Ok(module) => {
                        if visited.insert(module.clone()) {
                            next.insert(module.clone());
                        }
                        bindings.insert(key, module);
                    }
                    Err(err) => report.errors.push(err),
                }
            }
            frontier = next.into_iter().collect();
            level += 1;
        }

        report.errors.sort_by_key(|e| e.key().cloned());
        report.program = ResolvedProgram { bindings };
        let mut linked: Vec<ModuleName> = visited.into_iter().collect();
        linked.sort();
        report.linked_modules = linked;
        tracing::debug!(
            bindings = report.program.len(),
            errors = report.errors.len(),
            "program linked"
        );
        report
    }
}

/// Peer slots read by slot `slot`'s effective constraint.
fn peer_slots(deps: &[Dependency], app: &AppDescription, slot: u32) -> BTreeSet<u32> {
    deps.get(slot as usize).map_or_else(BTreeSet::new, |dep| {
        app.effective_constraint(&dep.interface, &dep.constraint)
            .peer_slots()
            .into_iter()
            .filter(|peer| (*peer as usize) < deps.len())
            .collect()
    })
}

/// A path of peer reads from `start` back to itself, if there is one.
fn peer_cycle(deps: &[Dependency], app: &AppDescription, start: u32) -> Option<Vec<u32>> {
    fn visit(
        deps: &[Dependency],
        app: &AppDescription,
        start: u32,
        at: u32,
        path: &mut Vec<u32>,
        seen: &mut BTreeSet<u32>,
    ) -> bool {
        for peer in peer_slots(deps, app, at) {
            if peer == start {
                path.push(peer);
                return true;
            }
            if seen.insert(peer) {
                path.push(peer);
                if visit(deps, app, start, peer, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    let mut path = vec![start];
    let mut seen = BTreeSet::new();
    visit(deps, app, start, start, &mut path, &mut seen).then_some(path)
}

#[cfg(test)]
mod tests;
