//! The link session: the context object for one build.
//!
//! Owns the interface registry, the module arena, the search tree, the
//! application description and the link cache. Components borrow from it;
//! nothing is global. Dropping a session without calling
//! [`LinkSession::finish`] or [`LinkSession::commit`] leaves the persisted
//! pins exactly as they were.

use modlink_ir::{Interface, Module, ModuleName};

use crate::analysis::{analyze, analyze_app, AnalysisWarning};
use crate::app::AppDescription;
use crate::arena::ModuleArena;
use crate::cache::LinkCache;
use crate::config::LinkConfig;
use crate::conformance;
use crate::error::{AnalysisError, CacheError, RegisterError, RegistryError};
use crate::linker::{CancelToken, LinkReport, Linker};
use crate::registry::InterfaceRegistry;
use crate::space::{Restriction, SearchTree, SpaceId};

pub struct LinkSession {
    registry: InterfaceRegistry,
    modules: ModuleArena,
    spaces: SearchTree,
    app: AppDescription,
    cache: LinkCache,
    config: LinkConfig,
    cancel: CancelToken,
}

impl LinkSession {
    /// Start a session, loading persisted pins from `config.cache_path`.
    pub fn new(config: LinkConfig) -> Result<Self, CacheError> {
        let cache = match &config.cache_path {
            Some(path) => LinkCache::open(path)?,
            None => LinkCache::in_memory(),
        };
        Ok(Self::with_cache(config, cache))
    }

    /// Start a session over an already opened cache.
    pub fn with_cache(config: LinkConfig, cache: LinkCache) -> Self {
        LinkSession {
            registry: InterfaceRegistry::new(),
            modules: ModuleArena::new(),
            spaces: SearchTree::default(),
            app: AppDescription::new(),
            cache,
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn register_interface(&mut self, interface: Interface) -> Result<(), RegistryError> {
        self.registry.register(interface)
    }

    pub fn add_space(
        &mut self,
        name: impl Into<String>,
        trust: impl Into<String>,
        parent: SpaceId,
        restriction: Restriction,
    ) -> Result<SpaceId, RegistryError> {
        self.spaces.add_space(name, trust, parent, restriction)
    }

    pub fn space(&self, name: &str) -> Option<SpaceId> {
        self.spaces.find(name)
    }

    /// Check `app` and install it.
    ///
    /// Module selectors are checked against the modules registered so far,
    /// so register modules first. A rejected description is not installed.
    pub fn set_app(&mut self, app: AppDescription) -> Result<(), Vec<AnalysisError>> {
        let errors = analyze_app(&app, &self.registry, &self.modules);
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "application description rejected");
            return Err(errors);
        }
        self.app = app;
        Ok(())
    }

    /// Check a module and, if it passes, place it into `space`.
    ///
    /// Runs conformance and dependency analysis. A rejected module is never
    /// visible to the linker. The module's metadata is layered over its
    /// interface's before it is stored.
    #[tracing::instrument(level = "debug", skip_all, fields(module = %module.name))]
    pub fn register_module(
        &mut self,
        module: Module,
        space: SpaceId,
    ) -> Result<Vec<AnalysisWarning>, RegisterError> {
        if self.modules.contains(&module.name) {
            return Err(RegistryError::DuplicateModule(module.name).into());
        }
        if self.spaces.node(space).is_none() {
            return Err(RegistryError::UnknownSpace(format!("{space:?}")).into());
        }
        let interface = self.registry.lookup(&module.implements)?;
        conformance::check(&module, interface)?;
        let warnings = analyze(&module, &self.registry).map_err(|errors| {
            RegisterError::Analysis {
                module: module.name.clone(),
                errors,
            }
        })?;

        let module = module.inherit(interface);
        self.spaces.insert(space, &module)?;
        self.modules.insert(module, space)?;
        Ok(warnings)
    }

    pub fn linker(&self) -> Linker<'_> {
        Linker::new(
            &self.modules,
            &self.spaces,
            &self.app,
            &self.cache,
            &self.config,
            &self.cancel,
        )
    }

    /// Link everything reachable from `roots`, or every registered module.
    pub fn link(&self, roots: Option<&[ModuleName]>) -> LinkReport {
        let linker = self.linker();
        match roots {
            Some(roots) => linker.link_program(roots),
            None => {
                let all: Vec<ModuleName> = self.modules.names().into_iter().cloned().collect();
                linker.link_program(&all)
            }
        }
    }

    /// Persist every staged pin atomically.
    pub fn commit(&self) -> Result<usize, CacheError> {
        self.cache.commit()
    }

    /// Drop this session's pin changes.
    pub fn discard(&self) {
        self.cache.discard();
    }

    /// End the session: commit if `report` succeeded and nothing was
    /// cancelled, discard otherwise. Returns the number of persisted pins.
    pub fn finish(self, report: &LinkReport) -> Result<usize, CacheError> {
        if report.is_ok() && !self.cancel.is_cancelled() {
            self.commit()
        } else {
            tracing::debug!(errors = report.errors.len(), "link failed, discarding pins");
            self.discard();
            Ok(0)
        }
    }

    /// Token that cancels this session's linking from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    pub fn modules(&self) -> &ModuleArena {
        &self.modules
    }

    pub fn spaces(&self) -> &SearchTree {
        &self.spaces
    }

    pub fn cache(&self) -> &LinkCache {
        &self.cache
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Tear the session down, keeping only its cache.
    pub fn into_cache(self) -> LinkCache {
        self.cache
    }
}
