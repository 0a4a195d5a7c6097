//! Program file loading.
//!
//! A program file is the JSON the front end emits once it has parsed every
//! interface and module: the records themselves, the search-space tree and
//! the application description.
//!
//! ```json
//! {
//!   "interfaces": [{ "id": "Data.Set", "signatures": [...] }],
//!   "spaces": [{ "name": "plugins", "trust": "untrusted", "parent": "root",
//!                "restriction": { "deny_interfaces": ["Sys.Fs"] } }],
//!   "modules": [{ "name": "Set_A", "implements": "Data.Set", "space": "plugins" }],
//!   "app": { "Data.Set": { "module": "Set_A" } },
//!   "roots": ["Main"]
//! }
//! ```
//!
//! Spaces are created in file order, so a parent must be declared before
//! its children. The root space is always present and named `root`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use modlink::{
    AppDescription, CacheError, Diagnostic, LinkConfig, LinkSession, RegistryError, Restriction,
    Selector, SpaceId,
};
use modlink_ir::{Interface, InterfaceId, Module, ModuleName};
use serde::Deserialize;

/// Name of the space every program starts with.
pub const ROOT_SPACE: &str = "root";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read `{}`: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("malformed program file `{}`: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error(transparent)]
    Space(#[from] RegistryError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramFile {
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub spaces: Vec<SpaceDecl>,
    #[serde(default)]
    pub modules: Vec<ModuleDecl>,
    #[serde(default)]
    pub app: BTreeMap<InterfaceId, Selector>,
    /// Modules to link from. Absent means every registered module.
    #[serde(default)]
    pub roots: Option<Vec<ModuleName>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SpaceDecl {
    pub name: String,
    #[serde(default = "default_trust")]
    pub trust: String,
    /// Defaults to the root space.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub restriction: Restriction,
}

fn default_trust() -> String {
    "trusted".to_string()
}

/// A module plus the space it is registered into.
#[derive(Clone, Debug, Deserialize)]
pub struct ModuleDecl {
    #[serde(default)]
    pub space: Option<String>,
    #[serde(flatten)]
    pub module: Module,
}

/// A populated session plus everything registration had to say.
pub struct LoadedProgram {
    pub session: LinkSession,
    pub roots: Option<Vec<ModuleName>>,
    /// Registration diagnostics, warnings included, in file order.
    pub diagnostics: Vec<Diagnostic>,
    /// Modules excluded from every search space.
    pub rejected: Vec<ModuleName>,
}

impl LoadedProgram {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

impl ProgramFile {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Build a session from this program.
    ///
    /// A malformed space tree or an unreadable cache aborts the load. Bad
    /// interfaces and modules do not: they are reported and left out, and
    /// every other module is still registered. A malformed application
    /// description is reported and not applied.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn into_session(self, config: LinkConfig) -> Result<LoadedProgram, LoadError> {
        let mut session = LinkSession::new(config)?;
        let mut diagnostics = Vec::new();
        let mut rejected = Vec::new();

        for interface in self.interfaces {
            if let Err(e) = session.register_interface(interface) {
                diagnostics.push(e.to_diagnostic());
            }
        }

        for decl in self.spaces {
            let parent = match &decl.parent {
                Some(name) => session
                    .space(name)
                    .ok_or_else(|| RegistryError::UnknownSpace(name.clone()))?,
                None => SpaceId::ROOT,
            };
            session.add_space(decl.name, decl.trust, parent, decl.restriction)?;
        }

        for ModuleDecl { space, module } in self.modules {
            let space_name = space.as_deref().unwrap_or(ROOT_SPACE);
            let Some(space) = session.space(space_name) else {
                diagnostics.push(RegistryError::UnknownSpace(space_name.to_string()).to_diagnostic());
                rejected.push(module.name);
                continue;
            };
            let name = module.name.clone();
            match session.register_module(module, space) {
                Ok(warnings) => {
                    diagnostics.extend(warnings.iter().map(modlink::AnalysisWarning::to_diagnostic));
                }
                Err(e) => {
                    tracing::debug!(module = %name, error = %e, "module rejected");
                    diagnostics.extend(e.to_diagnostics());
                    rejected.push(name);
                }
            }
        }

        // Module selectors name registered modules, so the app goes last.
        let mut app = AppDescription::new();
        for (interface, selector) in self.app {
            app.insert(interface, selector);
        }
        if let Err(errors) = session.set_app(app) {
            diagnostics.extend(errors.iter().map(modlink::AnalysisError::to_diagnostic));
        }

        Ok(LoadedProgram {
            session,
            roots: self.roots,
            diagnostics,
            rejected,
        })
    }
}

/// Read and parse a program file.
pub fn read_program(path: &Path) -> Result<ProgramFile, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    ProgramFile::from_json(&text).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
