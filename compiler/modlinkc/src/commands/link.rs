//! The `link` command: load, register, link, and commit pins on success.

use std::path::{Path, PathBuf};

use modlink::{Diagnostic, LinkConfig, LinkError, LinkKey, RefreshPolicy, ResolvedProgram};
use modlink_ir::ModuleName;

use crate::loader::{read_program, LoadError};

pub struct LinkOutcome {
    pub program: ResolvedProgram,
    /// Registration diagnostics first, then link failures sorted by key.
    pub diagnostics: Vec<Diagnostic>,
    /// Pins persisted by this run; zero when nothing was committed.
    pub pins_committed: usize,
    pub linked_modules: Vec<ModuleName>,
}

impl LinkOutcome {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// The resolved program, one `consumer#slot -> module` line per binding.
    pub fn program_lines(&self) -> Vec<String> {
        self.program
            .iter()
            .map(|(key, module)| format!("{key} -> {module}"))
            .collect()
    }
}

/// Parse `link` options into a config.
///
/// Accepts `--cache <path>` / `--cache=<path>`, `--pin`, `--refresh`,
/// `--refresh=<consumer>#<slot>` (repeatable) and `--jobs=<n>`.
pub fn parse_link_options(args: &[String]) -> Result<LinkConfig, String> {
    let mut config = LinkConfig::new();
    let mut refresh_all = false;
    let mut refresh_keys = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--cache" {
            let path = args.get(i + 1).ok_or("--cache needs a path")?;
            config = config.with_cache_path(PathBuf::from(path));
            i += 1;
        } else if let Some(path) = arg.strip_prefix("--cache=") {
            config = config.with_cache_path(PathBuf::from(path));
        } else if arg == "--pin" {
            config = config.with_pinning(true);
        } else if arg == "--refresh" {
            refresh_all = true;
        } else if let Some(key) = arg.strip_prefix("--refresh=") {
            let key = key
                .parse::<LinkKey>()
                .map_err(|e| e.to_string())?;
            refresh_keys.push(key);
        } else if let Some(jobs) = arg.strip_prefix("--jobs=") {
            let jobs = jobs
                .parse::<usize>()
                .map_err(|_| format!("invalid job count '{jobs}'"))?;
            config = config.with_threads(jobs);
        } else {
            return Err(format!("unknown option '{arg}'"));
        }
        i += 1;
    }

    let refresh = if refresh_all {
        RefreshPolicy::All
    } else if refresh_keys.is_empty() {
        RefreshPolicy::None
    } else {
        RefreshPolicy::Keys(refresh_keys.into_iter().collect())
    };
    Ok(config.with_refresh(refresh))
}

/// Link a program file.
///
/// Pins are committed only when registration and linking both produced no
/// errors; otherwise the session's pin changes are discarded.
#[tracing::instrument(level = "debug", skip(config), fields(path = %path.display()))]
pub fn link_program_file(path: &Path, config: LinkConfig) -> Result<LinkOutcome, LoadError> {
    let program = read_program(path)?;
    let loaded = program.into_session(config)?;
    let registration_failed = loaded.has_errors();
    let mut diagnostics = loaded.diagnostics;

    let report = loaded.session.link(loaded.roots.as_deref());
    diagnostics.extend(report.errors.iter().map(LinkError::to_diagnostic));

    let pins_committed = if registration_failed {
        loaded.session.discard();
        0
    } else {
        match loaded.session.finish(&report) {
            Ok(pins) => pins,
            Err(e) => {
                diagnostics.push(e.to_diagnostic());
                0
            }
        }
    };

    Ok(LinkOutcome {
        program: report.program,
        diagnostics,
        pins_committed,
        linked_modules: report.linked_modules,
    })
}
