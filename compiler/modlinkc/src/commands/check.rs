//! The `check` command: registration and analysis only, no linking.

use std::path::Path;

use modlink::{Diagnostic, LinkConfig};

use crate::loader::{read_program, LoadError};

pub struct CheckOutcome {
    /// Modules that passed conformance and analysis.
    pub accepted: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckOutcome {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Check every interface and module in a program file.
///
/// The cache is never opened.
pub fn check_program(path: &Path) -> Result<CheckOutcome, LoadError> {
    let program = read_program(path)?;
    let loaded = program.into_session(LinkConfig::new())?;
    Ok(CheckOutcome {
        accepted: loaded.session.modules().len(),
        diagnostics: loaded.diagnostics,
    })
}
