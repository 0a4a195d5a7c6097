//! Diagnostics for batch reporting.
//!
//! Every error the session can produce maps to a code, grouped by phase:
//! - E1xxx: registry (interfaces, modules, search spaces)
//! - E2xxx: conformance
//! - E3xxx: dependency analysis (W3xxx for warnings)
//! - E4xxx: linking
//! - E5xxx: link cache

use std::fmt;

use crate::analysis::AnalysisWarning;
use crate::error::{
    AnalysisError, CacheError, ConformanceError, ConformanceFailure, LinkError, RegisterError,
    RegistryError,
};

/// Error codes for all linker diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Registry Errors (E1xxx)
    /// Interface id registered twice
    E1001,
    /// Unknown interface
    E1002,
    /// Module name registered twice
    E1003,
    /// Unknown search space
    E1004,
    /// Search space defined twice
    E1005,

    // Conformance Errors (E2xxx)
    /// Module does not conform to its interface
    E2001,

    // Analysis Errors (E3xxx)
    /// Malformed constraint
    E3001,
    /// Exposed name not declared by the interface
    E3002,
    /// Dependency on an unknown interface
    E3003,
    /// Malformed application selector
    E3004,
    /// Constraint requires a different interface id (warning)
    W3001,

    // Link Errors (E4xxx)
    /// No module satisfies the dependency
    E4001,
    /// More than one module satisfies the dependency
    E4002,
    /// Constraint depends on its own result
    E4003,
    /// Peer dependency did not resolve
    E4004,
    /// No such dependency slot
    E4005,
    /// Unknown module
    E4006,
    /// Linking cancelled
    E4007,

    // Cache Errors (E5xxx)
    /// Pinned binding failed revalidation
    E5001,
    /// Cache I/O failure
    E5002,
    /// Cache file corrupt
    E5003,
    /// Cache file format version mismatch
    E5004,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::W3001 => "W3001",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E4005 => "E4005",
            ErrorCode::E4006 => "E4006",
            ErrorCode::E4007 => "E4007",
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E5003 => "E5003",
            ErrorCode::E5004 => "E5004",
        }
    }

    pub fn is_warning(&self) -> bool {
        self.as_str().starts_with('W')
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub notes: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            notes: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    pub fn warning(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  = help: {suggestion}")?;
        }
        Ok(())
    }
}

/// Render diagnostics one per block, followed by a summary line.
pub fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diag in diagnostics {
        out.push_str(&diag.to_string());
        out.push_str("\n\n");
    }
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let warnings = diagnostics.len() - errors;
    match (errors, warnings) {
        (0, 0) => {}
        (0, w) => out.push_str(&format!("{w} warning(s) emitted\n")),
        (e, 0) => out.push_str(&format!("{e} error(s) emitted\n")),
        (e, w) => out.push_str(&format!("{e} error(s), {w} warning(s) emitted\n")),
    }
    out
}

impl RegistryError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RegistryError::DuplicateInterfaceId(_) => ErrorCode::E1001,
            RegistryError::UnknownInterface(_) => ErrorCode::E1002,
            RegistryError::DuplicateModule(_) => ErrorCode::E1003,
            RegistryError::UnknownSpace(_) => ErrorCode::E1004,
            RegistryError::DuplicateSpace(_) => ErrorCode::E1005,
        }
    }

    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.error_code()).with_message(self.to_string())
    }
}

impl ConformanceError {
    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(ErrorCode::E2001).with_message(format!(
            "module `{}` does not conform to `{}`",
            self.module, self.interface
        ));
        for failure in &self.failures {
            diag = diag.with_note(failure.to_string());
        }
        if self
            .failures
            .iter()
            .any(|f| matches!(f, ConformanceFailure::MissingSignature { .. }))
        {
            diag = diag.with_suggestion("define every signature the interface declares");
        }
        diag.with_note("the module is excluded from every search space")
    }
}

impl AnalysisError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AnalysisError::ConstraintSyntax { .. } => ErrorCode::E3001,
            AnalysisError::UnknownExposedName { .. } => ErrorCode::E3002,
            AnalysisError::UnknownInterface { .. } => ErrorCode::E3003,
            AnalysisError::Selector { .. } => ErrorCode::E3004,
        }
    }

    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.error_code()).with_message(self.to_string())
    }
}

impl AnalysisWarning {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::warning(ErrorCode::W3001).with_message(self.to_string())
    }
}

impl RegisterError {
    /// One diagnostic per underlying problem.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            RegisterError::Registry(err) => vec![err.to_diagnostic()],
            RegisterError::Conformance(err) => vec![err.to_diagnostic()],
            RegisterError::Analysis { errors, .. } => {
                errors.iter().map(AnalysisError::to_diagnostic).collect()
            }
        }
    }
}

impl CacheError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CacheError::StalePin { .. } => ErrorCode::E5001,
            CacheError::Io { .. } => ErrorCode::E5002,
            CacheError::Corrupt { .. } => ErrorCode::E5003,
            CacheError::VersionMismatch { .. } => ErrorCode::E5004,
        }
    }

    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.error_code()).with_message(self.to_string());
        match self {
            CacheError::StalePin { key, .. } => diag
                .with_note("pinned bindings are revalidated, never silently replaced")
                .with_suggestion(format!("re-link with `--refresh={key}`")),
            CacheError::Corrupt { .. } | CacheError::VersionMismatch { .. } => {
                diag.with_suggestion("delete the cache file to start over")
            }
            CacheError::Io { .. } => diag,
        }
    }
}

impl LinkError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            LinkError::NoMatch { .. } => ErrorCode::E4001,
            LinkError::Ambiguous { .. } => ErrorCode::E4002,
            LinkError::CyclicConstraint { .. } => ErrorCode::E4003,
            LinkError::PeerUnresolved { .. } => ErrorCode::E4004,
            LinkError::UnknownSlot { .. } => ErrorCode::E4005,
            LinkError::UnknownModule(_) => ErrorCode::E4006,
            LinkError::Cancelled { .. } => ErrorCode::E4007,
            LinkError::Cache(err) => err.error_code(),
        }
    }

    #[cold]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LinkError::Cache(err) => err.to_diagnostic(),
            LinkError::NoMatch { .. } => Diagnostic::error(self.error_code())
                .with_message(self.to_string())
                .with_suggestion("relax the constraint or make a matching module visible"),
            LinkError::Ambiguous { .. } => Diagnostic::error(self.error_code())
                .with_message(self.to_string())
                .with_note("modules are never picked implicitly")
                .with_suggestion("add a constraint or narrow the search space"),
            _ => Diagnostic::error(self.error_code()).with_message(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
