//! Module linker.
//!
//! Resolves each dependency a module declares (an interface id plus a
//! constraint) to exactly one registered implementation, without running
//! any module code.
//!
//! # Architecture
//!
//! ```text
//! LinkSession (context object, one per build)
//!   ├── InterfaceRegistry     id → Interface
//!   ├── ModuleArena           name → Module + home space
//!   ├── SearchTree            trust-scoped, monotonically restricted spaces
//!   ├── AppDescription        program-wide selectors
//!   └── LinkCache             pins, staged until commit
//!
//! register_module: conformance::check → analysis::analyze → arena + space
//! Linker::resolve: peers → cache revalidation → candidates → eval → decision
//! ```
//!
//! Failures are collected per dependency and reported in batch; see
//! [`diagnostic`] for the code table.

pub mod analysis;
pub mod app;
pub mod arena;
pub mod cache;
pub mod config;
pub mod conformance;
pub mod diagnostic;
pub mod error;
pub mod eval;
pub mod linker;
pub mod registry;
pub mod session;
pub mod space;

pub use analysis::AnalysisWarning;
pub use app::{AppDescription, Selector};
pub use arena::{ModuleArena, ModuleEntry};
pub use cache::{LinkBinding, LinkCache, LinkKey, ParseLinkKeyError};
pub use config::{LinkConfig, RefreshPolicy};
pub use diagnostic::{Diagnostic, ErrorCode, Severity};
pub use error::{
    AnalysisError, CacheError, ConformanceError, ConformanceFailure, LinkError, RegisterError,
    RegistryError, StaleReason,
};
pub use eval::{evaluate, evaluate_in, evaluate_with, Bindings, EvalEnv};
pub use linker::{CancelToken, DependencyState, LinkReport, Linker, ResolvedProgram};
pub use registry::InterfaceRegistry;
pub use session::LinkSession;
pub use space::{Restriction, SearchTree, SpaceId, SpaceNode};
