//! Data model for the module linker.
//!
//! Everything the linker inspects is declared here: identifiers, structured
//! metadata values, signatures, interfaces, modules, dependencies, and the
//! constraint language used to pick an implementation for a dependency.
//!
//! # Architecture
//!
//! ```text
//! Interface { id, metadata, signatures }
//!     ▲ implements
//! Module { name, implements, metadata, definitions, dependencies }
//!                                                   │
//!                                                   ▼
//!                              Dependency { interface, exposing, constraint }
//!                                                   │
//!                                                   ▼
//!                    ConstraintExpr ─► Relation ─► Term ─► Value
//! ```
//!
//! All types are plain data: created once per build session by the loader
//! and immutable afterwards. Module bodies are opaque and never evaluated
//! here; the linker only ever looks at declared shapes and metadata.

mod constraint;
mod hash;
mod ident;
mod module;
mod signature;
mod value;

pub use constraint::{CmpOp, ConstraintExpr, MetaPath, Relation, Term};
pub use hash::ContentHash;
pub use ident::{InterfaceId, ModuleName, VarName};
pub use module::{Dependency, Interface, Module};
pub use signature::{Definition, Signature, SignatureKind};
pub use value::{Metadata, Value};
