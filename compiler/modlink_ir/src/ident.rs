//! String identifiers used across the linker.
//!
//! Identifiers are compared and ordered by their text. Ordering matters:
//! every candidate list the linker reports is sorted by these identifiers so
//! results never depend on registration order.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from its text.
            pub fn new(text: impl Into<String>) -> Self {
                $name(text.into())
            }

            /// The identifier text.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self {
                $name(text.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(text: String) -> Self {
                $name(text)
            }
        }
    };
}

string_id! {
    /// Globally unique interface identifier (e.g. `Data.Set`).
    ///
    /// At most one interface per id exists in a program.
    InterfaceId
}

string_id! {
    /// Stable identity of a module implementation.
    ///
    /// Modules are anonymous in source; the loader names them after their
    /// source path. Link cache keys are derived from this name, so it must
    /// be stable across build sessions.
    ModuleName
}

string_id! {
    /// A capture variable inside a constraint.
    VarName
}
