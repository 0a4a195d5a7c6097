//! Conformance checking: does a module cover its interface?
//!
//! Runs once, when a module is registered. A module that fails is never
//! placed in any search space, so the linker never re-checks shapes.

use modlink_ir::{Interface, Module};

use crate::error::{ConformanceError, ConformanceFailure};

/// Check that every interface signature has a structurally equal
/// definition in the module.
///
/// Extra definitions are allowed and stay private to the module. All
/// failures are reported, in interface declaration order.
#[tracing::instrument(level = "debug", skip_all, fields(module = %module.name, interface = %interface.id))]
pub fn check(module: &Module, interface: &Interface) -> Result<(), ConformanceError> {
    let mut failures = Vec::new();

    for expected in &interface.signatures {
        if module.has_signature(expected) {
            continue;
        }
        match module.definition(expected.name()) {
            None => failures.push(ConformanceFailure::MissingSignature {
                name: expected.name().to_string(),
                expected: expected.clone(),
            }),
            Some(found) => failures.push(ConformanceFailure::ShapeMismatch {
                name: expected.name().to_string(),
                expected: expected.clone(),
                found: found.signature.clone(),
            }),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = failures.len(), "module does not conform");
        Err(ConformanceError {
            module: module.name.clone(),
            interface: interface.id.clone(),
            failures,
        })
    }
}
