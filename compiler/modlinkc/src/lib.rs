//! Driver for the modlink linker.
//!
//! Loads a program file produced by the front end, registers it into a
//! [`modlink::LinkSession`], links it and reports every diagnostic in one
//! batch. The `modlink` binary is a thin argument parser over
//! [`commands`].

pub mod commands;
pub mod loader;

use std::sync::Once;

pub use loader::{read_program, LoadError, LoadedProgram, ProgramFile};

static TRACING_INIT: Once = Once::new();

/// Install the tracing subscriber, once per process.
///
/// Does nothing unless `MODLINK_LOG` is set; its value is an `EnvFilter`
/// directive such as `modlink=debug` or `modlink::linker=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("MODLINK_LOG").is_ok() {
            let filter = EnvFilter::from_env("MODLINK_LOG");
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .with(filter)
                .init();
        }
    });
}
