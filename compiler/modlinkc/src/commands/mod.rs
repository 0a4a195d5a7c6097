//! Command handlers for the `modlink` CLI.
//!
//! Each handler returns its outcome instead of printing, so `main` decides
//! how to report and which exit status to use.

mod check;
mod link;
mod pins;

pub use check::{check_program, CheckOutcome};
pub use link::{link_program_file, parse_link_options, LinkOutcome};
pub use pins::{list_pins, unpin};

use modlink::LinkBinding;

/// One line per pin: `Main#0 -> Set_A (trusted, 1f2e...)`.
pub fn format_pin(binding: &LinkBinding) -> String {
    let trust = if binding.trust.is_empty() {
        "-"
    } else {
        binding.trust.as_str()
    };
    let mut line = format!(
        "{} -> {} ({trust}, {})",
        binding.key,
        binding.module,
        binding.fingerprint.to_hex()
    );
    if binding.stale {
        line.push_str(" [stale]");
    }
    line
}
