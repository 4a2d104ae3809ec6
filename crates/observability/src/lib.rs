//! Process-wide logging setup shared by the storefront binaries.

/// Install the JSON `tracing` subscriber (see [`tracing::init`]).
///
/// Safe to call more than once; only the first call has an effect.
pub fn init() {
    self::tracing::init();
}

pub mod tracing;
