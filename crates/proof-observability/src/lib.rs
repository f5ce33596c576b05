//! Observability setup for the social proof services.
//!
//! Library crates only emit `tracing` events. Binaries call
//! [`init_tracing`] once at startup to install a subscriber that writes
//! JSON lines for log aggregation or human-readable lines for development.

mod logging;

pub use logging::*;
