//! The Gateway binary's library crate: shared application state, the
//! Turn Engine and its supporting runtime, the HTTP API surface, and the
//! CLI/bootstrap wiring consumed by `main.rs`.

pub mod api;
pub mod cli;
pub mod runtime;
pub mod state;
pub mod telemetry;
