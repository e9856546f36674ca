//! Binary-only glue (§4.L): process configuration loading lives here; the
//! protocol engine itself is `surrogate-core`, and the wire codec is
//! `mom-protocol`. This crate stays thin on purpose — everything reusable
//! belongs in the library crates, not the binary.

pub mod config;

pub use surrogate_core::{ApplicationHandler, Controller, NoopApplicationHandler};
