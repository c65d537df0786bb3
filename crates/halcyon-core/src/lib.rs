//! Halcyon Core
//!
//! Shared infrastructure for the Halcyon crates: generational storage,
//! hash collections, logging setup and profiling hooks.

pub mod alloc;
pub mod logging;
pub mod profiling;
