//! Domain types shared by every trainhub crate.
//!
//! Pure data and validation only: no I/O, no async. The api, events and
//! training crates all depend on this one and never on each other's
//! internals.

pub mod error;
pub mod progress;
pub mod training_config;
pub mod types;
