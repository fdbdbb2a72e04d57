//! Infrastructure layer for routewise.
//!
//! Loads `routewise.toml` from disk and seeds the provider registry from it.
//! Everything here is IO glue around the pure logic in `routewise-core`.

pub mod bootstrap;
pub mod config;
