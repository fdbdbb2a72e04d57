//! Routing logic for routewise.
//!
//! Picks a provider and model for each request, records failures, isolates
//! chronically failing providers, relaxes capabilities when nothing matches,
//! and falls back to a degraded-mode response when every option is gone.
//!
//! No file or network IO lives here. Providers and the degraded response
//! synthesizer are traits implemented by callers.

pub mod config;
pub mod invocation;
pub mod isolation;
pub mod provider;
pub mod router;
pub mod selection;
