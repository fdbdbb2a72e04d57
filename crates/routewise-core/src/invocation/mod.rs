//! Provider invocation and degraded-mode responses.
//!
//! - `invoker`: walks the provider chain with per-call timeout and
//!   cooperative cancellation, feeding every outcome back to the ledger
//! - `degraded`: the degraded response synthesizer boundary

pub mod degraded;
pub mod invoker;
