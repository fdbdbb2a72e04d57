//! Shared domain types for routewise.
//!
//! Capabilities, the failure taxonomy, provider specs and health snapshots,
//! selection results, router configuration and response envelopes.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod capability;
pub mod config;
pub mod error;
pub mod failure;
pub mod provider;
pub mod response;
pub mod selection;
