//! Provider and model selection.
//!
//! - `capabilities`: cached capability sets read by planner and scorer
//! - `fallback`: per-(provider, model) substitute model chains
//! - `scoring`: additive provider scoring with tie-break by registry order
//! - `planner`: capability degradation in a fixed relaxation order
//! - `preference`: user preference normalization and validation
//! - `selector`: the four-step selection procedure tying them together

pub mod capabilities;
pub mod fallback;
pub mod planner;
pub mod preference;
pub mod scoring;
pub mod selector;
