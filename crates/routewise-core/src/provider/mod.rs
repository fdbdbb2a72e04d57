//! Provider abstractions: the backend trait, its type-erased wrapper,
//! the capability registry, and periodic health checking.

pub mod backend;
pub mod box_provider;
pub mod health;
pub mod registry;
