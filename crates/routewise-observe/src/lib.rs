//! Observability for routewise: fmt subscriber with optional OTel export.

pub mod tracing_setup;
