//! Failure recording and provider isolation.
//!
//! - `FailureLedger`: bounded failure history plus the per-provider
//!   Healthy -> Isolated -> RecoveryCheck state machine
//! - `PerformanceTracker`: response-time history used by provider scoring

pub mod ledger;
pub mod performance;
