//! Persistent storage
//!
//! - `case_base`: the append-only case file the estimator learns from
//! - `dump`: per-decision JSON-lines records for offline inspection

pub mod case_base;
pub mod dump;

pub use case_base::{CaseBase, CaseBaseError};
pub use dump::{DecisionRecord, DumpWriter};
