//! Reconciliation results.

pub mod report;

pub use report::{ReconcileReport, SizeMismatch};
