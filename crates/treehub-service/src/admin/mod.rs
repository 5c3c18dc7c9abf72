//! Operator-facing services: owner overview and reconciliation.

pub mod reconcile;
pub mod service;

pub use reconcile::Reconciler;
pub use service::AdminService;
