//! Values describing objects in the physical owner trees.

pub mod model;

pub use model::{OwnerRoot, OwnerSummary, PhysicalObject};
