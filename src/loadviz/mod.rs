//! The load model and layout engine: pure functions from a cluster
//! metrics snapshot to a colored, rectangle-packed load map.

pub mod heatmap;
pub mod layout;
pub mod load;
pub mod snapshot;
pub mod units;
