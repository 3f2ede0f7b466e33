//! Pipeline steps operating on the skeleton graph and its dislocations.

pub mod build;
pub mod contract;
pub mod extract;
pub mod fix;
pub mod prune;
pub mod smooth;

pub use build::BuildSkeleton;
pub use contract::{ContractionReport, MeshContraction};
pub use extract::ExtractDislocations;
pub use fix::{DislocationFixing, FixingProbe, FixingReport};
pub use prune::{Prune, PruneReport};
pub use smooth::SmoothDislocations;
