pub mod atoms;
pub mod burgers;
pub mod crystal;
pub mod error;
pub mod export;
pub mod graph;
pub mod interrupt;
pub mod math;
pub mod operations;
pub mod planar;
pub mod settings;
pub mod skeletonizer;

pub use atoms::{DefectAtom, PlanarAtom, Rbv};
pub use crystal::{BurgersVector, BurgersVectorKind, CrystalStructure};
pub use error::{Result, SkeletonError};
pub use export::write_skeleton;
pub use interrupt::Interrupt;
pub use settings::SkeletonizerSettings;
pub use skeletonizer::{Skeleton, SkeletonReport, Skeletonizer};
