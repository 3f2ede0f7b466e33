//! Planar defects (stacking faults) built from stacking-fault atoms.

pub mod detect;
pub mod link;

pub use detect::PlanarDefectDetector;
pub use link::LinkPlanarDefects;

use crate::atoms::PlanarAtom;
use crate::math::{PeriodicBox, Vector3};

/// A flat cluster of stacking-fault atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarDefect {
    pub id: usize,
    /// Unit plane normal in the sample frame.
    pub normal: Vector3,
    /// Index of the best-matching reference plane normal, if any.
    pub family: Option<usize>,
    /// Indices into the planar atom list, ascending.
    pub atoms: Vec<usize>,
    /// Triangles of mutually adjacent atoms, each with ascending indices.
    pub faces: Vec<[usize; 3]>,
    /// Ids of dislocations running along the defect.
    pub dislocations: Vec<usize>,
}

impl PlanarDefect {
    /// Total area of the triangulated faces.
    #[must_use]
    pub fn area(&self, atoms: &[PlanarAtom], periodic_box: &PeriodicBox) -> f64 {
        self.faces
            .iter()
            .filter_map(|&[a, b, c]| {
                let pa = atoms.get(a)?.position;
                let ab = periodic_box.delta(&pa, &atoms.get(b)?.position);
                let ac = periodic_box.delta(&pa, &atoms.get(c)?.position);
                Some(0.5 * ab.cross(&ac).norm())
            })
            .sum()
    }
}

/// Index of the reference normal with the largest |cos| to `normal`.
#[must_use]
pub fn best_family(normal: &Vector3, references: &[Vector3]) -> Option<usize> {
    references
        .iter()
        .enumerate()
        .map(|(i, r)| (i, normal.dot(r).abs()))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_ignores_orientation() {
        let refs = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0)];
        assert_eq!(best_family(&Vector3::new(0.1, 0.0, -0.99), &refs), Some(1));
        assert_eq!(best_family(&Vector3::z(), &[]), None);
    }
}
