pub mod burgers_vector;
pub mod patterns;

pub use burgers_vector::{BurgersVector, BurgersVectorKind};
pub use patterns::{bcc_patterns, classify, fcc_patterns, BurgersPattern};

use crate::error::OperationError;
use crate::math::{Matrix3, Vector3, TOLERANCE};

/// Crystal-structure policy consumed by the skeletonizer.
///
/// Supplies the neighbor cutoff, the lattice constant, the orientation of
/// the crystal axes in the sample frame, the Burgers vector classification
/// table and the reference plane normals used to tag planar defects.
#[derive(Debug, Clone)]
pub struct CrystalStructure {
    name: String,
    lattice_constant: f64,
    nearest_neighbor_cutoff: f64,
    skeletonize_across_grains: bool,
    /// Rows are the crystal `[100]`, `[010]`, `[001]` axes in the sample frame.
    orientation: Matrix3,
    patterns: Vec<BurgersPattern>,
    /// Unit plane normals in the crystal frame.
    plane_normals: Vec<Vector3>,
}

impl CrystalStructure {
    /// Creates a structure with an identity orientation, no classification
    /// rules and no plane families.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if the lattice constant or the
    /// cutoff is not a positive finite number.
    pub fn new(
        name: &str,
        lattice_constant: f64,
        nearest_neighbor_cutoff: f64,
    ) -> Result<Self, OperationError> {
        for (label, value) in [
            ("lattice constant", lattice_constant),
            ("nearest neighbor cutoff", nearest_neighbor_cutoff),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(OperationError::InvalidInput(format!(
                    "{label} must be positive, got {value}"
                )));
            }
        }
        Ok(Self {
            name: name.to_owned(),
            lattice_constant,
            nearest_neighbor_cutoff,
            skeletonize_across_grains: false,
            orientation: Matrix3::identity(),
            patterns: Vec::new(),
            plane_normals: Vec::new(),
        })
    }

    /// Face-centred cubic preset: cutoff between the first and second
    /// neighbor shell, FCC Burgers vector table, `{111}` plane family.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for a non-positive lattice constant.
    pub fn fcc(lattice_constant: f64) -> Result<Self, OperationError> {
        let cutoff = lattice_constant * (std::f64::consts::FRAC_1_SQRT_2 + 1.0) * 0.5;
        let normals = [
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(-1.0, 1.0, 1.0),
            Vector3::new(1.0, -1.0, 1.0),
            Vector3::new(1.0, 1.0, -1.0),
        ];
        Ok(Self::new("FCC", lattice_constant, cutoff)?
            .with_patterns(fcc_patterns())
            .with_plane_normals(&normals))
    }

    /// Body-centred cubic preset: cutoff between the second and third
    /// neighbor shell, BCC Burgers vector table, `{110}` plane family.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for a non-positive lattice constant.
    pub fn bcc(lattice_constant: f64) -> Result<Self, OperationError> {
        let cutoff = lattice_constant * (1.0 + std::f64::consts::SQRT_2) * 0.5;
        let normals = [
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(1.0, -1.0, 0.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 1.0),
            Vector3::new(0.0, 1.0, -1.0),
        ];
        Ok(Self::new("BCC", lattice_constant, cutoff)?
            .with_patterns(bcc_patterns())
            .with_plane_normals(&normals))
    }

    /// Sets the crystal orientation.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` if `orientation` is not a
    /// rotation (orthonormal rows).
    pub fn with_orientation(mut self, orientation: Matrix3) -> Result<Self, OperationError> {
        let residual = (orientation * orientation.transpose() - Matrix3::identity()).norm();
        if !residual.is_finite() || residual > 1e-6 {
            return Err(OperationError::InvalidInput(
                "crystal orientation must be orthonormal".into(),
            ));
        }
        self.orientation = orientation;
        Ok(self)
    }

    /// Replaces the classification table.
    #[must_use]
    pub fn with_patterns(mut self, patterns: Vec<BurgersPattern>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Replaces the reference plane normals (crystal frame); they are
    /// normalized and zero vectors are dropped.
    #[must_use]
    pub fn with_plane_normals(mut self, normals: &[Vector3]) -> Self {
        self.plane_normals = normals
            .iter()
            .filter(|n| n.norm() > TOLERANCE)
            .map(|n| n.normalize())
            .collect();
        self
    }

    /// Allows skeleton edges and curve repairs across grain boundaries.
    #[must_use]
    pub fn with_skeletonize_across_grains(mut self, allowed: bool) -> Self {
        self.skeletonize_across_grains = allowed;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn lattice_constant(&self) -> f64 {
        self.lattice_constant
    }

    #[must_use]
    pub fn nearest_neighbor_cutoff(&self) -> f64 {
        self.nearest_neighbor_cutoff
    }

    #[must_use]
    pub fn skeletonize_across_grains(&self) -> bool {
        self.skeletonize_across_grains
    }

    #[must_use]
    pub fn patterns(&self) -> &[BurgersPattern] {
        &self.patterns
    }

    /// Reference plane normals in the crystal frame.
    #[must_use]
    pub fn plane_normals(&self) -> &[Vector3] {
        &self.plane_normals
    }

    /// Reference plane normals rotated into the sample frame.
    #[must_use]
    pub fn sample_plane_normals(&self) -> Vec<Vector3> {
        self.plane_normals
            .iter()
            .map(|n| self.orientation.transpose() * n)
            .collect()
    }

    /// Converts a sample-frame vector into crystal coordinates in units of
    /// the lattice constant.
    #[must_use]
    pub fn to_crystal(&self, v: &Vector3) -> Vector3 {
        self.orientation * v / self.lattice_constant
    }

    /// Converts crystal coordinates back into a sample-frame vector.
    #[must_use]
    pub fn to_sample(&self, v: &Vector3) -> Vector3 {
        self.orientation.transpose() * v * self.lattice_constant
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fcc_cutoff_between_shells() {
        let fcc = CrystalStructure::fcc(4.05).unwrap();
        let first = 4.05 * std::f64::consts::FRAC_1_SQRT_2;
        assert!(fcc.nearest_neighbor_cutoff() > first);
        assert!(fcc.nearest_neighbor_cutoff() < 4.05);
        assert_eq!(fcc.plane_normals().len(), 4);
    }

    #[test]
    fn frame_conversion_round_trip() {
        let c = std::f64::consts::FRAC_1_SQRT_2;
        let rotation = Matrix3::new(c, c, 0.0, -c, c, 0.0, 0.0, 0.0, 1.0);
        let fcc = CrystalStructure::fcc(4.0).unwrap().with_orientation(rotation).unwrap();
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_abs_diff_eq!(fcc.to_sample(&fcc.to_crystal(&v)), v, epsilon = 1e-12);
    }

    #[test]
    fn rejects_skewed_orientation() {
        let skewed = Matrix3::new(1.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(CrystalStructure::bcc(2.87).unwrap().with_orientation(skewed).is_err());
    }

    #[test]
    fn rejects_negative_lattice_constant() {
        assert!(CrystalStructure::new("custom", -1.0, 1.0).is_err());
    }
}
