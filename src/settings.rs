//! Tunable parameters of the skeletonization pipeline.
//!
//! The defaults reproduce the empirically chosen constants of the
//! reference workflow; none of them is an invariant.

use std::f64::consts::PI;

use crate::error::OperationError;

/// Mesh contraction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractionSettings {
    /// Fraction of the weighted neighbor pull applied per pass.
    pub move_scale: f64,
    /// Squared displacement below which a node counts as converged.
    pub min_move_squared: f64,
    /// Contraction stops once `moved * convergence_divisor <= nodes`.
    pub convergence_divisor: usize,
    /// Merge distance as a multiple of the skeleton cutoff.
    pub merge_tolerance: f64,
    /// Hard cap on move passes.
    pub max_iterations: usize,
}

impl Default for ContractionSettings {
    fn default() -> Self {
        Self {
            move_scale: 1.0 / 3.0,
            min_move_squared: 1e-6,
            convergence_divisor: 200,
            merge_tolerance: 0.1,
            max_iterations: 10_000,
        }
    }
}

/// Post-contraction cleanup parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneSettings {
    /// Connected fragments with fewer nodes are removed.
    pub min_fragment_nodes: usize,
    /// Dangling chains attached to a junction that are shorter than this
    /// multiple of the skeleton cutoff are removed.
    pub whisker_length: f64,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            min_fragment_nodes: 3,
            whisker_length: 1.0,
        }
    }
}

/// Parameters of the free-ending repair heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixingSettings {
    pub enabled: bool,
    /// Search radius as a multiple of the skeleton cutoff.
    pub max_distance: f64,
    /// Largest accepted deviation from the incoming curve direction.
    pub max_angle: f64,
    /// Candidates are accepted below this quality.
    pub acceptance: f64,
    /// Number of segments used to estimate the direction at an ending.
    pub tangent_window: usize,
    /// Nodes near an ending used to sample its resultant Burgers vector.
    pub rbv_window: usize,
    /// |cos| of RBV samples at or above which a candidate is favored.
    pub rbv_similar_cosine: f64,
    pub rbv_similar_factor: f64,
    /// |cos| of RBV samples below which a candidate is penalized.
    pub rbv_dissimilar_cosine: f64,
    pub rbv_dissimilar_penalty: f64,
}

impl Default for FixingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_distance: 3.0,
            max_angle: 0.6 * PI,
            acceptance: 1.0,
            tangent_window: 3,
            rbv_window: 5,
            rbv_similar_cosine: 0.9,
            rbv_similar_factor: 0.5,
            rbv_dissimilar_cosine: 0.5,
            rbv_dissimilar_penalty: 1.0,
        }
    }
}

/// Laplacian curve smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingSettings {
    pub passes: usize,
    pub factor: f64,
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        Self {
            passes: 1,
            factor: 0.25,
        }
    }
}

/// Planar-defect detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarSettings {
    /// Two bonds are "straight" when their cosine is below this value.
    pub straight_cosine: f64,
    /// Maximum |cos| between a bond and the plane normal for in-plane bonds.
    pub plane_tolerance: f64,
    /// Straight-bond count required to seed a cluster in the strict pass.
    pub strict_bond_count: usize,
    /// Straight-bond count required in the relaxed pass.
    pub relaxed_bond_count: usize,
    /// In-plane neighbors an atom needs to keep propagating the flood fill.
    pub propagation_neighbors: usize,
    /// Smallest cluster kept as a planar defect.
    pub min_atoms: usize,
    /// Distance between a curve node and a defect atom that links both,
    /// as a multiple of the nearest-neighbor cutoff.
    pub link_distance: f64,
}

impl Default for PlanarSettings {
    fn default() -> Self {
        Self {
            straight_cosine: -0.95,
            plane_tolerance: 0.15,
            strict_bond_count: 3,
            relaxed_bond_count: 2,
            propagation_neighbors: 3,
            min_atoms: 3,
            link_distance: 1.0,
        }
    }
}

/// Burgers vector classification parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationSettings {
    /// Minimum cosine between a measured vector and a rule direction.
    pub min_cosine: f64,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self { min_cosine: 0.95 }
    }
}

/// All parameters of one skeletonization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkeletonizerSettings {
    /// Skeleton cutoff as a multiple of the crystal nearest-neighbor cutoff.
    pub meshing_threshold: f64,
    /// Allow edges and repairs across grain boundaries even if the crystal
    /// structure does not.
    pub allow_cross_grain: bool,
    pub contraction: ContractionSettings,
    pub prune: PruneSettings,
    pub fixing: FixingSettings,
    pub smoothing: SmoothingSettings,
    pub planar: PlanarSettings,
    pub classification: ClassificationSettings,
}

impl Default for SkeletonizerSettings {
    fn default() -> Self {
        Self {
            meshing_threshold: 1.0,
            allow_cross_grain: false,
            contraction: ContractionSettings::default(),
            prune: PruneSettings::default(),
            fixing: FixingSettings::default(),
            smoothing: SmoothingSettings::default(),
            planar: PlanarSettings::default(),
            classification: ClassificationSettings::default(),
        }
    }
}

impl SkeletonizerSettings {
    /// Checks that every numeric parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), OperationError> {
        let positive = [
            ("meshing_threshold", self.meshing_threshold),
            ("contraction.move_scale", self.contraction.move_scale),
            ("contraction.min_move_squared", self.contraction.min_move_squared),
            ("contraction.merge_tolerance", self.contraction.merge_tolerance),
            ("fixing.max_distance", self.fixing.max_distance),
            ("fixing.max_angle", self.fixing.max_angle),
            ("fixing.acceptance", self.fixing.acceptance),
            ("planar.plane_tolerance", self.planar.plane_tolerance),
            ("planar.link_distance", self.planar.link_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(OperationError::InvalidInput(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.contraction.convergence_divisor == 0 {
            return Err(OperationError::InvalidInput(
                "contraction.convergence_divisor must be at least 1".into(),
            ));
        }
        if !(0.0..=0.5).contains(&self.smoothing.factor) {
            return Err(OperationError::InvalidInput(format!(
                "smoothing.factor must lie in [0, 0.5], got {}",
                self.smoothing.factor
            )));
        }
        if !(-1.0..=0.0).contains(&self.planar.straight_cosine) {
            return Err(OperationError::InvalidInput(format!(
                "planar.straight_cosine must lie in [-1, 0], got {}",
                self.planar.straight_cosine
            )));
        }
        if !(-1.0..=1.0).contains(&self.classification.min_cosine) {
            return Err(OperationError::InvalidInput(format!(
                "classification.min_cosine must lie in [-1, 1], got {}",
                self.classification.min_cosine
            )));
        }
        Ok(())
    }
}
