//! Input records handed over by the import and per-atom analysis stages.

use crate::math::{Point3, Vector3};

/// Resultant Burgers vector sample of a single atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rbv {
    /// Local line direction estimated at the atom.
    pub line_direction: Vector3,
    /// Burgers-vector-like displacement measured at the atom.
    pub burgers: Vector3,
}

impl Rbv {
    /// Creates a new sample.
    #[must_use]
    pub fn new(line_direction: Vector3, burgers: Vector3) -> Self {
        Self {
            line_direction,
            burgers,
        }
    }

    /// Displacement flipped so that it refers to `tangent` as line direction.
    #[must_use]
    pub fn oriented_along(&self, tangent: &Vector3) -> Vector3 {
        if self.line_direction.dot(tangent) < 0.0 {
            -self.burgers
        } else {
            self.burgers
        }
    }
}

/// An atom classified as part of a line defect.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectAtom {
    pub position: Point3,
    /// Grain tag; `None` when the sample is not poly-crystalline.
    pub grain: Option<u32>,
    /// Resultant Burgers vector sample, if one was computed.
    pub rbv: Option<Rbv>,
    /// Set for atoms adjacent to a free surface.
    pub near_surface: bool,
}

impl DefectAtom {
    /// Creates a defect atom without grain, RBV or surface information.
    #[must_use]
    pub fn new(position: Point3) -> Self {
        Self {
            position,
            grain: None,
            rbv: None,
            near_surface: false,
        }
    }

    /// Sets the grain tag.
    #[must_use]
    pub fn with_grain(mut self, grain: u32) -> Self {
        self.grain = Some(grain);
        self
    }

    /// Attaches an RBV sample.
    #[must_use]
    pub fn with_rbv(mut self, rbv: Rbv) -> Self {
        self.rbv = Some(rbv);
        self
    }

    /// Marks the atom as adjacent to a free surface.
    #[must_use]
    pub fn at_surface(mut self) -> Self {
        self.near_surface = true;
        self
    }
}

/// An atom classified as stacking-fault type, input to planar-defect detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarAtom {
    pub position: Point3,
    /// Structure type code; clusters only contain atoms of one type.
    pub kind: u8,
}

impl PlanarAtom {
    /// Creates a new planar atom.
    #[must_use]
    pub fn new(position: Point3, kind: u8) -> Self {
        Self { position, kind }
    }
}

/// Returns `true` if two optional grain tags may be bridged.
///
/// Untagged atoms are compatible with everything.
#[must_use]
pub fn same_grain(a: Option<u32>, b: Option<u32>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}
