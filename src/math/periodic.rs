use crate::error::GeometryError;

use super::{Point3, Vector3};

/// Orthorhombic simulation box with optional periodicity per axis.
///
/// All distance and direction math in the pipeline goes through
/// [`PeriodicBox::delta`], which applies the minimum-image convention on
/// periodic axes.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicBox {
    origin: Point3,
    size: Vector3,
    periodic: [bool; 3],
}

impl PeriodicBox {
    /// Creates a box spanning `origin .. origin + size`.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::InvalidBox` if any edge length is not a
    /// positive finite number.
    pub fn new(origin: Point3, size: Vector3, periodic: [bool; 3]) -> Result<Self, GeometryError> {
        if size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(GeometryError::InvalidBox(format!(
                "edge lengths must be positive, got ({}, {}, {})",
                size.x, size.y, size.z
            )));
        }
        if origin.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::InvalidBox("origin is not finite".into()));
        }
        Ok(Self {
            origin,
            size,
            periodic,
        })
    }

    /// Creates a box at the origin that is periodic along all three axes.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::InvalidBox` for non-positive edge lengths.
    pub fn fully_periodic(size: Vector3) -> Result<Self, GeometryError> {
        Self::new(Point3::origin(), size, [true; 3])
    }

    /// Lower corner of the box.
    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Edge lengths of the box.
    #[must_use]
    pub fn size(&self) -> &Vector3 {
        &self.size
    }

    /// Periodicity flags for the x, y and z axes.
    #[must_use]
    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Box volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.size.x * self.size.y * self.size.z
    }

    /// Maps a point back into the box along its periodic axes.
    #[must_use]
    pub fn wrap(&self, point: &Point3) -> Point3 {
        let mut wrapped = *point;
        for axis in 0..3 {
            if !self.periodic[axis] {
                continue;
            }
            let len = self.size[axis];
            let rel = (point[axis] - self.origin[axis]).rem_euclid(len);
            // rem_euclid can return `len` for tiny negative inputs
            wrapped[axis] = self.origin[axis] + if rel >= len { 0.0 } else { rel };
        }
        wrapped
    }

    /// Minimum-image vector pointing from `from` to `to`.
    #[must_use]
    pub fn delta(&self, from: &Point3, to: &Point3) -> Vector3 {
        let mut d = to - from;
        for axis in 0..3 {
            if self.periodic[axis] {
                let len = self.size[axis];
                d[axis] -= len * (d[axis] / len).round();
            }
        }
        d
    }

    /// Squared minimum-image distance between two points.
    #[must_use]
    pub fn distance_squared(&self, a: &Point3, b: &Point3) -> f64 {
        self.delta(a, b).norm_squared()
    }
}
