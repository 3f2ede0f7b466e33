pub mod neighbor;
pub mod periodic;

pub use neighbor::{Neighbor, NeighborGrid};
pub use periodic::PeriodicBox;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 matrix type.
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Angle in radians between two vectors, or `None` if either is (near) zero.
#[must_use]
pub fn angle_between(a: &Vector3, b: &Vector3) -> Option<f64> {
    let na = a.norm();
    let nb = b.norm();
    if na < TOLERANCE || nb < TOLERANCE {
        return None;
    }
    Some((a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos())
}

/// Cosine of the angle between two vectors, or `None` if either is (near) zero.
#[must_use]
pub fn cosine(a: &Vector3, b: &Vector3) -> Option<f64> {
    let na = a.norm();
    let nb = b.norm();
    if na < TOLERANCE || nb < TOLERANCE {
        return None;
    }
    Some((a.dot(b) / (na * nb)).clamp(-1.0, 1.0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn right_angle() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 2.0, 0.0);
        let angle = angle_between(&a, &b).unwrap();
        assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_has_no_angle() {
        let a = Vector3::zeros();
        let b = Vector3::new(0.0, 2.0, 0.0);
        assert!(angle_between(&a, &b).is_none());
        assert!(cosine(&b, &a).is_none());
    }
}
