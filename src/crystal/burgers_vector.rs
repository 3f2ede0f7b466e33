use std::fmt;
use std::ops::{Add, Neg, Sub};

use crate::math::Vector3;

/// How reliably a Burgers vector has been determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BurgersVectorKind {
    /// Matched a pattern rule or was derived from fully defined vectors only.
    FullyDefined,
    /// Plausible, but derived from an uncertain rule or an uncertain neighbor.
    PartiallyDefined,
    /// No classification available.
    Undefined,
    /// Zero vector produced by junction propagation; not meant to be drawn.
    DontShow,
}

impl BurgersVectorKind {
    /// Returns `true` for kinds that carry a usable vector.
    #[must_use]
    pub fn is_defined(self) -> bool {
        !matches!(self, Self::Undefined)
    }

    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => Self::Undefined,
            (Self::FullyDefined | Self::DontShow, Self::FullyDefined | Self::DontShow) => {
                Self::FullyDefined
            }
            _ => Self::PartiallyDefined,
        }
    }
}

/// Crystallographic Burgers vector `direction / denominator`, in units of
/// the lattice constant and expressed in the crystal frame.
///
/// Values are always stored reduced: the gcd of the denominator and the
/// direction components is one, and the zero vector has denominator one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BurgersVector {
    denominator: u32,
    direction: [i32; 3],
    kind: BurgersVectorKind,
}

impl BurgersVector {
    /// Creates a reduced Burgers vector. A zero denominator yields
    /// [`BurgersVector::undefined`].
    #[must_use]
    pub fn new(denominator: u32, direction: [i32; 3], kind: BurgersVectorKind) -> Self {
        if denominator == 0 {
            return Self::undefined();
        }
        let num = direction.map(i64::from);
        Self::from_parts(i64::from(denominator), num, kind).unwrap_or_else(Self::undefined)
    }

    /// The unclassified vector.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            denominator: 1,
            direction: [0; 3],
            kind: BurgersVectorKind::Undefined,
        }
    }

    fn from_parts(denominator: i64, direction: [i64; 3], kind: BurgersVectorKind) -> Option<Self> {
        let g = direction
            .iter()
            .fold(denominator.abs(), |acc, &c| gcd(acc, c.abs()));
        let g = g.max(1);
        let (den, dir) = if direction.iter().all(|&c| c == 0) {
            (1, [0i64; 3])
        } else {
            (denominator / g, direction.map(|c| c / g))
        };
        Some(Self {
            denominator: u32::try_from(den).ok()?,
            direction: [
                i32::try_from(dir[0]).ok()?,
                i32::try_from(dir[1]).ok()?,
                i32::try_from(dir[2]).ok()?,
            ],
            kind,
        })
    }

    #[must_use]
    pub fn denominator(&self) -> u32 {
        self.denominator
    }

    #[must_use]
    pub fn direction(&self) -> [i32; 3] {
        self.direction
    }

    #[must_use]
    pub fn kind(&self) -> BurgersVectorKind {
        self.kind
    }

    /// Same vector with a different kind tag.
    #[must_use]
    pub fn with_kind(mut self, kind: BurgersVectorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns `true` if all direction components are zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.direction.iter().all(|&c| c == 0)
    }

    /// Numeric vector in crystal coordinates (units of the lattice constant).
    #[must_use]
    pub fn to_crystal(&self) -> Vector3 {
        let d = f64::from(self.denominator);
        Vector3::new(
            f64::from(self.direction[0]) / d,
            f64::from(self.direction[1]) / d,
            f64::from(self.direction[2]) / d,
        )
    }

    /// Length in units of the lattice constant.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.to_crystal().norm()
    }

    /// Key identifying the vector up to sign and permutation:
    /// the denominator and the sorted absolute direction digits.
    #[must_use]
    pub fn family_key(&self) -> (u32, [u32; 3]) {
        let mut digits = self.direction.map(i32::unsigned_abs);
        digits.sort_unstable();
        (self.denominator, digits)
    }

    /// Returns `true` if both vectors belong to the same `<uvw>` family.
    #[must_use]
    pub fn same_family(&self, other: &Self) -> bool {
        self.family_key() == other.family_key()
    }
}

impl Neg for BurgersVector {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            direction: self.direction.map(|c| -c),
            ..self
        }
    }
}

impl Add for BurgersVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let a = i64::from(self.denominator);
        let b = i64::from(rhs.denominator);
        let l = a / gcd(a, b) * b;
        let mut num = [0i64; 3];
        for (i, n) in num.iter_mut().enumerate() {
            *n = i64::from(self.direction[i]) * (l / a) + i64::from(rhs.direction[i]) * (l / b);
        }
        Self::from_parts(l, num, self.kind.combine(rhs.kind)).unwrap_or_else(Self::undefined)
    }
}

impl Sub for BurgersVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl fmt::Display for BurgersVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == BurgersVectorKind::Undefined {
            return write!(f, "undefined");
        }
        let [u, v, w] = self.direction;
        if self.denominator == 1 {
            write!(f, "[{u} {v} {w}]")
        } else {
            write!(f, "1/{}[{u} {v} {w}]", self.denominator)
        }
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: BurgersVectorKind = BurgersVectorKind::FullyDefined;

    #[test]
    fn reduces_on_construction() {
        let b = BurgersVector::new(4, [2, 2, 0], FULL);
        assert_eq!(b.denominator(), 2);
        assert_eq!(b.direction(), [1, 1, 0]);
    }

    #[test]
    fn shockley_partials_sum_to_perfect() {
        // 1/6[1 2 1] + 1/6[2 1 -1] = 1/2[1 1 0]
        let a = BurgersVector::new(6, [1, 2, 1], FULL);
        let b = BurgersVector::new(6, [2, 1, -1], FULL);
        let sum = a + b;
        assert_eq!(sum, BurgersVector::new(2, [1, 1, 0], FULL));
    }

    #[test]
    fn difference_to_self_is_zero() {
        let a = BurgersVector::new(3, [1, 1, 1], FULL);
        let zero = a - a;
        assert!(zero.is_zero());
        assert_eq!(zero.denominator(), 1);
    }

    #[test]
    fn family_ignores_sign_and_order() {
        let a = BurgersVector::new(6, [1, -2, 1], FULL);
        let b = BurgersVector::new(6, [-2, 1, 1], BurgersVectorKind::PartiallyDefined);
        assert!(a.same_family(&b));
        assert!(!a.same_family(&BurgersVector::new(2, [1, 1, 0], FULL)));
    }

    #[test]
    fn undefined_poisons_sum_kind() {
        let a = BurgersVector::new(2, [1, 1, 0], FULL);
        let sum = a + BurgersVector::undefined();
        assert_eq!(sum.kind(), BurgersVectorKind::Undefined);
        let partial = a + BurgersVector::new(2, [1, 0, 1], BurgersVectorKind::PartiallyDefined);
        assert_eq!(partial.kind(), BurgersVectorKind::PartiallyDefined);
    }

    #[test]
    fn display_format() {
        assert_eq!(BurgersVector::new(2, [1, -1, 0], FULL).to_string(), "1/2[1 -1 0]");
        assert_eq!(BurgersVector::new(1, [1, 0, 0], FULL).to_string(), "[1 0 0]");
        assert_eq!(BurgersVector::undefined().to_string(), "undefined");
    }
}
