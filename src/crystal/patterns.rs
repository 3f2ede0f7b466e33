use std::ops::RangeInclusive;

use crate::math::{cosine, Vector3};

use super::burgers_vector::{BurgersVector, BurgersVectorKind};

/// One row of a Burgers vector classification table.
///
/// A measured crystal-frame vector matches when its direction is close to
/// some signed permutation of `digits`, its length relative to the ideal
/// length `|digits| / denominator` lies in `fraction`, and the number of
/// planar defects adjacent to the curve lies in `surfaces`.
#[derive(Debug, Clone, PartialEq)]
pub struct BurgersPattern {
    pub name: String,
    pub denominator: u32,
    /// Absolute direction digits, sorted ascending.
    pub digits: [u32; 3],
    /// Accepted range of measured length / ideal length.
    pub fraction: (f64, f64),
    pub surfaces: RangeInclusive<usize>,
    /// Kind assigned on a match.
    pub kind: BurgersVectorKind,
}

impl BurgersPattern {
    /// Creates a rule; `digits` are sorted on construction.
    #[must_use]
    pub fn new(
        name: &str,
        denominator: u32,
        mut digits: [u32; 3],
        fraction: (f64, f64),
        surfaces: RangeInclusive<usize>,
        kind: BurgersVectorKind,
    ) -> Self {
        digits.sort_unstable();
        Self {
            name: name.to_owned(),
            denominator,
            digits,
            fraction,
            surfaces,
            kind,
        }
    }

    /// Length of the ideal vector in units of the lattice constant.
    #[must_use]
    pub fn ideal_length(&self) -> f64 {
        let sq: u32 = self.digits.iter().map(|d| d * d).sum();
        f64::from(sq).sqrt() / f64::from(self.denominator)
    }

    /// Tests a measured vector against this rule.
    ///
    /// Returns the canonical vector (the best-aligned signed permutation of
    /// the rule digits) on a match.
    #[must_use]
    pub fn matches(
        &self,
        measured: &Vector3,
        surfaces: usize,
        min_cosine: f64,
    ) -> Option<BurgersVector> {
        if !self.surfaces.contains(&surfaces) || self.denominator == 0 {
            return None;
        }
        let ideal = self.ideal_length();
        if ideal <= 0.0 {
            return None;
        }
        let ratio = measured.norm() / ideal;
        if ratio < self.fraction.0 || ratio > self.fraction.1 {
            return None;
        }

        let mut best: Option<([i32; 3], f64)> = None;
        for candidate in signed_permutations(self.digits) {
            let v = Vector3::new(
                f64::from(candidate[0]),
                f64::from(candidate[1]),
                f64::from(candidate[2]),
            );
            let Some(c) = cosine(measured, &v) else {
                continue;
            };
            if best.map_or(true, |(_, bc)| c > bc) {
                best = Some((candidate, c));
            }
        }

        match best {
            Some((direction, c)) if c >= min_cosine => {
                Some(BurgersVector::new(self.denominator, direction, self.kind))
            }
            _ => None,
        }
    }
}

/// Classifies a measured crystal-frame vector against an ordered table.
///
/// The first matching rule wins; without a match the result is
/// [`BurgersVector::undefined`].
#[must_use]
pub fn classify(
    table: &[BurgersPattern],
    measured: &Vector3,
    surfaces: usize,
    min_cosine: f64,
) -> BurgersVector {
    table
        .iter()
        .find_map(|rule| rule.matches(measured, surfaces, min_cosine))
        .unwrap_or_else(BurgersVector::undefined)
}

/// All distinct permutations of `digits` with all sign combinations,
/// in a fixed enumeration order.
fn signed_permutations(digits: [u32; 3]) -> Vec<[i32; 3]> {
    const ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let signed = digits.map(|d| i32::try_from(d).unwrap_or(i32::MAX));
    let mut out: Vec<[i32; 3]> = Vec::with_capacity(48);
    for order in ORDERS {
        for signs in 0..8u8 {
            let mut v = [0i32; 3];
            for axis in 0..3 {
                let s = if signs & (1 << axis) == 0 { 1 } else { -1 };
                v[axis] = s * signed[order[axis]];
            }
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

/// Classification table for face-centred cubic crystals.
#[must_use]
pub fn fcc_patterns() -> Vec<BurgersPattern> {
    use BurgersVectorKind::{FullyDefined, PartiallyDefined};
    vec![
        BurgersPattern::new("perfect", 2, [1, 1, 0], (0.7, 1.3), 0..=usize::MAX, FullyDefined),
        BurgersPattern::new("Shockley", 6, [1, 1, 2], (0.6, 1.4), 1..=usize::MAX, FullyDefined),
        BurgersPattern::new("Frank", 3, [1, 1, 1], (0.7, 1.3), 1..=usize::MAX, FullyDefined),
        BurgersPattern::new("stair-rod", 6, [1, 1, 0], (0.6, 1.4), 2..=usize::MAX, FullyDefined),
        BurgersPattern::new("Hirth", 3, [1, 0, 0], (0.6, 1.4), 2..=usize::MAX, FullyDefined),
        BurgersPattern::new("Shockley", 6, [1, 1, 2], (0.6, 1.4), 0..=0, PartiallyDefined),
        BurgersPattern::new("perfect", 2, [1, 1, 0], (0.4, 0.7), 0..=usize::MAX, PartiallyDefined),
    ]
}

/// Classification table for body-centred cubic crystals.
#[must_use]
pub fn bcc_patterns() -> Vec<BurgersPattern> {
    use BurgersVectorKind::{FullyDefined, PartiallyDefined};
    vec![
        BurgersPattern::new("perfect", 2, [1, 1, 1], (0.7, 1.3), 0..=usize::MAX, FullyDefined),
        BurgersPattern::new("junction", 1, [1, 0, 0], (0.7, 1.3), 0..=usize::MAX, FullyDefined),
        BurgersPattern::new("perfect", 2, [1, 1, 1], (0.4, 0.7), 0..=usize::MAX, PartiallyDefined),
    ]
}
