use crate::crystal::{classify, BurgersVector, CrystalStructure};
use crate::graph::Dislocation;

/// Classifies the averaged vector of one curve against the crystal's
/// pattern table. The adjacent planar defects of the curve select the
/// surface-count dependent rules.
#[must_use]
pub fn classify_curve(
    crystal: &CrystalStructure,
    dislocation: &Dislocation,
    min_cosine: f64,
) -> BurgersVector {
    let Some(average) = dislocation.burgers.average else {
        return BurgersVector::undefined();
    };
    let measured = crystal.to_crystal(&average);
    classify(
        crystal.patterns(),
        &measured,
        dislocation.planar_defects.len(),
        min_cosine,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crystal::BurgersVectorKind;
    use crate::math::Vector3;

    #[test]
    fn uses_lattice_units() {
        let crystal = CrystalStructure::fcc(4.0).unwrap();
        let mut d = Dislocation::new(0, Vec::new());
        d.burgers.average = Some(Vector3::new(2.0, 0.0, -2.0));
        let b = classify_curve(&crystal, &d, 0.95);
        assert_eq!(b, BurgersVector::new(2, [1, 0, -1], BurgersVectorKind::FullyDefined));
    }

    #[test]
    fn missing_average_is_undefined() {
        let crystal = CrystalStructure::fcc(4.0).unwrap();
        let d = Dislocation::new(0, Vec::new());
        assert_eq!(classify_curve(&crystal, &d, 0.95).kind(), BurgersVectorKind::Undefined);
    }
}
