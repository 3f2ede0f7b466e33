use crate::atoms::DefectAtom;
use crate::error::Result;
use crate::graph::{Dislocation, SkeletonGraph};
use crate::math::{PeriodicBox, Vector3};

use super::tangent_at;

/// Average resultant Burgers vector of a curve with respect to its node
/// order.
///
/// Each interior node contributes the mean RBV displacement of its mapped
/// atoms, every sample flipped so that it refers to the local curve
/// tangent. Returns `None` if no interior node carries a sample.
///
/// # Errors
///
/// Returns an error if the curve references a removed node.
#[allow(clippy::cast_precision_loss)]
pub fn average_rbv(
    graph: &SkeletonGraph,
    atoms: &[DefectAtom],
    periodic_box: &PeriodicBox,
    dislocation: &Dislocation,
) -> Result<Option<Vector3>> {
    let mut total = Vector3::zeros();
    let mut nodes = 0usize;

    for i in 1..dislocation.nodes.len().saturating_sub(1) {
        let tangent = tangent_at(graph, periodic_box, dislocation, i)?;
        let node = graph.node(dislocation.nodes[i])?;
        let mut sum = Vector3::zeros();
        let mut samples = 0usize;
        for rbv in node
            .mapped_atoms
            .iter()
            .filter_map(|&a| atoms.get(a).and_then(|atom| atom.rbv))
        {
            sum += rbv.oriented_along(&tangent);
            samples += 1;
        }
        if samples > 0 {
            total += sum / samples as f64;
            nodes += 1;
        }
    }

    if nodes == 0 {
        return Ok(None);
    }
    let average = total / nodes as f64;
    Ok(average.iter().all(|c| c.is_finite()).then_some(average))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::atoms::Rbv;
    use crate::graph::NodeId;
    use crate::math::Point3;

    #[test]
    fn samples_are_flipped_onto_the_tangent() {
        let pbox = PeriodicBox::fully_periodic(Vector3::new(20.0, 20.0, 20.0)).unwrap();
        let b = Vector3::new(0.5, 0.5, 0.0);
        let mut atoms = Vec::new();
        let mut g = SkeletonGraph::new();
        let mut ids: Vec<NodeId> = Vec::new();
        for i in 0..5 {
            let p = Point3::new(2.0 + f64::from(i), 3.0, 3.0);
            // odd atoms report the opposite line direction and displacement
            let rbv = if i % 2 == 0 {
                Rbv::new(Vector3::x(), b)
            } else {
                Rbv::new(-Vector3::x(), -b)
            };
            atoms.push(DefectAtom::new(p).with_rbv(rbv));
            ids.push(g.add_node(p, vec![atoms.len() - 1], None));
        }
        // the endpoints carry garbage that must be ignored
        atoms[0].rbv = Some(Rbv::new(Vector3::x(), Vector3::new(9.0, 0.0, 0.0)));

        let d = Dislocation::new(0, ids);
        let avg = average_rbv(&g, &atoms, &pbox, &d).unwrap().unwrap();
        assert!((avg - b).norm() < 1e-12);
    }

    #[test]
    fn no_samples_gives_none() {
        let pbox = PeriodicBox::fully_periodic(Vector3::new(20.0, 20.0, 20.0)).unwrap();
        let mut g = SkeletonGraph::new();
        let ids: Vec<NodeId> = (0..3)
            .map(|i| g.add_node(Point3::new(f64::from(i), 0.0, 0.0), vec![], None))
            .collect();
        let d = Dislocation::new(0, ids);
        assert!(average_rbv(&g, &[], &pbox, &d).unwrap().is_none());
    }
}
