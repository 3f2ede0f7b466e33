use tracing::debug;

use crate::atoms::PlanarAtom;
use crate::error::Result;
use crate::graph::{Dislocation, SkeletonGraph};
use crate::math::{NeighborGrid, PeriodicBox, Point3};

use super::PlanarDefect;

/// Records which dislocations run along which planar defects.
///
/// A dislocation is adjacent to a defect if any of its nodes lies within
/// `distance` of one of the defect's atoms. Both sides get sorted,
/// deduplicated back-references.
#[derive(Debug)]
pub struct LinkPlanarDefects<'a> {
    atoms: &'a [PlanarAtom],
    periodic_box: &'a PeriodicBox,
    distance: f64,
}

impl<'a> LinkPlanarDefects<'a> {
    #[must_use]
    pub fn new(atoms: &'a [PlanarAtom], periodic_box: &'a PeriodicBox, distance: f64) -> Self {
        Self {
            atoms,
            periodic_box,
            distance,
        }
    }

    /// Executes the linking and returns the number of adjacent pairs.
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable distance or if a curve references a
    /// removed node.
    pub fn execute(
        &self,
        graph: &SkeletonGraph,
        defects: &mut [PlanarDefect],
        dislocations: &mut [Dislocation],
    ) -> Result<usize> {
        if defects.is_empty() || self.atoms.is_empty() {
            return Ok(0);
        }
        let mut defect_of: Vec<Option<usize>> = vec![None; self.atoms.len()];
        for (slot, defect) in defects.iter().enumerate() {
            for &a in &defect.atoms {
                if let Some(entry) = defect_of.get_mut(a) {
                    *entry = Some(slot);
                }
            }
        }
        let positions: Vec<Point3> = self.atoms.iter().map(|a| a.position).collect();
        let grid = NeighborGrid::new(&positions, self.distance, self.periodic_box)?;

        let mut pairs = 0;
        for d in dislocations.iter_mut() {
            let mut slots = Vec::new();
            for &id in &d.nodes {
                let p = graph.node(id)?.position;
                slots.extend(grid.within(&p).iter().filter_map(|n| defect_of[n.index]));
            }
            slots.sort_unstable();
            slots.dedup();

            d.planar_defects = slots.iter().map(|&s| defects[s].id).collect();
            for &s in &slots {
                defects[s].dislocations.push(d.id);
            }
            pairs += slots.len();
        }
        for defect in defects.iter_mut() {
            defect.dislocations.sort_unstable();
            defect.dislocations.dedup();
        }

        debug!(pairs, "linked dislocations to planar defects");
        Ok(pairs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::math::Vector3;

    #[test]
    fn curve_touching_a_defect_is_linked() {
        let pbox = PeriodicBox::fully_periodic(Vector3::new(30.0, 30.0, 30.0)).unwrap();
        let atoms: Vec<PlanarAtom> = (0..4)
            .map(|i| PlanarAtom::new(Point3::new(5.0 + f64::from(i), 5.0, 5.0), 1))
            .collect();
        let mut defects = vec![PlanarDefect {
            id: 0,
            normal: Vector3::z(),
            family: None,
            atoms: vec![0, 1, 2, 3],
            faces: Vec::new(),
            dislocations: Vec::new(),
        }];

        let mut g = SkeletonGraph::new();
        let near: Vec<NodeId> = (0..3)
            .map(|i| g.add_node(Point3::new(5.0 + f64::from(i), 5.8, 5.0), vec![], None))
            .collect();
        let far: Vec<NodeId> = (0..3)
            .map(|i| g.add_node(Point3::new(5.0 + f64::from(i), 15.0, 5.0), vec![], None))
            .collect();
        let mut curves = vec![Dislocation::new(0, near), Dislocation::new(1, far)];

        let pairs = LinkPlanarDefects::new(&atoms, &pbox, 1.2)
            .execute(&g, &mut defects, &mut curves)
            .unwrap();
        assert_eq!(pairs, 1);
        assert_eq!(curves[0].planar_defects, vec![0]);
        assert!(curves[1].planar_defects.is_empty());
        assert_eq!(defects[0].dislocations, vec![0]);
    }
}
