use rayon::prelude::*;
use tracing::debug;

use crate::atoms::{same_grain, DefectAtom};
use crate::error::{OperationError, Result};
use crate::graph::{NodeId, SkeletonGraph};
use crate::math::{NeighborGrid, PeriodicBox, Point3};

/// Builds the initial skeleton graph: one node per defect atom, connected
/// to every other node within the cutoff.
#[derive(Debug)]
pub struct BuildSkeleton<'a> {
    atoms: &'a [DefectAtom],
    cutoff: f64,
    same_grain_only: bool,
}

impl<'a> BuildSkeleton<'a> {
    /// Creates a new build operation.
    #[must_use]
    pub fn new(atoms: &'a [DefectAtom], cutoff: f64) -> Self {
        Self {
            atoms,
            cutoff,
            same_grain_only: false,
        }
    }

    /// Restricts edges to atoms of the same grain.
    #[must_use]
    pub fn same_grain_only(mut self, enabled: bool) -> Self {
        self.same_grain_only = enabled;
        self
    }

    /// Executes the build.
    ///
    /// Neighbor discovery runs in parallel; edges are committed afterwards
    /// in atom order.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for a non-finite atom position
    /// and a geometry error for an unusable cutoff.
    pub fn execute(&self, periodic_box: &PeriodicBox) -> Result<SkeletonGraph> {
        if let Some(i) = self
            .atoms
            .iter()
            .position(|a| a.position.iter().any(|c| !c.is_finite()))
        {
            return Err(OperationError::InvalidInput(format!(
                "defect atom {i} has a non-finite position"
            ))
            .into());
        }

        let positions: Vec<Point3> = self
            .atoms
            .iter()
            .map(|a| periodic_box.wrap(&a.position))
            .collect();
        let grid = NeighborGrid::new(&positions, self.cutoff, periodic_box)?;

        let mut graph = SkeletonGraph::new();
        let ids: Vec<NodeId> = self
            .atoms
            .iter()
            .zip(&positions)
            .enumerate()
            .map(|(i, (atom, p))| graph.add_node(*p, vec![i], atom.grain))
            .collect();

        let neighbor_lists: Vec<Vec<usize>> = (0..positions.len())
            .into_par_iter()
            .map(|i| {
                grid.neighbors_of(i)
                    .into_iter()
                    .map(|n| n.index)
                    .filter(|&j| j > i)
                    .filter(|&j| {
                        !self.same_grain_only
                            || same_grain(self.atoms[i].grain, self.atoms[j].grain)
                    })
                    .collect()
            })
            .collect();

        let mut edge_count = 0usize;
        for (i, list) in neighbor_lists.iter().enumerate() {
            for &j in list {
                if graph.connect(ids[i], ids[j])? {
                    edge_count += 1;
                }
            }
        }

        debug!(
            nodes = graph.len(),
            edges = edge_count,
            cutoff = self.cutoff,
            "built skeleton graph"
        );
        Ok(graph)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    fn test_box() -> PeriodicBox {
        PeriodicBox::fully_periodic(Vector3::new(50.0, 50.0, 50.0)).unwrap()
    }

    #[test]
    fn line_of_atoms_becomes_chain() {
        let atoms: Vec<DefectAtom> = (0..10)
            .map(|i| DefectAtom::new(Point3::new(10.0 + f64::from(i), 5.0, 5.0)))
            .collect();
        let g = BuildSkeleton::new(&atoms, 1.5).execute(&test_box()).unwrap();
        assert_eq!(g.len(), 10);
        assert_eq!(g.edges().len(), 9);
        g.check_symmetry().unwrap();
    }

    #[test]
    fn grain_boundary_is_not_bridged() {
        let atoms = vec![
            DefectAtom::new(Point3::new(1.0, 1.0, 1.0)).with_grain(0),
            DefectAtom::new(Point3::new(2.0, 1.0, 1.0)).with_grain(1),
            DefectAtom::new(Point3::new(3.0, 1.0, 1.0)).with_grain(1),
        ];
        let restricted = BuildSkeleton::new(&atoms, 1.5)
            .same_grain_only(true)
            .execute(&test_box())
            .unwrap();
        assert_eq!(restricted.edges().len(), 1);
        let bridged = BuildSkeleton::new(&atoms, 1.5).execute(&test_box()).unwrap();
        assert_eq!(bridged.edges().len(), 2);
    }

    #[test]
    fn rejects_nan_position() {
        let atoms = vec![DefectAtom::new(Point3::new(f64::NAN, 0.0, 0.0))];
        assert!(BuildSkeleton::new(&atoms, 1.5).execute(&test_box()).is_err());
    }
}
