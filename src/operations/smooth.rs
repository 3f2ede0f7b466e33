use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::graph::{Dislocation, NodeId, SkeletonGraph};
use crate::math::{PeriodicBox, Point3};
use crate::settings::SmoothingSettings;

/// Damped Laplacian smoothing of dislocation curves.
///
/// Every interior node moves by `factor` times the sum of the vectors to
/// its two curve neighbors. Endpoints and junctions stay in place.
#[derive(Debug)]
pub struct SmoothDislocations<'a> {
    periodic_box: &'a PeriodicBox,
    settings: SmoothingSettings,
}

impl<'a> SmoothDislocations<'a> {
    /// Creates a new smoothing step.
    #[must_use]
    pub fn new(periodic_box: &'a PeriodicBox, settings: SmoothingSettings) -> Self {
        Self {
            periodic_box,
            settings,
        }
    }

    /// Runs the configured number of passes and returns the number of node
    /// updates applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a dislocation references a removed node.
    pub fn execute(&self, graph: &mut SkeletonGraph, dislocations: &[Dislocation]) -> Result<usize> {
        let mut updates = 0;
        for _ in 0..self.settings.passes {
            updates += self.pass(graph, dislocations)?;
        }
        debug!(
            passes = self.settings.passes,
            updates,
            "smoothed dislocation curves"
        );
        Ok(updates)
    }

    fn pass(&self, graph: &mut SkeletonGraph, dislocations: &[Dislocation]) -> Result<usize> {
        let snapshot: &SkeletonGraph = graph;
        let moves = dislocations
            .par_iter()
            .map(|d| self.curve_moves(snapshot, d))
            .collect::<Result<Vec<_>>>()?;

        let mut updates = 0;
        for (id, position) in moves.into_iter().flatten() {
            graph.node_mut(id)?.position = position;
            updates += 1;
        }
        Ok(updates)
    }

    /// New positions of the smoothable nodes of one curve, computed from
    /// the unmodified graph.
    fn curve_moves(&self, graph: &SkeletonGraph, d: &Dislocation) -> Result<Vec<(NodeId, Point3)>> {
        let nodes = &d.nodes;
        let mut moves = Vec::with_capacity(nodes.len());
        let mut triples: Vec<(NodeId, NodeId, NodeId)> = nodes
            .windows(3)
            .map(|w| (w[0], w[1], w[2]))
            .collect();
        // the start of a pure loop is an ordinary curve node
        if d.is_closed() && graph.degree(nodes[0]) == 2 {
            triples.push((nodes[nodes.len() - 2], nodes[0], nodes[1]));
        }

        for (prev, id, next) in triples {
            let p = graph.node(id)?.position;
            let to_prev = self.periodic_box.delta(&p, &graph.node(prev)?.position);
            let to_next = self.periodic_box.delta(&p, &graph.node(next)?.position);
            let moved = p + (to_prev + to_next) * self.settings.factor;
            if moved.iter().all(|c| c.is_finite()) {
                moves.push((id, self.periodic_box.wrap(&moved)));
            }
        }
        Ok(moves)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;

    fn test_box() -> PeriodicBox {
        PeriodicBox::fully_periodic(Vector3::new(30.0, 30.0, 30.0)).unwrap()
    }

    fn curve(points: &[Point3]) -> (SkeletonGraph, Dislocation) {
        let mut g = SkeletonGraph::new();
        let ids: Vec<NodeId> = points.iter().map(|p| g.add_node(*p, vec![], None)).collect();
        for w in ids.windows(2) {
            g.connect(w[0], w[1]).unwrap();
        }
        (g, Dislocation::new(0, ids))
    }

    #[test]
    fn straight_curve_is_unchanged() {
        let points: Vec<Point3> = (0..8)
            .map(|i| Point3::new(2.0 + 1.5 * f64::from(i), 4.0, 4.0))
            .collect();
        let (mut g, d) = curve(&points);
        SmoothDislocations::new(&test_box(), SmoothingSettings::default())
            .execute(&mut g, std::slice::from_ref(&d))
            .unwrap();
        for (id, expected) in d.nodes.iter().zip(&points) {
            let p = g.node(*id).unwrap().position;
            assert!((p - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn kink_is_damped_and_ends_stay() {
        let points = vec![
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 1.0),
            Point3::new(3.0, 1.0, 1.0),
        ];
        let (mut g, d) = curve(&points);
        let updates = SmoothDislocations::new(&test_box(), SmoothingSettings::default())
            .execute(&mut g, std::slice::from_ref(&d))
            .unwrap();
        assert_eq!(updates, 1);
        let mid = g.node(d.nodes[1]).unwrap().position;
        assert!((mid.y - 1.5).abs() < 1e-12);
        assert!((g.node(d.nodes[0]).unwrap().position - points[0]).norm() < 1e-12);
    }

    #[test]
    fn smoothing_works_across_the_boundary() {
        let points = vec![
            Point3::new(29.0, 5.0, 5.0),
            Point3::new(0.0, 6.0, 5.0),
            Point3::new(1.0, 5.0, 5.0),
        ];
        let (mut g, d) = curve(&points);
        SmoothDislocations::new(&test_box(), SmoothingSettings::default())
            .execute(&mut g, std::slice::from_ref(&d))
            .unwrap();
        let mid = g.node(d.nodes[1]).unwrap().position;
        assert!(mid.x.abs() < 1e-12);
        assert!((mid.y - 5.5).abs() < 1e-12);
    }
}
