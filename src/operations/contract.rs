use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::Result;
use crate::graph::{NodeId, SkeletonGraph};
use crate::interrupt::Interrupt;
use crate::math::{PeriodicBox, Vector3, TOLERANCE};
use crate::settings::ContractionSettings;

/// Outcome of a contraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractionReport {
    /// Move passes executed.
    pub iterations: usize,
    /// Nodes removed by merging.
    pub merged: usize,
    /// The move/merge loop reached a fixed point.
    pub converged: bool,
    /// The iteration cap was hit.
    pub capped: bool,
    /// The run was interrupted; the graph holds the last applied state.
    pub cancelled: bool,
}

/// Iteratively pulls non-critical nodes towards their neighbors and merges
/// nodes that end up closer than the merge tolerance.
#[derive(Debug)]
pub struct MeshContraction<'a> {
    periodic_box: &'a PeriodicBox,
    cutoff: f64,
    settings: ContractionSettings,
    interrupt: Interrupt,
}

impl<'a> MeshContraction<'a> {
    /// Creates a new contraction for a skeleton built with `cutoff`.
    #[must_use]
    pub fn new(periodic_box: &'a PeriodicBox, cutoff: f64, settings: ContractionSettings) -> Self {
        Self {
            periodic_box,
            cutoff,
            settings,
            interrupt: Interrupt::new(),
        }
    }

    /// Shares an interrupt flag with the caller.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Runs contraction and merging until a fixed point, the iteration cap
    /// or cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph structure is inconsistent.
    pub fn execute(&self, graph: &mut SkeletonGraph) -> Result<ContractionReport> {
        let mut report = ContractionReport::default();

        'outer: loop {
            loop {
                if report.iterations >= self.settings.max_iterations {
                    report.capped = true;
                    break 'outer;
                }
                if self.interrupt.is_triggered() {
                    report.cancelled = true;
                    break 'outer;
                }
                report.iterations += 1;

                let Some(moved) = self.move_pass(graph) else {
                    report.cancelled = true;
                    break 'outer;
                };
                if moved * self.settings.convergence_divisor <= graph.len() {
                    break;
                }
            }

            if self.interrupt.is_triggered() {
                report.cancelled = true;
                break;
            }
            let merged = self.merge_pass(graph)?;
            report.merged += merged;
            debug!(
                iteration = report.iterations,
                merged,
                nodes = graph.len(),
                "contraction merge pass"
            );
            if merged == 0 {
                report.converged = true;
                break;
            }
        }

        if report.capped {
            warn!(
                iterations = report.iterations,
                "mesh contraction hit the iteration cap, continuing with best-effort mesh"
            );
        }
        Ok(report)
    }

    /// One move pass. Displacements are computed in parallel against the
    /// positions at the start of the pass and applied afterwards.
    ///
    /// Returns the number of moved nodes, or `None` if the pass was
    /// interrupted (nothing is applied then).
    pub fn move_pass(&self, graph: &mut SkeletonGraph) -> Option<usize> {
        let snapshot: &SkeletonGraph = graph;
        let deltas: Vec<Option<(NodeId, Vector3)>> = snapshot
            .live()
            .par_iter()
            .map(|&id| {
                if self.interrupt.is_triggered() {
                    return None;
                }
                Some(self.displacement(snapshot, id).map(|d| (id, d)))
            })
            .collect::<Option<Vec<_>>>()?;

        let mut moved = 0usize;
        for (id, d) in deltas.into_iter().flatten() {
            if let Ok(node) = graph.node_mut(id) {
                node.position = self.periodic_box.wrap(&(node.position + d));
                moved += 1;
            }
        }
        Some(moved)
    }

    /// Inverse-square weighted pull of a non-critical node, or `None` if
    /// the node is critical or already converged.
    fn displacement(&self, graph: &SkeletonGraph, id: NodeId) -> Option<Vector3> {
        let node = graph.node(id).ok()?;
        if node.is_critical() {
            return None;
        }

        let mut sum = Vector3::zeros();
        let mut weight_sum = 0.0;
        for &n in &node.neighbors {
            let other = graph.node(n).ok()?;
            let d = self.periodic_box.delta(&node.position, &other.position);
            let len_sq = d.norm_squared();
            if len_sq < TOLERANCE {
                continue;
            }
            let w = 1.0 / len_sq;
            sum += d * w;
            weight_sum += w;
        }
        if weight_sum <= 0.0 {
            return None;
        }

        let d = sum / weight_sum * self.settings.move_scale;
        if !d.iter().all(|c| c.is_finite()) || d.norm_squared() < self.settings.min_move_squared {
            return None;
        }
        Some(d)
    }

    /// One sequential merge pass over the live list.
    ///
    /// Every non-critical node is merged into its nearest non-critical
    /// neighbor that shares a common neighbor with it, if that neighbor is
    /// closer than the merge tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph structure is inconsistent.
    pub fn merge_pass(&self, graph: &mut SkeletonGraph) -> Result<usize> {
        let limit = self.settings.merge_tolerance * self.cutoff;
        let limit_sq = limit * limit;
        let mut merged = 0usize;

        let mut i = 0;
        while i < graph.len() {
            let id = graph.live()[i];
            match self.merge_partner(graph, id, limit_sq) {
                Some(target) => {
                    graph.merge(id, target)?;
                    merged += 1;
                    // a different node was swapped into slot i
                }
                None => i += 1,
            }
        }
        Ok(merged)
    }

    fn merge_partner(&self, graph: &SkeletonGraph, id: NodeId, limit_sq: f64) -> Option<NodeId> {
        let node = graph.node(id).ok()?;
        if node.is_critical() {
            return None;
        }

        let mut best: Option<(NodeId, f64, u32)> = None;
        for &n in &node.neighbors {
            let other = graph.node(n).ok()?;
            if other.is_critical() {
                continue;
            }
            let shares_neighbor = node
                .neighbors
                .iter()
                .any(|x| *x != n && other.neighbors.contains(x));
            if !shares_neighbor {
                continue;
            }
            let dist_sq = self.periodic_box.distance_squared(&node.position, &other.position);
            let better = best.map_or(true, |(_, bd, bs)| {
                dist_sq < bd || (dist_sq == bd && other.serial < bs)
            });
            if better {
                best = Some((n, dist_sq, other.serial));
            }
        }

        best.filter(|&(_, d, _)| d < limit_sq).map(|(n, _, _)| n)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;

    fn test_box() -> PeriodicBox {
        PeriodicBox::fully_periodic(Vector3::new(40.0, 40.0, 40.0)).unwrap()
    }

    fn path(points: &[Point3]) -> (SkeletonGraph, Vec<NodeId>) {
        let mut g = SkeletonGraph::new();
        let ids: Vec<NodeId> = points
            .iter()
            .enumerate()
            .map(|(i, p)| g.add_node(*p, vec![i], None))
            .collect();
        for w in ids.windows(2) {
            g.connect(w[0], w[1]).unwrap();
        }
        (g, ids)
    }

    #[test]
    fn straight_line_does_not_move() {
        let points: Vec<Point3> = (0..10)
            .map(|i| Point3::new(5.0 + f64::from(i), 5.0, 5.0))
            .collect();
        let (mut g, _) = path(&points);
        let pbox = test_box();
        let contraction = MeshContraction::new(&pbox, 1.5, ContractionSettings::default());
        assert_eq!(contraction.move_pass(&mut g), Some(0));
        let report = contraction.execute(&mut g).unwrap();
        assert!(report.converged);
        assert_eq!(g.len(), 10);
    }

    #[test]
    fn kinked_node_is_pulled_towards_neighbors() {
        let points = vec![
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(6.0, 6.0, 5.0),
            Point3::new(7.0, 5.0, 5.0),
        ];
        let (mut g, ids) = path(&points);
        let pbox = test_box();
        let contraction = MeshContraction::new(&pbox, 1.5, ContractionSettings::default());
        assert_eq!(contraction.move_pass(&mut g), Some(1));
        let p = g.node(ids[1]).unwrap().position;
        assert!((p.x - 6.0).abs() < 1e-12);
        assert!((p.y - (6.0 - 1.0 / 3.0)).abs() < 1e-12);
        // endpoints are critical
        assert!((g.node(ids[0]).unwrap().position.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_triangle_is_merged() {
        let mut g = SkeletonGraph::new();
        let a = g.add_node(Point3::new(5.0, 5.0, 5.0), vec![0], None);
        let b = g.add_node(Point3::new(5.05, 5.0, 5.0), vec![1], None);
        let c = g.add_node(Point3::new(5.0, 5.05, 5.0), vec![2], None);
        g.connect(a, b).unwrap();
        g.connect(b, c).unwrap();
        g.connect(c, a).unwrap();
        let pbox = test_box();
        let contraction = MeshContraction::new(&pbox, 1.5, ContractionSettings::default());
        let merged = contraction.merge_pass(&mut g).unwrap();
        assert_eq!(merged, 1);
        assert_eq!(g.len(), 2);
        let total: usize = g.iter().map(|(_, n)| n.mapped_atoms.len()).sum();
        assert_eq!(total, 3);
        g.check_symmetry().unwrap();
    }

    #[test]
    fn interrupted_pass_applies_nothing() {
        let points = vec![
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(6.0, 6.0, 5.0),
            Point3::new(7.0, 5.0, 5.0),
        ];
        let (mut g, ids) = path(&points);
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let pbox = test_box();
        let contraction = MeshContraction::new(&pbox, 1.5, ContractionSettings::default())
            .with_interrupt(interrupt);
        assert_eq!(contraction.move_pass(&mut g), None);
        assert!((g.node(ids[1]).unwrap().position.y - 6.0).abs() < 1e-12);
        let report = contraction.execute(&mut g).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let points = vec![
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(6.0, 6.0, 5.0),
            Point3::new(7.0, 5.0, 5.0),
        ];
        let (mut g, _) = path(&points);
        let settings = ContractionSettings {
            max_iterations: 1,
            ..ContractionSettings::default()
        };
        let report = MeshContraction::new(&test_box(), 1.5, settings)
            .execute(&mut g)
            .unwrap();
        assert!(report.capped);
        assert_eq!(report.iterations, 1);
    }
}
