use tracing::debug;

use crate::error::Result;
use crate::graph::{NodeId, SkeletonGraph};
use crate::math::PeriodicBox;
use crate::settings::PruneSettings;

/// Counts of what a prune run removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Short edges at junctions that were contracted.
    pub collapsed_edges: usize,
    /// Nodes removed as part of short dangling chains.
    pub whisker_nodes: usize,
    /// Nodes removed as part of tiny disconnected fragments.
    pub fragment_nodes: usize,
}

/// Removes artifacts left over by contraction: clusters of junction nodes
/// sitting on top of each other, short whiskers and tiny fragments.
#[derive(Debug)]
pub struct Prune<'a> {
    periodic_box: &'a PeriodicBox,
    cutoff: f64,
    merge_tolerance: f64,
    settings: PruneSettings,
}

impl<'a> Prune<'a> {
    /// Creates a new prune step. `merge_tolerance` is the contraction merge
    /// distance as a multiple of `cutoff`.
    #[must_use]
    pub fn new(
        periodic_box: &'a PeriodicBox,
        cutoff: f64,
        merge_tolerance: f64,
        settings: PruneSettings,
    ) -> Self {
        Self {
            periodic_box,
            cutoff,
            merge_tolerance,
            settings,
        }
    }

    /// Runs all prune steps in order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph structure is inconsistent.
    pub fn execute(&self, graph: &mut SkeletonGraph) -> Result<PruneReport> {
        let report = PruneReport {
            collapsed_edges: self.collapse_junction_edges(graph)?,
            whisker_nodes: self.remove_whiskers(graph)?,
            fragment_nodes: self.remove_fragments(graph)?,
        };
        debug!(?report, nodes = graph.len(), "pruned skeleton");
        Ok(report)
    }

    /// Contracts edges shorter than the merge tolerance whose nodes are both
    /// critical, at least one of them a junction. The surviving node moves
    /// to the edge midpoint. Candidate edges are collected once per sweep;
    /// sweeps repeat until nothing collapses.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph structure is inconsistent.
    pub fn collapse_junction_edges(&self, graph: &mut SkeletonGraph) -> Result<usize> {
        let limit = self.merge_tolerance * self.cutoff;
        let limit_sq = limit * limit;
        let mut collapsed = 0;

        loop {
            let mut swept = 0;
            for edge in graph.edges() {
                // earlier collapses in this sweep may have removed or
                // reshaped either node
                let (Ok(a), Ok(b)) = (graph.node(edge.first), graph.node(edge.second)) else {
                    continue;
                };
                let (da, db) = (a.degree(), b.degree());
                if da == 2 || db == 2 || da.max(db) < 3 {
                    continue;
                }
                if self.periodic_box.distance_squared(&a.position, &b.position) >= limit_sq {
                    continue;
                }
                let (a_pos, b_pos) = (a.position, b.position);

                // keep the better connected node, or the older one on a tie
                let (keep, keep_pos, drop_pos, drop) = if db > da {
                    (edge.second, b_pos, a_pos, edge.first)
                } else {
                    (edge.first, a_pos, b_pos, edge.second)
                };
                let mid = keep_pos + self.periodic_box.delta(&keep_pos, &drop_pos) * 0.5;
                graph.merge(drop, keep)?;
                graph.node_mut(keep)?.position = self.periodic_box.wrap(&mid);
                swept += 1;
            }
            if swept == 0 {
                break;
            }
            collapsed += swept;
        }
        Ok(collapsed)
    }

    /// Removes dangling chains attached to a junction whose length is below
    /// the whisker length. Repeats until stable, since removing a whisker
    /// can turn its junction into an ordinary curve node.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph structure is inconsistent.
    pub fn remove_whiskers(&self, graph: &mut SkeletonGraph) -> Result<usize> {
        let max_len = self.settings.whisker_length * self.cutoff;
        let mut removed = 0;

        loop {
            let mut victims: Option<Vec<NodeId>> = None;
            for id in graph.sorted_ids() {
                if graph.degree(id) != 1 {
                    continue;
                }
                if let Some(chain) = self.short_whisker(graph, id, max_len) {
                    victims = Some(chain);
                    break;
                }
            }
            let Some(chain) = victims else {
                break;
            };
            for id in chain {
                graph.remove_node(id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Walks from a free ending along degree-2 nodes. Returns the walked
    /// nodes if the walk reaches a junction within `max_len`.
    fn short_whisker(&self, graph: &SkeletonGraph, start: NodeId, max_len: f64) -> Option<Vec<NodeId>> {
        let mut chain = vec![start];
        let mut prev = start;
        let mut current = *graph.node(start).ok()?.neighbors.first()?;
        let mut length = 0.0;

        loop {
            let p = graph.node(prev).ok()?.position;
            let node = graph.node(current).ok()?;
            length += self.periodic_box.distance_squared(&p, &node.position).sqrt();
            if length >= max_len {
                return None;
            }
            match node.degree() {
                2 => {
                    let next = node.neighbors.iter().copied().find(|&n| n != prev)?;
                    chain.push(current);
                    prev = current;
                    current = next;
                    if current == start {
                        return None;
                    }
                }
                d if d >= 3 => return Some(chain),
                _ => return None,
            }
        }
    }

    /// Removes connected components with fewer than the minimum node count.
    ///
    /// # Errors
    ///
    /// Returns an error only if the graph structure is inconsistent.
    pub fn remove_fragments(&self, graph: &mut SkeletonGraph) -> Result<usize> {
        let mut removed = 0;
        for component in graph.components() {
            if component.len() >= self.settings.min_fragment_nodes {
                continue;
            }
            for id in component {
                graph.remove_node(id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vector3};

    fn test_box() -> PeriodicBox {
        PeriodicBox::fully_periodic(Vector3::new(40.0, 40.0, 40.0)).unwrap()
    }

    fn add_path(g: &mut SkeletonGraph, points: &[Point3]) -> Vec<NodeId> {
        let ids: Vec<NodeId> = points.iter().map(|p| g.add_node(*p, vec![], None)).collect();
        for w in ids.windows(2) {
            g.connect(w[0], w[1]).unwrap();
        }
        ids
    }

    #[allow(clippy::cast_precision_loss)]
    fn line(from: Point3, step: Vector3, n: usize) -> Vec<Point3> {
        (0..n).map(|i| from + step * i as f64).collect()
    }

    #[test]
    fn coincident_arm_ends_collapse_into_one_junction() {
        let mut g = SkeletonGraph::new();
        let c = Point3::new(20.0, 20.0, 20.0);
        let dirs = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-0.5, 0.866, 0.0),
            Vector3::new(-0.5, -0.866, 0.0),
        ];
        let mut ends = Vec::new();
        for (k, d) in dirs.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let start = c + d * (0.01 * k as f64);
            let mut pts = vec![start];
            pts.extend(line(c + d, *d, 5));
            ends.push(add_path(&mut g, &pts)[0]);
        }
        g.connect(ends[0], ends[1]).unwrap();
        g.connect(ends[1], ends[2]).unwrap();
        g.connect(ends[2], ends[0]).unwrap();

        let pbox = test_box();
        let prune = Prune::new(&pbox, 1.5, 0.1, PruneSettings::default());
        assert_eq!(prune.collapse_junction_edges(&mut g).unwrap(), 1);
        let junctions: Vec<_> = g.live().iter().filter(|&&id| g.degree(id) >= 3).collect();
        assert_eq!(junctions.len(), 1);
        assert_eq!(g.degree(*junctions[0]), 3);
        g.check_symmetry().unwrap();
    }

    #[test]
    fn short_edge_to_curve_node_is_kept() {
        let mut g = SkeletonGraph::new();
        let j = g.add_node(Point3::new(20.0, 20.0, 20.0), vec![], None);
        let east = add_path(&mut g, &line(Point3::new(21.0, 20.0, 20.0), Vector3::x(), 3));
        let north = add_path(&mut g, &line(Point3::new(20.0, 21.0, 20.0), Vector3::y(), 3));
        let south = add_path(&mut g, &line(Point3::new(20.0, 19.9, 20.0), -Vector3::y(), 3));
        for arm in [&east, &north, &south] {
            g.connect(j, arm[0]).unwrap();
        }

        let pbox = test_box();
        let prune = Prune::new(&pbox, 1.5, 0.1, PruneSettings::default());
        assert_eq!(prune.collapse_junction_edges(&mut g).unwrap(), 0);
        assert_eq!(g.len(), 10);
        assert!(g.are_connected(j, south[0]));
    }

    #[test]
    fn short_whisker_is_removed() {
        let mut g = SkeletonGraph::new();
        let main = add_path(&mut g, &line(Point3::new(5.0, 5.0, 5.0), Vector3::x(), 9));
        let spur = g.add_node(Point3::new(9.0, 6.0, 5.0), vec![], None);
        g.connect(main[4], spur).unwrap();

        let pbox = test_box();
        let prune = Prune::new(&pbox, 1.5, 0.1, PruneSettings::default());
        assert_eq!(prune.remove_whiskers(&mut g).unwrap(), 1);
        assert!(!g.contains(spur));
        assert_eq!(g.degree(main[4]), 2);
        assert_eq!(g.len(), 9);
    }

    #[test]
    fn long_branch_survives() {
        let mut g = SkeletonGraph::new();
        let main = add_path(&mut g, &line(Point3::new(5.0, 5.0, 5.0), Vector3::x(), 9));
        let branch = add_path(&mut g, &line(Point3::new(9.0, 6.0, 5.0), Vector3::y(), 4));
        g.connect(main[4], branch[0]).unwrap();

        let pbox = test_box();
        let prune = Prune::new(&pbox, 1.5, 0.1, PruneSettings::default());
        assert_eq!(prune.remove_whiskers(&mut g).unwrap(), 0);
    }

    #[test]
    fn tiny_fragments_are_dropped() {
        let mut g = SkeletonGraph::new();
        add_path(&mut g, &line(Point3::new(5.0, 5.0, 5.0), Vector3::x(), 6));
        add_path(&mut g, &line(Point3::new(5.0, 15.0, 5.0), Vector3::x(), 2));
        g.add_node(Point3::new(30.0, 30.0, 30.0), vec![], None);

        let pbox = test_box();
        let prune = Prune::new(&pbox, 1.5, 0.1, PruneSettings::default());
        assert_eq!(prune.remove_fragments(&mut g).unwrap(), 3);
        assert_eq!(g.len(), 6);
    }
}
