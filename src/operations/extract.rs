use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::{Dislocation, Edge, NodeId, SkeletonGraph};

/// Decomposes the contracted skeleton graph into dislocation polylines.
///
/// Walks start at nodes of degree other than two, in serial order; edges
/// left over afterwards belong to closed loops without any junction and
/// are walked starting from their lowest-serial edge. Every edge ends up in
/// exactly one dislocation.
#[derive(Debug, Default)]
pub struct ExtractDislocations {
    first_id: usize,
}

impl ExtractDislocations {
    /// Creates a new extraction; dislocation ids start at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id given to the first extracted dislocation.
    #[must_use]
    pub fn first_id(mut self, id: usize) -> Self {
        self.first_id = id;
        self
    }

    /// Executes the extraction.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::InvalidDislocation` if a walk gets stuck, which
    /// only happens for an asymmetric adjacency.
    pub fn execute(&self, graph: &SkeletonGraph) -> Result<Vec<Dislocation>> {
        let mut remaining: BTreeSet<Edge> = graph.edges();
        let total_edges = remaining.len();
        let mut dislocations = Vec::new();

        for start in graph.sorted_ids() {
            if graph.degree(start) == 2 {
                continue;
            }
            while let Some(first) = next_edge(graph, &remaining, start)? {
                let nodes = walk(graph, &mut remaining, start, first)?;
                dislocations.push(Dislocation::new(self.first_id + dislocations.len(), nodes));
            }
        }

        while let Some(edge) = remaining.first().copied() {
            let nodes = walk(graph, &mut remaining, edge.first, edge.second)?;
            dislocations.push(Dislocation::new(self.first_id + dislocations.len(), nodes));
        }

        debug!(
            edges = total_edges,
            dislocations = dislocations.len(),
            "extracted dislocation polylines"
        );
        Ok(dislocations)
    }
}

/// Lowest-serial neighbor of `node` still connected by an unconsumed edge.
fn next_edge(graph: &SkeletonGraph, remaining: &BTreeSet<Edge>, node: NodeId) -> Result<Option<NodeId>> {
    let here = graph.node(node)?;
    let mut best: Option<(u32, NodeId)> = None;
    for &n in &here.neighbors {
        let serial = graph.node(n)?.serial;
        let edge = Edge::new((node, here.serial), (n, serial));
        if remaining.contains(&edge) && best.map_or(true, |(s, _)| serial < s) {
            best = Some((serial, n));
        }
    }
    Ok(best.map(|(_, n)| n))
}

/// Walks from `start` over `first` through degree-2 nodes, consuming edges,
/// until a node of another degree is reached or the walk returns to `start`.
fn walk(
    graph: &SkeletonGraph,
    remaining: &mut BTreeSet<Edge>,
    start: NodeId,
    first: NodeId,
) -> Result<Vec<NodeId>> {
    let edge_of = |a: NodeId, b: NodeId| Edge::new((a, graph.serial(a)), (b, graph.serial(b)));

    remaining.remove(&edge_of(start, first));
    let mut nodes = vec![start, first];
    let mut current = first;

    while current != start && graph.degree(current) == 2 {
        let Some(next) = next_edge(graph, remaining, current)? else {
            return Err(GraphError::InvalidDislocation(format!(
                "walk stuck at node {}",
                graph.serial(current)
            ))
            .into());
        };
        remaining.remove(&edge_of(current, next));
        nodes.push(next);
        current = next;
    }
    Ok(nodes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use std::collections::HashSet;

    fn add_path(g: &mut SkeletonGraph, n: usize, y: f64) -> Vec<NodeId> {
        #[allow(clippy::cast_precision_loss)]
        let ids: Vec<NodeId> = (0..n)
            .map(|i| g.add_node(Point3::new(i as f64, y, 0.0), vec![i], None))
            .collect();
        for w in ids.windows(2) {
            g.connect(w[0], w[1]).unwrap();
        }
        ids
    }

    /// Every pre-extraction edge is covered exactly once and interior nodes
    /// have degree two.
    fn assert_total(g: &SkeletonGraph, dislocations: &[Dislocation]) {
        let mut covered = HashSet::new();
        for d in dislocations {
            for w in d.nodes.windows(2) {
                let e = Edge::new((w[0], g.serial(w[0])), (w[1], g.serial(w[1])));
                assert!(covered.insert(e), "edge covered twice");
            }
            for &id in d.interior() {
                assert_eq!(g.degree(id), 2);
            }
        }
        assert_eq!(covered.len(), g.edges().len());
    }

    #[test]
    fn open_chain_gives_one_curve() {
        let mut g = SkeletonGraph::new();
        let ids = add_path(&mut g, 6, 0.0);
        let d = ExtractDislocations::new().execute(&g).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].nodes, ids);
        assert_total(&g, &d);
    }

    #[test]
    fn pure_loop_is_closed() {
        let mut g = SkeletonGraph::new();
        let ids = add_path(&mut g, 5, 0.0);
        g.connect(ids[4], ids[0]).unwrap();
        let d = ExtractDislocations::new().execute(&g).unwrap();
        assert_eq!(d.len(), 1);
        assert!(d[0].is_closed());
        assert_eq!(d[0].start(), Some(ids[0]));
        assert_eq!(d[0].nodes.len(), 6);
        assert_total(&g, &d);
    }

    #[test]
    fn junction_splits_curves() {
        let mut g = SkeletonGraph::new();
        let main = add_path(&mut g, 7, 0.0);
        let branch = add_path(&mut g, 3, 5.0);
        g.connect(main[3], branch[0]).unwrap();
        let d = ExtractDislocations::new().execute(&g).unwrap();
        assert_eq!(d.len(), 3);
        for curve in &d {
            let touches = curve.start() == Some(main[3]) || curve.end() == Some(main[3]);
            assert!(touches);
        }
        assert_total(&g, &d);
    }

    #[test]
    fn loop_attached_to_junction() {
        let mut g = SkeletonGraph::new();
        let tail = add_path(&mut g, 4, 0.0);
        let ring = add_path(&mut g, 4, 3.0);
        g.connect(tail[3], ring[0]).unwrap();
        g.connect(ring[3], tail[3]).unwrap();
        let d = ExtractDislocations::new().execute(&g).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.iter().filter(|c| c.is_closed()).count(), 1);
        assert_total(&g, &d);
    }
}
