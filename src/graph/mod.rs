pub mod dislocation;
pub mod edge;
pub mod node;

pub use dislocation::{BurgersVectorInfo, Dislocation};
pub use edge::Edge;
pub use node::{NodeId, SkeletonNode};

use std::collections::BTreeSet;

use slotmap::SlotMap;

use crate::error::GraphError;
use crate::math::Point3;

/// Arena owning all skeleton nodes.
///
/// Nodes reference each other via [`NodeId`] keys. Besides the arena the
/// graph keeps a dense live list; deleting a node swaps the last live node
/// into its slot, so a sequential scan over [`SkeletonGraph::live`] has to
/// re-examine the current slot after a deletion.
#[derive(Debug, Default, Clone)]
pub struct SkeletonGraph {
    nodes: SlotMap<NodeId, SkeletonNode>,
    live: Vec<NodeId>,
    slots: slotmap::SecondaryMap<NodeId, usize>,
    next_serial: u32,
}

impl SkeletonGraph {
    /// Creates a new, empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an unconnected node and returns its ID.
    pub fn add_node(&mut self, position: Point3, mapped_atoms: Vec<usize>, grain: Option<u32>) -> NodeId {
        let serial = self.next_serial;
        self.next_serial += 1;
        let id = self.nodes.insert(SkeletonNode {
            serial,
            position,
            mapped_atoms,
            neighbors: Vec::new(),
            grain,
        });
        self.slots.insert(id, self.live.len());
        self.live.push(id);
        id
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live nodes in slot order.
    #[must_use]
    pub fn live(&self) -> &[NodeId] {
        &self.live
    }

    /// Live nodes sorted by serial.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids = self.live.clone();
        ids.sort_by_key(|&id| self.nodes[id].serial);
        ids
    }

    /// Iterates over `(id, node)` pairs in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SkeletonNode)> {
        self.nodes.iter()
    }

    /// Returns `true` if `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns a reference to the node, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the node was removed or never existed.
    pub fn node(&self, id: NodeId) -> Result<&SkeletonNode, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{id:?}")))
    }

    /// Returns a mutable reference to the node, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the node was removed or never existed.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SkeletonNode, GraphError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{id:?}")))
    }

    /// Degree of a node, zero for unknown IDs.
    #[must_use]
    pub fn degree(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, SkeletonNode::degree)
    }

    /// Serial of a node, `u32::MAX` for unknown IDs.
    #[must_use]
    pub fn serial(&self, id: NodeId) -> u32 {
        self.nodes.get(id).map_or(u32::MAX, |n| n.serial)
    }

    /// Returns `true` if `a` lists `b` as neighbor.
    #[must_use]
    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.nodes.get(a).is_some_and(|n| n.neighbors.contains(&b))
    }

    /// Adds the undirected edge `a - b`.
    ///
    /// Returns `Ok(false)` if the edge already existed.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::SelfLoop` if `a == b`, or an error if either
    /// node is unknown.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<bool, GraphError> {
        let serial = self.node(a)?.serial;
        if a == b {
            return Err(GraphError::SelfLoop(serial));
        }
        self.node(b)?;
        if self.are_connected(a, b) {
            return Ok(false);
        }
        self.node_mut(a)?.neighbors.push(b);
        self.node_mut(b)?.neighbors.push(a);
        Ok(true)
    }

    /// Removes the undirected edge `a - b`, returning whether it existed.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> bool {
        let mut existed = false;
        if let Some(n) = self.nodes.get_mut(a) {
            let before = n.neighbors.len();
            n.neighbors.retain(|&x| x != b);
            existed = n.neighbors.len() != before;
        }
        if let Some(n) = self.nodes.get_mut(b) {
            n.neighbors.retain(|&x| x != a);
        }
        existed
    }

    /// Merges `source` into `target`.
    ///
    /// `target` absorbs the mapped atoms of `source` and inherits all of its
    /// edges (except the one between the two). `source` is removed from the
    /// graph; `target` keeps its position.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::SelfLoop` if both IDs are equal, or an error if
    /// either node is unknown.
    pub fn merge(&mut self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop(self.node(source)?.serial));
        }
        self.node(target)?;
        let removed = self.detach(source)?;

        for &n in &removed.neighbors {
            if n != target {
                self.connect(n, target)?;
            }
        }
        self.node_mut(target)?
            .mapped_atoms
            .extend_from_slice(&removed.mapped_atoms);
        Ok(())
    }

    /// Removes a node and all of its edges, returning its data.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unknown.
    pub fn remove_node(&mut self, id: NodeId) -> Result<SkeletonNode, GraphError> {
        self.detach(id)
    }

    fn detach(&mut self, id: NodeId) -> Result<SkeletonNode, GraphError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(format!("{id:?}")))?;
        for &n in &node.neighbors {
            if let Some(other) = self.nodes.get_mut(n) {
                other.neighbors.retain(|&x| x != id);
            }
        }
        if let Some(slot) = self.slots.remove(id) {
            self.live.swap_remove(slot);
            if let Some(&moved) = self.live.get(slot) {
                self.slots.insert(moved, slot);
            }
        }
        Ok(node)
    }

    /// Deduplicated edge set in ascending serial order.
    #[must_use]
    pub fn edges(&self) -> BTreeSet<Edge> {
        let mut edges = BTreeSet::new();
        for &id in &self.live {
            let node = &self.nodes[id];
            for &n in &node.neighbors {
                if let Some(other) = self.nodes.get(n) {
                    edges.insert(Edge::new((id, node.serial), (n, other.serial)));
                }
            }
        }
        edges
    }

    /// Verifies that every adjacency entry is mirrored and points to a live
    /// node.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::BrokenSymmetry` for the first offending pair.
    pub fn check_symmetry(&self) -> Result<(), GraphError> {
        for (id, node) in &self.nodes {
            for &n in &node.neighbors {
                let mirrored = self.nodes.get(n).is_some_and(|o| o.neighbors.contains(&id));
                if !mirrored || n == id {
                    return Err(GraphError::BrokenSymmetry(node.serial, self.serial(n)));
                }
            }
        }
        Ok(())
    }

    /// Connected components as lists of node IDs, each sorted by serial,
    /// ordered by their smallest serial.
    #[must_use]
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut seen = slotmap::SecondaryMap::new();
        let mut components = Vec::new();
        for start in self.sorted_ids() {
            if seen.contains_key(start) {
                continue;
            }
            seen.insert(start, ());
            let mut stack = vec![start];
            let mut component = Vec::new();
            while let Some(id) = stack.pop() {
                component.push(id);
                for &n in &self.nodes[id].neighbors {
                    if !seen.contains_key(n) {
                        seen.insert(n, ());
                        stack.push(n);
                    }
                }
            }
            component.sort_by_key(|&id| self.nodes[id].serial);
            components.push(component);
        }
        components
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chain(len: usize) -> (SkeletonGraph, Vec<NodeId>) {
        let mut g = SkeletonGraph::new();
        #[allow(clippy::cast_precision_loss)]
        let ids: Vec<NodeId> = (0..len)
            .map(|i| g.add_node(Point3::new(i as f64, 0.0, 0.0), vec![i], None))
            .collect();
        for w in ids.windows(2) {
            g.connect(w[0], w[1]).unwrap();
        }
        (g, ids)
    }

    #[test]
    fn connect_rejects_self_loop() {
        let (mut g, ids) = chain(2);
        assert!(matches!(g.connect(ids[0], ids[0]), Err(GraphError::SelfLoop(0))));
        assert!(!g.connect(ids[0], ids[1]).unwrap());
    }

    #[test]
    fn merge_transfers_atoms_and_edges() {
        let (mut g, ids) = chain(4);
        g.merge(ids[1], ids[2]).unwrap();
        assert_eq!(g.len(), 3);
        assert!(!g.contains(ids[1]));
        assert!(g.are_connected(ids[0], ids[2]));
        let mut atoms = g.node(ids[2]).unwrap().mapped_atoms.clone();
        atoms.sort_unstable();
        assert_eq!(atoms, vec![1, 2]);
        g.check_symmetry().unwrap();
    }

    #[test]
    fn merge_keeps_atom_total() {
        let (mut g, ids) = chain(6);
        g.merge(ids[2], ids[3]).unwrap();
        g.merge(ids[3], ids[4]).unwrap();
        let total: usize = g.iter().map(|(_, n)| n.mapped_atoms.len()).sum();
        assert_eq!(total, 6);
        assert_eq!(g.len(), 4);
        g.check_symmetry().unwrap();
    }

    #[test]
    fn removal_swaps_last_into_slot() {
        let (mut g, ids) = chain(4);
        g.remove_node(ids[0]).unwrap();
        assert_eq!(g.live()[0], ids[3]);
        g.remove_node(ids[3]).unwrap();
        assert_eq!(g.live(), &[ids[2], ids[1]]);
        assert_eq!(g.degree(ids[2]), 1);
        g.check_symmetry().unwrap();
    }

    #[test]
    fn edges_are_deduplicated_and_ordered() {
        let (g, _) = chain(4);
        let serials: Vec<(u32, u32)> = g.edges().iter().map(|e| e.serials).collect();
        assert_eq!(serials, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn components_split_at_gap() {
        let (mut g, ids) = chain(5);
        g.disconnect(ids[1], ids[2]);
        let comps = g.components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![ids[0], ids[1]]);
        assert_eq!(comps[1].len(), 3);
    }
}
