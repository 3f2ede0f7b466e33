use crate::math::Point3;

slotmap::new_key_type! {
    /// Unique identifier for a node in the skeleton graph.
    pub struct NodeId;
}

/// A point of the skeleton, created from one defect atom and grown by
/// absorbing the atoms of the nodes merged into it.
#[derive(Debug, Clone)]
pub struct SkeletonNode {
    /// Creation order; stable for the node's lifetime and used for every
    /// deterministic ordering.
    pub serial: u32,
    /// Current (wrapped) position.
    pub position: Point3,
    /// Indices of the defect atoms represented by this node.
    pub mapped_atoms: Vec<usize>,
    /// Adjacent nodes. Symmetric across the graph.
    pub neighbors: Vec<NodeId>,
    /// Grain of the originating atom, if tagged.
    pub grain: Option<u32>,
}

impl SkeletonNode {
    /// Number of adjacent nodes.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    /// Endpoints and junctions (degree other than two) are critical: they
    /// are neither moved nor merged during contraction.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.neighbors.len() != 2
    }
}
