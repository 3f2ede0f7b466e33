use super::node::NodeId;

/// Undirected edge between two skeleton nodes.
///
/// Stored with the smaller serial first so that equal edges compare equal
/// and sorted edge sets traverse in a deterministic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    /// Serials of the two endpoints, smaller first.
    pub serials: (u32, u32),
    pub first: NodeId,
    pub second: NodeId,
}

impl Edge {
    /// Creates a normalized edge from two `(id, serial)` endpoints.
    #[must_use]
    pub fn new(a: (NodeId, u32), b: (NodeId, u32)) -> Self {
        let (lo, hi) = if a.1 <= b.1 { (a, b) } else { (b, a) };
        Self {
            serials: (lo.1, hi.1),
            first: lo.0,
            second: hi.0,
        }
    }

    /// The endpoint opposite to `node`, if `node` belongs to this edge.
    #[must_use]
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.first {
            Some(self.second)
        } else if node == self.second {
            Some(self.first)
        } else {
            None
        }
    }
}
