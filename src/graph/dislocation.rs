use crate::crystal::BurgersVector;
use crate::error::GraphError;
use crate::math::{PeriodicBox, Vector3};

use super::node::NodeId;
use super::SkeletonGraph;

/// Burgers vector state of one dislocation curve.
#[derive(Debug, Clone, PartialEq)]
pub struct BurgersVectorInfo {
    /// Average resultant Burgers vector (sample frame) with respect to the
    /// curve direction; `None` without RBV samples on interior nodes.
    pub average: Option<Vector3>,
    /// Set once the node order agrees with the physical line direction.
    pub line_sense_known: bool,
    /// Classified vector, possibly undefined.
    pub burgers_vector: BurgersVector,
}

impl Default for BurgersVectorInfo {
    fn default() -> Self {
        Self {
            average: None,
            line_sense_known: false,
            burgers_vector: BurgersVector::undefined(),
        }
    }
}

/// A directed polyline of skeleton nodes.
///
/// Both endpoints have a degree other than two (free endings or
/// junctions); a closed loop starts and ends at the same node.
#[derive(Debug, Clone)]
pub struct Dislocation {
    pub id: usize,
    pub nodes: Vec<NodeId>,
    pub burgers: BurgersVectorInfo,
    /// Ids of adjacent planar defects.
    pub planar_defects: Vec<usize>,
}

impl Dislocation {
    /// Creates a dislocation over `nodes` with no Burgers vector data.
    #[must_use]
    pub fn new(id: usize, nodes: Vec<NodeId>) -> Self {
        Self {
            id,
            nodes,
            burgers: BurgersVectorInfo::default(),
            planar_defects: Vec::new(),
        }
    }

    /// First node of the curve.
    #[must_use]
    pub fn start(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Last node of the curve.
    #[must_use]
    pub fn end(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Returns `true` if the curve returns to its start node.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }

    /// Nodes strictly between the two endpoints.
    #[must_use]
    pub fn interior(&self) -> &[NodeId] {
        if self.nodes.len() < 3 {
            &[]
        } else {
            &self.nodes[1..self.nodes.len() - 1]
        }
    }

    /// Polyline length under the minimum-image convention.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` if a node was removed from `graph`.
    pub fn length(&self, graph: &SkeletonGraph, periodic_box: &PeriodicBox) -> Result<f64, GraphError> {
        let mut length = 0.0;
        for w in self.nodes.windows(2) {
            let a = graph.node(w[0])?.position;
            let b = graph.node(w[1])?.position;
            length += periodic_box.delta(&a, &b).norm();
        }
        Ok(length)
    }

    /// Reverses the traversal direction, negating the average vector and
    /// the classified Burgers vector with it.
    pub fn reverse(&mut self) {
        self.nodes.reverse();
        if let Some(avg) = self.burgers.average.as_mut() {
            *avg = -*avg;
        }
        self.burgers.burgers_vector = -self.burgers.burgers_vector;
    }
}
