use crate::atoms::DefectAtom;
use crate::error::Result;
use crate::graph::{Dislocation, SkeletonGraph};
use crate::math::PeriodicBox;

use super::tangent_at;

/// Tally of per-node line-sense votes along one curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineSenseVotes {
    /// Nodes whose atoms mostly agree with the node order.
    pub agree: usize,
    /// Nodes whose atoms mostly disagree with the node order.
    pub disagree: usize,
}

impl LineSenseVotes {
    /// Returns `true` if at least one node voted.
    #[must_use]
    pub fn decided(&self) -> bool {
        self.agree + self.disagree > 0
    }

    /// Returns `true` if the curve should be reversed.
    #[must_use]
    pub fn reverse(&self) -> bool {
        self.disagree > self.agree
    }
}

/// Counts line-sense votes along a curve.
///
/// At every node the atoms' RBV line directions are compared with the
/// local tangent. A node votes only if one side outnumbers the other by
/// more than `ratio` to one.
///
/// # Errors
///
/// Returns an error if the curve references a removed node.
pub fn count_votes(
    graph: &SkeletonGraph,
    atoms: &[DefectAtom],
    periodic_box: &PeriodicBox,
    dislocation: &Dislocation,
    ratio: usize,
) -> Result<LineSenseVotes> {
    let mut votes = LineSenseVotes::default();
    let count = if dislocation.is_closed() {
        dislocation.nodes.len() - 1
    } else {
        dislocation.nodes.len()
    };

    for i in 0..count {
        let tangent = tangent_at(graph, periodic_box, dislocation, i)?;
        let node = graph.node(dislocation.nodes[i])?;
        let (mut agree, mut disagree) = (0usize, 0usize);
        for rbv in node
            .mapped_atoms
            .iter()
            .filter_map(|&a| atoms.get(a).and_then(|atom| atom.rbv))
        {
            let dot = rbv.line_direction.dot(&tangent);
            if dot > 0.0 {
                agree += 1;
            } else if dot < 0.0 {
                disagree += 1;
            }
        }
        if agree > ratio * disagree {
            votes.agree += 1;
        } else if disagree > ratio * agree {
            votes.disagree += 1;
        }
    }
    Ok(votes)
}
