//! Burgers vector analysis of extracted dislocation curves.
//!
//! The analysis runs in four steps: RBV averaging, line-sense voting,
//! pattern classification and conservation-based propagation through
//! junctions.

pub mod average;
pub mod classify;
pub mod line_sense;
pub mod propagate;

pub use average::average_rbv;
pub use classify::classify_curve;
pub use line_sense::{count_votes, LineSenseVotes};
pub use propagate::propagate;

use tracing::info;

use crate::atoms::DefectAtom;
use crate::crystal::CrystalStructure;
use crate::error::Result;
use crate::graph::{Dislocation, SkeletonGraph};
use crate::math::{PeriodicBox, Vector3};
use crate::settings::ClassificationSettings;

/// A node votes on the line sense only with a majority above this ratio.
pub const LINE_SENSE_RATIO: usize = 3;

/// Outcome of a Burgers vector analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BurgersReport {
    pub curves: usize,
    /// Curves matched by a classification rule.
    pub classified: usize,
    /// Curves resolved through junction conservation.
    pub propagated: usize,
    /// Curves that were reversed by the line-sense vote.
    pub reversed: usize,
    pub resolved_length: f64,
    pub total_length: f64,
}

impl BurgersReport {
    /// Number of curves with a defined Burgers vector.
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.classified + self.propagated
    }

    /// Fraction of curves with a defined Burgers vector.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn resolved_fraction(&self) -> f64 {
        if self.curves == 0 {
            0.0
        } else {
            self.resolved() as f64 / self.curves as f64
        }
    }

    /// Fraction of the total line length with a defined Burgers vector.
    #[must_use]
    pub fn resolved_length_fraction(&self) -> f64 {
        if self.total_length > 0.0 {
            self.resolved_length / self.total_length
        } else {
            0.0
        }
    }
}

/// Assigns Burgers vectors to dislocation curves.
#[derive(Debug)]
pub struct BurgersVectorAnalyzer<'a> {
    crystal: &'a CrystalStructure,
    atoms: &'a [DefectAtom],
    periodic_box: &'a PeriodicBox,
    settings: ClassificationSettings,
}

impl<'a> BurgersVectorAnalyzer<'a> {
    /// Creates an analyzer for curves built from `atoms`.
    #[must_use]
    pub fn new(
        crystal: &'a CrystalStructure,
        atoms: &'a [DefectAtom],
        periodic_box: &'a PeriodicBox,
        settings: ClassificationSettings,
    ) -> Self {
        Self {
            crystal,
            atoms,
            periodic_box,
            settings,
        }
    }

    /// Runs the full analysis, updating the Burgers vector information of
    /// every curve in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a curve references a removed node.
    pub fn execute(&self, graph: &SkeletonGraph, dislocations: &mut [Dislocation]) -> Result<BurgersReport> {
        let mut report = BurgersReport {
            curves: dislocations.len(),
            ..BurgersReport::default()
        };

        for d in dislocations.iter_mut() {
            d.burgers.average = average_rbv(graph, self.atoms, self.periodic_box, d)?;

            let votes = count_votes(graph, self.atoms, self.periodic_box, d, LINE_SENSE_RATIO)?;
            if votes.reverse() {
                d.reverse();
                report.reversed += 1;
            }
            d.burgers.line_sense_known = votes.decided();

            d.burgers.burgers_vector = classify_curve(self.crystal, d, self.settings.min_cosine);
            if d.burgers.burgers_vector.kind().is_defined() {
                report.classified += 1;
            }
        }

        report.propagated = propagate(graph, dislocations);

        for d in dislocations.iter() {
            let length = d.length(graph, self.periodic_box)?;
            report.total_length += length;
            if d.burgers.burgers_vector.kind().is_defined() {
                report.resolved_length += length;
            }
        }

        info!(
            curves = report.curves,
            classified = report.classified,
            propagated = report.propagated,
            resolved_fraction = report.resolved_fraction(),
            resolved_length_fraction = report.resolved_length_fraction(),
            "burgers vector analysis done"
        );
        Ok(report)
    }
}

/// Local curve direction at position `i`: the sum of the incoming and
/// outgoing segment vectors. A closed curve wraps around its start.
fn tangent_at(
    graph: &SkeletonGraph,
    periodic_box: &PeriodicBox,
    dislocation: &Dislocation,
    i: usize,
) -> Result<Vector3> {
    let nodes = &dislocation.nodes;
    let here = graph.node(nodes[i])?.position;
    let prev = if i > 0 {
        Some(nodes[i - 1])
    } else if dislocation.is_closed() {
        Some(nodes[nodes.len() - 2])
    } else {
        None
    };
    let next = nodes.get(i + 1).copied();

    let mut tangent = Vector3::zeros();
    if let Some(p) = prev {
        tangent += periodic_box.delta(&graph.node(p)?.position, &here);
    }
    if let Some(n) = next {
        tangent += periodic_box.delta(&here, &graph.node(n)?.position);
    }
    Ok(tangent)
}
