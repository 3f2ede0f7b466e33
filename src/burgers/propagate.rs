use std::collections::BTreeMap;

use crate::crystal::{BurgersVector, BurgersVectorKind};
use crate::graph::{Dislocation, NodeId, SkeletonGraph};

/// One curve end touching a junction.
#[derive(Debug, Clone, Copy)]
struct Incidence {
    curve: usize,
    /// The curve ends at the junction (points into it).
    incoming: bool,
}

/// Resolves undefined Burgers vectors from conservation at junctions.
///
/// A junction with exactly one undefined incident curve, all others
/// defined and with a known line sense, determines the missing vector:
/// the sum of the vectors pointing into the junction equals the sum of
/// those pointing out. The resolved curve is oriented into the junction
/// first. Passes repeat until one of them resolves nothing.
///
/// Returns the number of resolved curves.
pub fn propagate(graph: &SkeletonGraph, dislocations: &mut [Dislocation]) -> usize {
    let mut resolved = 0;
    loop {
        let mut progress = false;
        for (_, incident) in junctions(graph, dislocations) {
            let mut undefined = incident
                .iter()
                .filter(|i| !dislocations[i.curve].burgers.burgers_vector.kind().is_defined());
            let (Some(&target), None) = (undefined.next(), undefined.next()) else {
                continue;
            };
            let others_known = incident
                .iter()
                .filter(|i| i.curve != target.curve)
                .all(|i| dislocations[i.curve].burgers.line_sense_known);
            if !others_known {
                continue;
            }

            // balance = sum(out) - sum(in) over the defined curves
            let mut balance = BurgersVector::new(1, [0; 3], BurgersVectorKind::FullyDefined);
            for i in incident.iter().filter(|i| i.curve != target.curve) {
                let b = dislocations[i.curve].burgers.burgers_vector;
                balance = if i.incoming { balance - b } else { balance + b };
            }

            let curve = &mut dislocations[target.curve];
            if !target.incoming {
                curve.reverse();
            }
            curve.burgers.burgers_vector = if balance.is_zero() {
                balance.with_kind(BurgersVectorKind::DontShow)
            } else {
                balance
            };
            curve.burgers.line_sense_known = true;
            resolved += 1;
            progress = true;
            // orientation changed; incidences of this pass are stale
            break;
        }
        if !progress {
            break;
        }
    }
    resolved
}

/// Junction nodes in serial order with the open curve ends touching them.
///
/// A junction has degree three or more and at least two curve ends.
/// Closed curves contribute equally in both directions and are skipped.
fn junctions(graph: &SkeletonGraph, dislocations: &[Dislocation]) -> BTreeMap<u32, Vec<Incidence>> {
    let mut ends: BTreeMap<u32, (NodeId, Vec<Incidence>)> = BTreeMap::new();
    for (curve, d) in dislocations.iter().enumerate() {
        if d.is_closed() {
            continue;
        }
        let (Some(start), Some(end)) = (d.start(), d.end()) else {
            continue;
        };
        for (node, incoming) in [(start, false), (end, true)] {
            ends.entry(graph.serial(node))
                .or_insert_with(|| (node, Vec::new()))
                .1
                .push(Incidence { curve, incoming });
        }
    }
    ends.into_iter()
        .filter(|(_, (node, incident))| incident.len() >= 2 && graph.degree(*node) >= 3)
        .map(|(serial, (_, incident))| (serial, incident))
        .collect()
}
