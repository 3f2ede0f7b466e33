use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::atoms::{same_grain, DefectAtom};
use crate::error::{GraphError, Result};
use crate::graph::{Dislocation, NodeId, SkeletonGraph};
use crate::math::{angle_between, cosine, NeighborGrid, PeriodicBox, Point3, Vector3, TOLERANCE};
use crate::settings::FixingSettings;

/// Quality assigned to candidates that must never be accepted.
pub const REJECTED: f64 = 2.0;

/// Number of repairs done by each strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixingReport {
    /// Pairs of free endings spliced into one curve.
    pub joined_endings: usize,
    /// Free endings attached to an existing junction.
    pub junction_links: usize,
    /// Free endings attached to the interior of another curve.
    pub curve_splits: usize,
}

/// Repair strategies, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Ending,
    Junction,
    MidCurve,
}

/// A degree-1 endpoint of an open curve, away from any free surface.
#[derive(Debug, Clone, Copy)]
struct FreeEnding {
    curve: usize,
    at_start: bool,
    node: NodeId,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: NodeId,
    quality: f64,
    serial: u32,
}

/// Geometric inputs of one candidate evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FixingProbe {
    /// Direction in which the curve leaves its free ending.
    pub outward: Vector3,
    /// Minimum-image vector from the ending to the candidate.
    pub connection: Vector3,
    /// Whether the grains of both sides may be bridged.
    pub grains_compatible: bool,
    /// Resultant Burgers vector sampled near the ending.
    pub ending_rbv: Option<Vector3>,
    /// Resultant Burgers vector sampled near the candidate.
    pub candidate_rbv: Option<Vector3>,
}

/// Reconnects free curve endings that lie inside the crystal.
///
/// Each free ending is first matched against other free endings, then
/// against junctions and finally against interior nodes of other curves.
/// Candidates are ranked by [`DislocationFixing::quality`]; lower is
/// better and only candidates below the acceptance threshold are spliced.
#[derive(Debug)]
pub struct DislocationFixing<'a> {
    atoms: &'a [DefectAtom],
    periodic_box: &'a PeriodicBox,
    cutoff: f64,
    settings: FixingSettings,
    cross_grain: bool,
}

impl<'a> DislocationFixing<'a> {
    /// Creates a fixing step for a skeleton built from `atoms` with `cutoff`.
    #[must_use]
    pub fn new(
        atoms: &'a [DefectAtom],
        periodic_box: &'a PeriodicBox,
        cutoff: f64,
        settings: FixingSettings,
    ) -> Self {
        Self {
            atoms,
            periodic_box,
            cutoff,
            settings,
            cross_grain: false,
        }
    }

    /// Allows repairs between nodes of different grains.
    #[must_use]
    pub fn cross_grain(mut self, allowed: bool) -> Self {
        self.cross_grain = allowed;
        self
    }

    /// Runs all three strategies and renumbers the dislocations afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if a dislocation references a node that is not in
    /// the graph.
    pub fn execute(
        &self,
        graph: &mut SkeletonGraph,
        dislocations: &mut Vec<Dislocation>,
    ) -> Result<FixingReport> {
        let mut report = FixingReport::default();
        if !self.settings.enabled || graph.is_empty() {
            return Ok(report);
        }

        let ids = graph.sorted_ids();
        let positions = ids
            .iter()
            .map(|&id| graph.node(id).map(|n| n.position))
            .collect::<std::result::Result<Vec<Point3>, GraphError>>()?;
        let grid = NeighborGrid::new(
            &positions,
            self.settings.max_distance * self.cutoff,
            self.periodic_box,
        )?;

        for strategy in [Strategy::Ending, Strategy::Junction, Strategy::MidCurve] {
            let mut settled = HashSet::new();
            loop {
                let endings = self.free_endings(graph, dislocations)?;
                let Some(ending) = endings.iter().copied().find(|e| !settled.contains(&e.node)) else {
                    break;
                };
                settled.insert(ending.node);

                let Some(target) =
                    self.best_candidate(strategy, ending, &endings, graph, dislocations, &grid, &ids)?
                else {
                    continue;
                };
                debug!(
                    ?strategy,
                    ending = graph.serial(ending.node),
                    target = graph.serial(target.node),
                    quality = target.quality,
                    "fixing free ending"
                );
                match strategy {
                    Strategy::Ending => {
                        let Some(partner) = endings.iter().find(|e| e.node == target.node) else {
                            continue;
                        };
                        settled.insert(partner.node);
                        join_endings(graph, dislocations, ending, *partner)?;
                        report.joined_endings += 1;
                    }
                    Strategy::Junction => {
                        graph.connect(ending.node, target.node)?;
                        extend_at(&mut dislocations[ending.curve], ending.at_start, target.node);
                        report.junction_links += 1;
                    }
                    Strategy::MidCurve => {
                        split_host(graph, dislocations, ending, target.node)?;
                        report.curve_splits += 1;
                    }
                }
            }
        }

        for (i, d) in dislocations.iter_mut().enumerate() {
            d.id = i;
        }
        debug!(?report, dislocations = dislocations.len(), "dislocation fixing done");
        Ok(report)
    }

    /// Composite quality of a candidate; lower is better.
    ///
    /// Admissible candidates score `0.5 * d / d_max + 0.5 * angle / angle_max`.
    /// Candidates beyond the search radius, beyond the angle limit or across
    /// an incompatible grain boundary score [`REJECTED`]. When both sides
    /// carry RBV samples, similar samples halve the quality and dissimilar
    /// ones add a penalty.
    #[must_use]
    pub fn quality(&self, probe: &FixingProbe) -> f64 {
        if !probe.grains_compatible {
            return REJECTED;
        }
        let max_distance = self.settings.max_distance * self.cutoff;
        let distance = probe.connection.norm();
        if distance > max_distance {
            return REJECTED;
        }
        let angle = angle_between(&probe.outward, &probe.connection).unwrap_or(0.0);
        if angle > self.settings.max_angle {
            return REJECTED;
        }

        let mut quality =
            0.5 * distance / max_distance + 0.5 * angle / self.settings.max_angle;
        if let (Some(a), Some(b)) = (probe.ending_rbv, probe.candidate_rbv) {
            if let Some(cos) = cosine(&a, &b).map(f64::abs) {
                if cos >= self.settings.rbv_similar_cosine {
                    quality *= self.settings.rbv_similar_factor;
                } else if cos < self.settings.rbv_dissimilar_cosine {
                    quality += self.settings.rbv_dissimilar_penalty;
                }
            }
        }
        quality
    }

    fn free_endings(
        &self,
        graph: &SkeletonGraph,
        dislocations: &[Dislocation],
    ) -> Result<Vec<FreeEnding>> {
        let mut endings = Vec::new();
        for (curve, d) in dislocations.iter().enumerate() {
            if d.is_closed() {
                continue;
            }
            let (Some(start), Some(end)) = (d.start(), d.end()) else {
                continue;
            };
            for (at_start, node) in [(true, start), (false, end)] {
                if graph.degree(node) == 1 && !self.touches_surface(graph, node)? {
                    endings.push(FreeEnding {
                        curve,
                        at_start,
                        node,
                    });
                }
            }
        }
        endings.sort_by_key(|e| graph.serial(e.node));
        Ok(endings)
    }

    fn touches_surface(&self, graph: &SkeletonGraph, node: NodeId) -> Result<bool> {
        Ok(graph
            .node(node)?
            .mapped_atoms
            .iter()
            .any(|&i| self.atoms.get(i).is_some_and(|a| a.near_surface)))
    }

    /// Direction in which the curve leaves the ending, estimated over the
    /// tangent window.
    fn outward(&self, graph: &SkeletonGraph, d: &Dislocation, at_start: bool) -> Result<Vector3> {
        let path = from_ending(d, at_start, self.settings.tangent_window + 1);
        let (Some(&tip), Some(&inner)) = (path.first(), path.last()) else {
            return Ok(Vector3::zeros());
        };
        let tip = graph.node(tip)?.position;
        let inner = graph.node(inner)?.position;
        Ok(self.periodic_box.delta(&inner, &tip))
    }

    /// Mean RBV displacement of the atoms mapped to `nodes`, oriented along
    /// `reference`.
    #[allow(clippy::cast_precision_loss)]
    fn rbv_sample(&self, graph: &SkeletonGraph, nodes: &[NodeId], reference: &Vector3) -> Option<Vector3> {
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for &id in nodes {
            let Ok(node) = graph.node(id) else {
                continue;
            };
            for rbv in node
                .mapped_atoms
                .iter()
                .filter_map(|&i| self.atoms.get(i).and_then(|a| a.rbv))
            {
                sum += rbv.oriented_along(reference);
                count += 1;
            }
        }
        (count > 0 && sum.norm() > TOLERANCE).then(|| sum / count as f64)
    }

    #[allow(clippy::too_many_arguments)]
    fn best_candidate(
        &self,
        strategy: Strategy,
        ending: FreeEnding,
        endings: &[FreeEnding],
        graph: &SkeletonGraph,
        dislocations: &[Dislocation],
        grid: &NeighborGrid,
        ids: &[NodeId],
    ) -> Result<Option<Candidate>> {
        let curve = &dislocations[ending.curve];
        let here = graph.node(ending.node)?;
        let outward = self.outward(graph, curve, ending.at_start)?;
        let ending_rbv = self.rbv_sample(
            graph,
            &from_ending(curve, ending.at_start, self.settings.rbv_window),
            &outward,
        );
        let own_other_end = if ending.at_start { curve.end() } else { curve.start() };

        let interior: HashMap<NodeId, usize> = if strategy == Strategy::MidCurve {
            dislocations
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != ending.curve)
                .flat_map(|(i, d)| d.interior().iter().map(move |&n| (n, i)))
                .collect()
        } else {
            HashMap::new()
        };

        let mut best: Option<Candidate> = None;
        for neighbor in grid.within(&here.position) {
            let Some(&id) = ids.get(neighbor.index) else {
                continue;
            };
            if id == ending.node || graph.are_connected(ending.node, id) {
                continue;
            }
            // ending-to-ending joins must continue both curves
            let (candidate_rbv, partner_outward) = match strategy {
                Strategy::Ending => {
                    let Some(partner) = endings.iter().find(|e| e.node == id) else {
                        continue;
                    };
                    if partner.curve == ending.curve {
                        continue;
                    }
                    let other = &dislocations[partner.curve];
                    let other_outward = self.outward(graph, other, partner.at_start)?;
                    let rbv = self.rbv_sample(
                        graph,
                        &from_ending(other, partner.at_start, self.settings.rbv_window),
                        &other_outward,
                    );
                    (rbv, Some(other_outward))
                }
                Strategy::Junction => {
                    if graph.degree(id) < 3 || own_other_end == Some(id) {
                        continue;
                    }
                    (self.rbv_sample(graph, &[id], &neighbor.delta), None)
                }
                Strategy::MidCurve => {
                    if graph.degree(id) != 2 || !interior.contains_key(&id) {
                        continue;
                    }
                    (self.rbv_sample(graph, &[id], &neighbor.delta), None)
                }
            };

            let target = graph.node(id)?;
            let probe = FixingProbe {
                outward,
                connection: neighbor.delta,
                grains_compatible: self.cross_grain || same_grain(here.grain, target.grain),
                ending_rbv,
                candidate_rbv,
            };
            let mut quality = self.quality(&probe);
            if let Some(partner_outward) = partner_outward {
                quality = quality.max(self.quality(&FixingProbe {
                    outward: partner_outward,
                    connection: -neighbor.delta,
                    ..probe
                }));
            }
            let better = best.map_or(true, |b| {
                quality < b.quality || (quality == b.quality && target.serial < b.serial)
            });
            if better {
                best = Some(Candidate {
                    node: id,
                    quality,
                    serial: target.serial,
                });
            }
        }
        Ok(best.filter(|c| c.quality < self.settings.acceptance))
    }
}

/// Up to `count` nodes of a curve, starting at the given end.
fn from_ending(d: &Dislocation, at_start: bool, count: usize) -> Vec<NodeId> {
    if at_start {
        d.nodes.iter().take(count).copied().collect()
    } else {
        d.nodes.iter().rev().take(count).copied().collect()
    }
}

/// Appends `node` to the given end of a curve.
fn extend_at(d: &mut Dislocation, at_start: bool, node: NodeId) {
    if at_start {
        d.nodes.insert(0, node);
    } else {
        d.nodes.push(node);
    }
}

/// Connects two free endings of different curves and replaces both curves
/// by their concatenation.
fn join_endings(
    graph: &mut SkeletonGraph,
    dislocations: &mut Vec<Dislocation>,
    a: FreeEnding,
    b: FreeEnding,
) -> Result<()> {
    if a.curve == b.curve {
        return Err(GraphError::InvalidDislocation(format!(
            "refusing to join dislocation {} to itself",
            dislocations[a.curve].id
        ))
        .into());
    }
    graph.connect(a.node, b.node)?;

    let mut nodes = dislocations[a.curve].nodes.clone();
    if a.at_start {
        nodes.reverse();
    }
    let mut tail = dislocations[b.curve].nodes.clone();
    if !b.at_start {
        tail.reverse();
    }
    nodes.extend(tail);

    let (hi, lo) = if a.curve > b.curve {
        (a.curve, b.curve)
    } else {
        (b.curve, a.curve)
    };
    dislocations.remove(hi);
    dislocations.remove(lo);
    dislocations.push(Dislocation::new(0, nodes));
    Ok(())
}

/// Attaches a free ending to an interior node of another curve, which
/// becomes a junction. An open host is split in two at that node; a pure
/// loop is reopened so that it starts and ends there.
fn split_host(
    graph: &mut SkeletonGraph,
    dislocations: &mut Vec<Dislocation>,
    ending: FreeEnding,
    node: NodeId,
) -> Result<()> {
    let Some((host, k)) = dislocations.iter().enumerate().find_map(|(i, d)| {
        d.interior()
            .iter()
            .position(|&n| n == node)
            .map(|p| (i, p + 1))
    }) else {
        return Err(GraphError::InvalidDislocation(format!(
            "node {} is not inside any dislocation",
            graph.serial(node)
        ))
        .into());
    };
    if host == ending.curve {
        return Err(GraphError::InvalidDislocation(format!(
            "refusing to attach dislocation {} to itself",
            dislocations[host].id
        ))
        .into());
    }

    graph.connect(ending.node, node)?;
    extend_at(&mut dislocations[ending.curve], ending.at_start, node);

    let pure_loop = dislocations[host].is_closed()
        && dislocations[host].start().is_some_and(|s| graph.degree(s) == 2);
    let nodes = std::mem::take(&mut dislocations[host].nodes);
    if pure_loop {
        let mut rotated = nodes[k..nodes.len() - 1].to_vec();
        rotated.extend_from_slice(&nodes[..=k]);
        dislocations[host].nodes = rotated;
    } else {
        dislocations[host].nodes = nodes[..=k].to_vec();
        dislocations.push(Dislocation::new(0, nodes[k..].to_vec()));
    }
    Ok(())
}
