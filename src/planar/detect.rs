use std::collections::VecDeque;

use rayon::prelude::*;
use tracing::debug;

use crate::atoms::PlanarAtom;
use crate::error::Result;
use crate::math::{cosine, Neighbor, NeighborGrid, PeriodicBox, Point3, Vector3, TOLERANCE};
use crate::settings::PlanarSettings;

use super::{best_family, PlanarDefect};

/// Two bond directions count as distinct when their |cos| is below this.
const DISTINCT_BONDS: f64 = 0.9;

/// One detection pass.
#[derive(Debug, Clone, Copy)]
struct Pass {
    /// Straight-bond pairs an atom needs to seed a cluster.
    bond_count: usize,
    /// Straight bonds may only use neighbors of the same kind.
    same_kind_bonds: bool,
}

/// Groups stacking-fault atoms into flat clusters.
///
/// A strict pass seeds clusters at atoms with many straight bond pairs; a
/// relaxed pass then seeds from the atoms left over. Clusters grow by a
/// breadth-first flood fill over in-plane neighbors of the same kind.
#[derive(Debug)]
pub struct PlanarDefectDetector<'a> {
    atoms: &'a [PlanarAtom],
    periodic_box: &'a PeriodicBox,
    cutoff: f64,
    settings: PlanarSettings,
    plane_normals: Vec<Vector3>,
}

impl<'a> PlanarDefectDetector<'a> {
    /// Creates a detector over `atoms` with the nearest-neighbor `cutoff`.
    #[must_use]
    pub fn new(
        atoms: &'a [PlanarAtom],
        periodic_box: &'a PeriodicBox,
        cutoff: f64,
        settings: PlanarSettings,
    ) -> Self {
        Self {
            atoms,
            periodic_box,
            cutoff,
            settings,
            plane_normals: Vec::new(),
        }
    }

    /// Sets the reference plane normals (sample frame) used to tag defects.
    #[must_use]
    pub fn with_plane_normals(mut self, normals: Vec<Vector3>) -> Self {
        self.plane_normals = normals;
        self
    }

    /// Executes the detection.
    ///
    /// # Errors
    ///
    /// Returns a geometry error for an unusable cutoff.
    pub fn execute(&self) -> Result<Vec<PlanarDefect>> {
        if self.atoms.is_empty() {
            return Ok(Vec::new());
        }
        let positions: Vec<Point3> = self.atoms.iter().map(|a| a.position).collect();
        let grid = NeighborGrid::new(&positions, self.cutoff, self.periodic_box)?;
        let neighbors: Vec<Vec<Neighbor>> = (0..positions.len())
            .into_par_iter()
            .map(|i| grid.neighbors_of(i))
            .collect();

        let mut cluster_of: Vec<Option<usize>> = vec![None; self.atoms.len()];
        let mut clusters: Vec<(Vector3, Vec<usize>)> = Vec::new();

        let passes = [
            Pass {
                bond_count: self.settings.strict_bond_count,
                same_kind_bonds: true,
            },
            Pass {
                bond_count: self.settings.relaxed_bond_count,
                same_kind_bonds: false,
            },
        ];
        for pass in passes {
            for seed in 0..self.atoms.len() {
                if cluster_of[seed].is_some() {
                    continue;
                }
                let Some(normal) = self.seed_normal(seed, &neighbors, pass) else {
                    continue;
                };
                let members = self.flood(seed, &normal, &neighbors, &mut cluster_of, clusters.len());
                clusters.push((normal, members));
            }
            // small clusters release their atoms for the next pass
            for (_, members) in &mut clusters {
                if members.len() < self.settings.min_atoms {
                    for &a in members.iter() {
                        cluster_of[a] = None;
                    }
                    members.clear();
                }
            }
        }

        let mut defects = Vec::new();
        for (normal, mut members) in clusters {
            if members.is_empty() {
                continue;
            }
            members.sort_unstable();
            let slot = cluster_of[members[0]];
            let faces = faces(&members, &neighbors, &cluster_of, slot);
            defects.push(PlanarDefect {
                id: defects.len(),
                family: best_family(&normal, &self.plane_normals),
                normal,
                atoms: members,
                faces,
                dislocations: Vec::new(),
            });
        }

        debug!(
            atoms = self.atoms.len(),
            defects = defects.len(),
            "detected planar defects"
        );
        Ok(defects)
    }

    /// Bond vectors of all straight neighbor pairs around `atom`.
    fn straight_pairs(&self, atom: usize, neighbors: &[Vec<Neighbor>], pass: Pass) -> Vec<(Vector3, Vector3)> {
        let kind = self.atoms[atom].kind;
        let bonds: Vec<&Neighbor> = neighbors[atom]
            .iter()
            .filter(|n| !pass.same_kind_bonds || self.atoms[n.index].kind == kind)
            .collect();
        let mut pairs = Vec::new();
        for (i, a) in bonds.iter().enumerate() {
            for b in &bonds[i + 1..] {
                if cosine(&a.delta, &b.delta).is_some_and(|c| c < self.settings.straight_cosine) {
                    pairs.push((a.delta, b.delta));
                }
            }
        }
        pairs
    }

    /// Plane normal at a seed atom, or `None` if the atom does not seed a
    /// cluster in this pass.
    fn seed_normal(&self, seed: usize, neighbors: &[Vec<Neighbor>], pass: Pass) -> Option<Vector3> {
        let pairs = self.straight_pairs(seed, neighbors, pass);
        if pairs.len() < pass.bond_count.max(2) {
            return None;
        }

        let first = pairs[0].0;
        let (second_index, second) = pairs
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, p)| cosine(&first, &p.0).is_some_and(|c| c.abs() < DISTINCT_BONDS))
            .map(|(i, p)| (i, p.0))?;
        let normal = first.cross(&second);
        if normal.norm() < TOLERANCE {
            return None;
        }
        let normal = normal.normalize();

        // a third straight bond, if present, has to lie in the same plane
        let in_plane = |v: &Vector3| {
            cosine(v, &normal).is_some_and(|c| c.abs() < self.settings.plane_tolerance)
        };
        let mut others = pairs
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != 0 && i != second_index)
            .peekable();
        if others.peek().is_some() && !others.any(|(_, p)| in_plane(&p.0)) {
            return None;
        }
        Some(normal)
    }

    /// Breadth-first growth of cluster `slot` from `seed`. Atoms with fewer
    /// in-plane neighbors than required are added but do not propagate.
    fn flood(
        &self,
        seed: usize,
        normal: &Vector3,
        neighbors: &[Vec<Neighbor>],
        cluster_of: &mut [Option<usize>],
        slot: usize,
    ) -> Vec<usize> {
        let kind = self.atoms[seed].kind;
        let mut members = vec![seed];
        cluster_of[seed] = Some(slot);
        let mut queue = VecDeque::from([seed]);

        while let Some(atom) = queue.pop_front() {
            let in_plane: Vec<usize> = neighbors[atom]
                .iter()
                .filter(|n| {
                    self.atoms[n.index].kind == kind
                        && cluster_of[n.index].map_or(true, |c| c == slot)
                        && cosine(&n.delta, normal).is_some_and(|c| c.abs() < self.settings.plane_tolerance)
                })
                .map(|n| n.index)
                .collect();
            if in_plane.len() < self.settings.propagation_neighbors {
                continue;
            }
            for next in in_plane {
                if cluster_of[next].is_none() {
                    cluster_of[next] = Some(slot);
                    members.push(next);
                    queue.push_back(next);
                }
            }
        }
        members
    }
}

/// Triangles of mutually adjacent atoms of one cluster, each listed once
/// with ascending indices.
fn faces(
    members: &[usize],
    neighbors: &[Vec<Neighbor>],
    cluster_of: &[Option<usize>],
    slot: Option<usize>,
) -> Vec<[usize; 3]> {
    let adjacent = |a: usize, b: usize| {
        neighbors[a]
            .binary_search_by_key(&b, |n| n.index)
            .is_ok()
    };
    let mut faces = Vec::new();
    for &i in members {
        let higher: Vec<usize> = neighbors[i]
            .iter()
            .map(|n| n.index)
            .filter(|&j| j > i && cluster_of[j] == slot)
            .collect();
        for (x, &j) in higher.iter().enumerate() {
            for &k in &higher[x + 1..] {
                if adjacent(j, k) {
                    faces.push([i, j, k]);
                }
            }
        }
    }
    faces
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_box() -> PeriodicBox {
        PeriodicBox::fully_periodic(Vector3::new(40.0, 40.0, 40.0)).unwrap()
    }

    /// `n x n` patch of a triangular lattice with unit spacing in `z = 10`.
    fn triangular_patch(n: usize, kind: u8) -> Vec<PlanarAtom> {
        let h = 3f64.sqrt() / 2.0;
        let mut atoms = Vec::new();
        for j in 0..n {
            for i in 0..n {
                #[allow(clippy::cast_precision_loss)]
                let (fi, fj) = (i as f64, j as f64);
                let p = Point3::new(10.0 + fi + 0.5 * fj, 10.0 + h * fj, 10.0);
                atoms.push(PlanarAtom::new(p, kind));
            }
        }
        atoms
    }

    #[test]
    fn flat_patch_becomes_one_defect() {
        let atoms = triangular_patch(6, 1);
        let pbox = test_box();
        let defects = PlanarDefectDetector::new(&atoms, &pbox, 1.2, PlanarSettings::default())
            .with_plane_normals(vec![Vector3::x(), Vector3::z()])
            .execute()
            .unwrap();
        assert_eq!(defects.len(), 1);
        let d = &defects[0];
        assert_eq!(d.atoms.len(), 36);
        assert!(d.normal.z.abs() > 1.0 - 1e-9);
        assert_eq!(d.family, Some(1));
        assert_eq!(d.faces.len(), 50);
        let expected = 50.0 * 3f64.sqrt() / 4.0;
        assert!((d.area(&atoms, &pbox) - expected).abs() < 1e-9);
    }

    #[test]
    fn perpendicular_line_does_not_leak_into_plane() {
        let mut atoms = triangular_patch(6, 1);
        let base = atoms[14].position;
        for k in 1..=4 {
            atoms.push(PlanarAtom::new(base + Vector3::z() * f64::from(k), 1));
        }
        let pbox = test_box();
        let defects = PlanarDefectDetector::new(&atoms, &pbox, 1.2, PlanarSettings::default())
            .execute()
            .unwrap();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].atoms, (0..36).collect::<Vec<_>>());
    }

    #[test]
    fn straight_line_is_not_planar() {
        let atoms: Vec<PlanarAtom> = (0..10)
            .map(|i| PlanarAtom::new(Point3::new(5.0 + f64::from(i), 5.0, 5.0), 1))
            .collect();
        let pbox = test_box();
        let defects = PlanarDefectDetector::new(&atoms, &pbox, 1.2, PlanarSettings::default())
            .execute()
            .unwrap();
        assert!(defects.is_empty());
    }

    /// Three two-row bands of alternating kinds. Within its own kind every
    /// atom has at most one straight bond pair, so only the relaxed pass
    /// can seed.
    fn banded_patch() -> Vec<PlanarAtom> {
        let mut atoms = triangular_patch(6, 2);
        for a in atoms.iter_mut().skip(12).take(12) {
            a.kind = 1;
        }
        atoms
    }

    #[test]
    fn relaxed_pass_seeds_narrow_bands() {
        let atoms = banded_patch();
        let pbox = test_box();
        let defects = PlanarDefectDetector::new(&atoms, &pbox, 1.2, PlanarSettings::default())
            .execute()
            .unwrap();
        assert_eq!(defects.len(), 3);
        let mut covered: Vec<usize> = defects.iter().flat_map(|d| d.atoms.clone()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..36).collect::<Vec<_>>());
        for d in &defects {
            assert_eq!(d.atoms.len(), 12);
            let kind = atoms[d.atoms[0]].kind;
            assert!(d.atoms.iter().all(|&a| atoms[a].kind == kind));
        }
    }

    #[test]
    fn strict_pass_alone_misses_narrow_bands() {
        let atoms = banded_patch();
        let pbox = test_box();
        let settings = PlanarSettings {
            relaxed_bond_count: usize::MAX,
            ..PlanarSettings::default()
        };
        let defects = PlanarDefectDetector::new(&atoms, &pbox, 1.2, settings)
            .execute()
            .unwrap();
        assert!(defects.is_empty());
    }

    #[test]
    fn kinds_are_not_mixed() {
        let mut atoms = triangular_patch(6, 1);
        for a in atoms.iter_mut().skip(18) {
            a.kind = 2;
        }
        let pbox = test_box();
        let defects = PlanarDefectDetector::new(&atoms, &pbox, 1.2, PlanarSettings::default())
            .execute()
            .unwrap();
        assert_eq!(defects.len(), 2);
        for d in &defects {
            let kind = atoms[d.atoms[0]].kind;
            assert!(d.atoms.iter().all(|&a| atoms[a].kind == kind));
        }
    }
}
