use std::collections::HashMap;

use crate::error::GeometryError;

use super::{PeriodicBox, Point3, Vector3};

/// A point found by a [`NeighborGrid`] query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    /// Index of the point in the slice the grid was built from.
    pub index: usize,
    /// Minimum-image vector from the query point to the neighbor.
    pub delta: Vector3,
    /// Squared length of `delta`.
    pub distance_squared: f64,
}

/// Largest number of cells along one axis.
const MAX_CELLS_PER_AXIS: usize = 1 << 20;

type CellKey = (i32, i32, i32);

/// Periodic cell list answering "all points within the cutoff" queries.
///
/// Only occupied cells are stored, so memory follows the number of points
/// rather than the box volume. The grid is immutable once built, so it can
/// be queried from many threads at once.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    periodic_box: PeriodicBox,
    cutoff: f64,
    dims: [usize; 3],
    cells: HashMap<CellKey, Vec<usize>>,
    points: Vec<Point3>,
}

impl NeighborGrid {
    /// Builds a grid over `points` with the given search radius.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` if the cutoff is not a positive
    /// finite number.
    pub fn new(
        points: &[Point3],
        cutoff: f64,
        periodic_box: &PeriodicBox,
    ) -> Result<Self, GeometryError> {
        if !cutoff.is_finite() || cutoff <= 0.0 {
            return Err(GeometryError::Degenerate(format!(
                "neighbor cutoff must be positive, got {cutoff}"
            )));
        }

        let size = periodic_box.size();
        let mut dims = [1usize; 3];
        for axis in 0..3 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = (size[axis] / cutoff).floor() as usize;
            dims[axis] = n.clamp(1, MAX_CELLS_PER_AXIS);
        }

        let mut grid = Self {
            periodic_box: periodic_box.clone(),
            cutoff,
            dims,
            cells: HashMap::new(),
            points: Vec::with_capacity(points.len()),
        };
        for (index, p) in points.iter().enumerate() {
            let wrapped = grid.periodic_box.wrap(p);
            let key = Self::cell_key(grid.cell_coords(&wrapped));
            grid.cells.entry(key).or_default().push(index);
            grid.points.push(wrapped);
        }
        Ok(grid)
    }

    /// Search radius of the grid.
    #[must_use]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the grid holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All indexed points within the cutoff of `point`, in ascending index
    /// order. A point coinciding with the query point is included.
    #[must_use]
    pub fn within(&self, point: &Point3) -> Vec<Neighbor> {
        let cutoff_sq = self.cutoff * self.cutoff;
        let query = self.periodic_box.wrap(point);
        let center = self.cell_coords(&query);

        let mut found = Vec::new();
        for key in self.surrounding_cells(center) {
            let Some(members) = self.cells.get(&key) else {
                continue;
            };
            for &index in members {
                let delta = self.periodic_box.delta(&query, &self.points[index]);
                let distance_squared = delta.norm_squared();
                if distance_squared <= cutoff_sq {
                    found.push(Neighbor {
                        index,
                        delta,
                        distance_squared,
                    });
                }
            }
        }
        found.sort_unstable_by_key(|n| n.index);
        found
    }

    /// Neighbors of the indexed point `index`, excluding the point itself.
    #[must_use]
    pub fn neighbors_of(&self, index: usize) -> Vec<Neighbor> {
        let mut found = self.within(&self.points[index]);
        found.retain(|n| n.index != index);
        found
    }

    fn cell_coords(&self, p: &Point3) -> [usize; 3] {
        let origin = self.periodic_box.origin();
        let size = self.periodic_box.size();
        let mut coords = [0usize; 3];
        for axis in 0..3 {
            let n = self.dims[axis];
            let t = (p[axis] - origin[axis]) / size[axis];
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss,
                clippy::cast_possible_wrap
            )]
            let c = (t * n as f64).floor().clamp(0.0, (n - 1) as f64) as usize;
            coords[axis] = c;
        }
        coords
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn cell_key(c: [usize; 3]) -> CellKey {
        (c[0] as i32, c[1] as i32, c[2] as i32)
    }

    /// Distinct cells covering the 3x3x3 block around `center`.
    fn surrounding_cells(&self, center: [usize; 3]) -> Vec<CellKey> {
        let periodic = self.periodic_box.periodic();
        let mut per_axis: [Vec<usize>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for axis in 0..3 {
            let n = self.dims[axis];
            if n < 3 {
                per_axis[axis] = (0..n).collect();
                continue;
            }
            #[allow(clippy::cast_possible_wrap)]
            let (c, n_i) = (center[axis] as i64, n as i64);
            for offset in [-1i64, 0, 1] {
                let shifted = if periodic[axis] {
                    (c + offset).rem_euclid(n_i)
                } else {
                    c + offset
                };
                if (0..n_i).contains(&shifted) {
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    let cell = shifted as usize;
                    per_axis[axis].push(cell);
                }
            }
        }

        let mut cells = Vec::with_capacity(27);
        for &z in &per_axis[2] {
            for &y in &per_axis[1] {
                for &x in &per_axis[0] {
                    cells.push(Self::cell_key([x, y, z]));
                }
            }
        }
        cells
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn grid(points: &[Point3], cutoff: f64) -> NeighborGrid {
        let b = PeriodicBox::fully_periodic(Vector3::new(10.0, 10.0, 10.0)).unwrap();
        NeighborGrid::new(points, cutoff, &b).unwrap()
    }

    #[test]
    fn finds_neighbors_across_boundary() {
        let points = vec![
            Point3::new(0.2, 5.0, 5.0),
            Point3::new(9.8, 5.0, 5.0),
            Point3::new(5.0, 5.0, 5.0),
        ];
        let g = grid(&points, 1.0);
        let n = g.neighbors_of(0);
        assert_eq!(n.len(), 1);
        assert_eq!(n[0].index, 1);
        assert!((n[0].delta.x + 0.4).abs() < 1e-12);
    }

    #[test]
    fn matches_brute_force() {
        let mut points = Vec::new();
        for i in 0..7 {
            for j in 0..7 {
                let x = f64::from(i) * 1.37;
                let y = f64::from(j) * 1.41;
                points.push(Point3::new(x, y, f64::from(i + j) * 0.3));
            }
        }
        let g = grid(&points, 2.0);
        let b = PeriodicBox::fully_periodic(Vector3::new(10.0, 10.0, 10.0)).unwrap();
        for i in 0..points.len() {
            let fast: Vec<usize> = g.neighbors_of(i).iter().map(|n| n.index).collect();
            let slow: Vec<usize> = (0..points.len())
                .filter(|&j| j != i && b.distance_squared(&points[i], &points[j]) <= 4.0)
                .collect();
            assert_eq!(fast, slow, "mismatch for point {i}");
        }
    }

    #[test]
    fn cutoff_larger_than_box_has_no_duplicates() {
        let points = vec![Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 1.0, 1.0)];
        let g = grid(&points, 6.0);
        assert_eq!(g.neighbors_of(0).len(), 1);
    }

    #[test]
    fn large_box_stores_only_occupied_cells() {
        let b = PeriodicBox::fully_periodic(Vector3::new(1000.0, 1000.0, 1000.0)).unwrap();
        let points = vec![Point3::new(1.0, 1.0, 1.0), Point3::new(999.5, 1.0, 1.0)];
        let g = NeighborGrid::new(&points, 3.0, &b).unwrap();
        assert_eq!(g.dims, [333, 333, 333]);
        assert_eq!(g.cells.len(), 2);
        let n = g.neighbors_of(0);
        assert_eq!(n.len(), 1);
        assert!((n[0].delta.x + 1.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_cutoff() {
        let b = PeriodicBox::fully_periodic(Vector3::new(10.0, 10.0, 10.0)).unwrap();
        assert!(NeighborGrid::new(&[], 0.0, &b).is_err());
    }
}
