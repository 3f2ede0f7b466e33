//! Plain-text export of a skeleton.
//!
//! ```text
//! <node count>
//! <id> <x> <y> <z>                                   one line per node
//! <dislocation count>
//! <id> <n> <node id 1> .. <node id n> <bx> <by> <bz> <y|n>
//! ```
//!
//! Node ids are node serials. The Burgers vector is written in crystal
//! coordinates when it is identified (`y`), otherwise the averaged
//! resultant vector (or zero) is written with `n`.

use std::io::Write;

use crate::error::{GeometryError, Result};
use crate::math::Vector3;
use crate::skeletonizer::Skeleton;

/// Writes `skeleton` in the plain-text exchange format.
///
/// # Errors
///
/// Returns `GeometryError::NonFinite` if a coordinate or vector component
/// is not finite (nothing after the offending record is written), or an
/// I/O error from `out`.
pub fn write_skeleton<W: Write>(skeleton: &Skeleton, mut out: W) -> Result<()> {
    let graph = skeleton.graph();
    let ids = graph.sorted_ids();

    writeln!(out, "{}", ids.len())?;
    for id in ids {
        let node = graph.node(id)?;
        let p = node.position;
        if !p.iter().all(|c| c.is_finite()) {
            return Err(GeometryError::NonFinite(format!("node {}", node.serial)).into());
        }
        writeln!(out, "{} {} {} {}", node.serial, p.x, p.y, p.z)?;
    }

    writeln!(out, "{}", skeleton.dislocations().len())?;
    for d in skeleton.dislocations() {
        let info = &d.burgers;
        let identified = info.burgers_vector.kind().is_defined();
        let b = if identified {
            info.burgers_vector.to_crystal()
        } else {
            info.average.unwrap_or_else(Vector3::zeros)
        };
        if !b.iter().all(|c| c.is_finite()) {
            return Err(GeometryError::NonFinite(format!("dislocation {}", d.id)).into());
        }

        write!(out, "{} {}", d.id, d.nodes.len())?;
        for &id in &d.nodes {
            write!(out, " {}", graph.serial(id))?;
        }
        writeln!(
            out,
            " {} {} {} {}",
            b.x,
            b.y,
            b.z,
            if identified { 'y' } else { 'n' }
        )?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::atoms::{DefectAtom, Rbv};
    use crate::crystal::CrystalStructure;
    use crate::math::{PeriodicBox, Point3};
    use crate::skeletonizer::Skeletonizer;

    fn skeleton(rbv: Option<Rbv>) -> Skeleton {
        let pbox = PeriodicBox::fully_periodic(Vector3::new(40.0, 40.0, 40.0)).unwrap();
        let crystal = CrystalStructure::fcc(1.0).unwrap();
        let atoms: Vec<DefectAtom> = (0..5)
            .map(|i| {
                let mut a = DefectAtom::new(Point3::new(10.0 + f64::from(i), 20.0, 20.0));
                a.rbv = rbv;
                a
            })
            .collect();
        let settings = crate::settings::SkeletonizerSettings {
            meshing_threshold: 1.5 / crystal.nearest_neighbor_cutoff(),
            ..Default::default()
        };
        Skeletonizer::new(&crystal, &pbox)
            .with_settings(settings)
            .execute(&atoms, &[])
            .unwrap()
    }

    #[test]
    fn writes_nodes_and_curves() {
        let mut buf = Vec::new();
        write_skeleton(&skeleton(None), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "5");
        assert_eq!(lines[1], "0 10 20 20");
        assert_eq!(lines[6], "1");
        assert_eq!(lines[7], "0 5 0 1 2 3 4 0 0 0 n");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn identified_vector_is_written_in_crystal_coordinates() {
        let rbv = Rbv::new(Vector3::x(), Vector3::new(0.5, 0.0, 0.5));
        let mut buf = Vec::new();
        write_skeleton(&skeleton(Some(rbv)), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let last = text.lines().last().unwrap();
        assert_eq!(last, "0 5 0 1 2 3 4 0.5 0 0.5 y");
    }
}
