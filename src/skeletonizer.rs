//! The skeletonization pipeline and its result.

use tracing::{info, warn};

use crate::atoms::{DefectAtom, PlanarAtom};
use crate::burgers::{BurgersReport, BurgersVectorAnalyzer};
use crate::crystal::CrystalStructure;
use crate::error::{GraphError, Result};
use crate::graph::{Dislocation, NodeId, SkeletonGraph};
use crate::interrupt::Interrupt;
use crate::math::{PeriodicBox, Point3};
use crate::operations::{
    BuildSkeleton, ContractionReport, DislocationFixing, ExtractDislocations, FixingReport,
    MeshContraction, Prune, PruneReport, SmoothDislocations,
};
use crate::planar::{LinkPlanarDefects, PlanarDefect, PlanarDefectDetector};
use crate::settings::SkeletonizerSettings;

/// Per-phase summary of one skeletonization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonReport {
    pub defect_atoms: usize,
    /// Skeleton cutoff used for building, merging and fixing.
    pub cutoff: f64,
    pub contraction: ContractionReport,
    pub prune: PruneReport,
    pub fixing: FixingReport,
    /// `None` if the run stopped before the analysis.
    pub burgers: Option<BurgersReport>,
    /// The run was interrupted; the skeleton holds the phases completed so far.
    pub cancelled: bool,
}

/// Result of a skeletonization run: the contracted node graph, the
/// dislocation curves and the planar defects.
#[derive(Debug, Clone)]
pub struct Skeleton {
    graph: SkeletonGraph,
    dislocations: Vec<Dislocation>,
    planar_defects: Vec<PlanarDefect>,
    periodic_box: PeriodicBox,
    report: SkeletonReport,
}

impl Skeleton {
    fn empty(periodic_box: &PeriodicBox, report: SkeletonReport) -> Self {
        Self {
            graph: SkeletonGraph::new(),
            dislocations: Vec::new(),
            planar_defects: Vec::new(),
            periodic_box: periodic_box.clone(),
            report,
        }
    }

    fn cancelled(mut self, phase: &str) -> Self {
        warn!(phase, "skeletonization cancelled, returning partial skeleton");
        self.report.cancelled = true;
        self
    }

    #[must_use]
    pub fn graph(&self) -> &SkeletonGraph {
        &self.graph
    }

    #[must_use]
    pub fn dislocations(&self) -> &[Dislocation] {
        &self.dislocations
    }

    #[must_use]
    pub fn planar_defects(&self) -> &[PlanarDefect] {
        &self.planar_defects
    }

    #[must_use]
    pub fn periodic_box(&self) -> &PeriodicBox {
        &self.periodic_box
    }

    #[must_use]
    pub fn report(&self) -> &SkeletonReport {
        &self.report
    }

    /// Nodes of degree three or more, in serial order.
    #[must_use]
    pub fn junctions(&self) -> Vec<NodeId> {
        self.graph
            .sorted_ids()
            .into_iter()
            .filter(|&id| self.graph.degree(id) >= 3)
            .collect()
    }

    /// Node positions of a curve, in curve order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` for a curve not belonging to this
    /// skeleton.
    pub fn positions(&self, dislocation: &Dislocation) -> Result<Vec<Point3>> {
        dislocation
            .nodes
            .iter()
            .map(|&id| self.graph.node(id).map(|n| n.position))
            .collect::<std::result::Result<_, GraphError>>()
            .map_err(Into::into)
    }

    /// Length of one curve.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::NodeNotFound` for a curve not belonging to this
    /// skeleton.
    pub fn length(&self, dislocation: &Dislocation) -> Result<f64> {
        Ok(dislocation.length(&self.graph, &self.periodic_box)?)
    }

    /// Summed length of all curves.
    ///
    /// # Errors
    ///
    /// Returns an error only if the skeleton is inconsistent.
    pub fn total_length(&self) -> Result<f64> {
        self.dislocations.iter().map(|d| self.length(d)).sum()
    }

    /// Line length per box volume.
    ///
    /// # Errors
    ///
    /// Returns an error only if the skeleton is inconsistent.
    pub fn density(&self) -> Result<f64> {
        Ok(self.total_length()? / self.periodic_box.volume())
    }
}

/// Runs the full pipeline: build, contract, prune, extract, fix, smooth,
/// detect planar defects and analyse Burgers vectors.
#[derive(Debug)]
pub struct Skeletonizer<'a> {
    crystal: &'a CrystalStructure,
    periodic_box: &'a PeriodicBox,
    settings: SkeletonizerSettings,
    interrupt: Interrupt,
}

impl<'a> Skeletonizer<'a> {
    /// Creates a skeletonizer with default settings.
    #[must_use]
    pub fn new(crystal: &'a CrystalStructure, periodic_box: &'a PeriodicBox) -> Self {
        Self {
            crystal,
            periodic_box,
            settings: SkeletonizerSettings::default(),
            interrupt: Interrupt::new(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SkeletonizerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Shares an interrupt flag; triggering it makes the run return the
    /// partial skeleton at the next check.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Skeleton cutoff: meshing threshold times the crystal's
    /// nearest-neighbor cutoff.
    #[must_use]
    pub fn cutoff(&self) -> f64 {
        self.settings.meshing_threshold * self.crystal.nearest_neighbor_cutoff()
    }

    fn cross_grain(&self) -> bool {
        self.settings.allow_cross_grain || self.crystal.skeletonize_across_grains()
    }

    /// Executes the pipeline.
    ///
    /// Cancellation is not an error: the skeleton built so far is returned
    /// with [`SkeletonReport::cancelled`] set.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidInput` for invalid settings or input
    /// atoms and a `GraphError` if the graph loses its symmetry between
    /// phases.
    pub fn execute(&self, defect_atoms: &[DefectAtom], planar_atoms: &[PlanarAtom]) -> Result<Skeleton> {
        self.settings.validate()?;
        let cutoff = self.cutoff();
        let report = SkeletonReport {
            defect_atoms: defect_atoms.len(),
            cutoff,
            ..SkeletonReport::default()
        };
        let mut skeleton = Skeleton::empty(self.periodic_box, report);
        if self.interrupt.is_triggered() {
            return Ok(skeleton.cancelled("build"));
        }

        skeleton.graph = BuildSkeleton::new(defect_atoms, cutoff)
            .same_grain_only(!self.cross_grain())
            .execute(self.periodic_box)?;
        info!(
            atoms = defect_atoms.len(),
            edges = skeleton.graph.edges().len(),
            cutoff,
            "built skeleton graph"
        );

        skeleton.report.contraction =
            MeshContraction::new(self.periodic_box, cutoff, self.settings.contraction)
                .with_interrupt(self.interrupt.clone())
                .execute(&mut skeleton.graph)?;
        if skeleton.report.contraction.cancelled {
            return Ok(skeleton.cancelled("contraction"));
        }
        info!(
            iterations = skeleton.report.contraction.iterations,
            merged = skeleton.report.contraction.merged,
            nodes = skeleton.graph.len(),
            "contracted skeleton"
        );

        skeleton.report.prune = Prune::new(
            self.periodic_box,
            cutoff,
            self.settings.contraction.merge_tolerance,
            self.settings.prune,
        )
        .execute(&mut skeleton.graph)?;
        skeleton.graph.check_symmetry()?;
        if self.interrupt.is_triggered() {
            return Ok(skeleton.cancelled("prune"));
        }

        skeleton.dislocations = ExtractDislocations::new().execute(&skeleton.graph)?;
        if self.interrupt.is_triggered() {
            return Ok(skeleton.cancelled("extraction"));
        }

        skeleton.report.fixing =
            DislocationFixing::new(defect_atoms, self.periodic_box, cutoff, self.settings.fixing)
                .cross_grain(self.cross_grain())
                .execute(&mut skeleton.graph, &mut skeleton.dislocations)?;
        skeleton.graph.check_symmetry()?;
        if self.interrupt.is_triggered() {
            return Ok(skeleton.cancelled("fixing"));
        }

        SmoothDislocations::new(self.periodic_box, self.settings.smoothing)
            .execute(&mut skeleton.graph, &skeleton.dislocations)?;
        if self.interrupt.is_triggered() {
            return Ok(skeleton.cancelled("smoothing"));
        }

        let nn_cutoff = self.crystal.nearest_neighbor_cutoff();
        skeleton.planar_defects = PlanarDefectDetector::new(
            planar_atoms,
            self.periodic_box,
            nn_cutoff,
            self.settings.planar,
        )
        .with_plane_normals(self.crystal.sample_plane_normals())
        .execute()?;
        LinkPlanarDefects::new(
            planar_atoms,
            self.periodic_box,
            self.settings.planar.link_distance * nn_cutoff,
        )
        .execute(
            &skeleton.graph,
            &mut skeleton.planar_defects,
            &mut skeleton.dislocations,
        )?;
        if self.interrupt.is_triggered() {
            return Ok(skeleton.cancelled("planar defects"));
        }

        skeleton.report.burgers = Some(
            BurgersVectorAnalyzer::new(
                self.crystal,
                defect_atoms,
                self.periodic_box,
                self.settings.classification,
            )
            .execute(&skeleton.graph, &mut skeleton.dislocations)?,
        );

        info!(
            nodes = skeleton.graph.len(),
            dislocations = skeleton.dislocations.len(),
            junctions = skeleton.junctions().len(),
            planar_defects = skeleton.planar_defects.len(),
            "skeletonization done"
        );
        Ok(skeleton)
    }
}
