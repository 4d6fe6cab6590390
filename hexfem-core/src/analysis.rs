//! End-to-end static analysis.
//!
//! [`StaticAnalysis`] runs the full pipeline on a borrowed mesh:
//!
//! ```text
//! assemble -> loads -> constraints -> solve -> recover
//! ```
//!
//! Supports and loads are given either as beam presets (the beam axis is x
//! and gravity-style loads act along -z) or as explicit node sets, loads and
//! constraints.
//!
//! # Example
//!
//! ```
//! use hexfem_core::analysis::{LoadCase, StaticAnalysis, Support};
//! use hexfem_core::generator::cantilever_beam;
//! use hexfem_core::material::Material;
//!
//! let mesh = cantilever_beam(5.0, 0.5, 0.3, 15).unwrap();
//! let results = StaticAnalysis::new(&mesh, Material::steel())
//!     .support(Support::Cantilever)
//!     .load(LoadCase::TipPoint { magnitude: 5000.0 })
//!     .run()
//!     .unwrap();
//!
//! let summary = results.summary(Some(250e6)).unwrap();
//! assert!(summary.max_displacement > 0.0);
//! ```

use crate::assembly::{assemble_with, AssemblyOptions};
use crate::boundary::{classify_nodes, downward, Axis, Constraint, Load, NodeRule, NodeSet};
use crate::error::Result;
use crate::material::Material;
use crate::mesh::{Mesh, DOFS_PER_NODE};
use crate::postprocess::{self, StressField};
use crate::solver::{SolveStats, SolverConfig};
use crate::types::Vec3;
use nalgebra::DVector;
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisConfig {
    pub assembly: AssemblyOptions,
    pub solver: SolverConfig,
}

/// Essential boundary conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Support {
    /// All nodes on the minimum-x face fully fixed.
    Cantilever,
    /// Both x faces fully fixed.
    SimplySupported,
    /// Fully fix the given nodes.
    Fixed(NodeSet),
    /// Arbitrary per-component prescribed displacements.
    Custom(Vec<Constraint>),
}

/// Applied loading. Presets act along -z.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadCase {
    /// Point load shared by the nodes on the maximum-x face.
    TipPoint { magnitude: f64 },
    /// Distributed load shared by the nodes on the maximum-z face.
    TopDistributed { magnitude: f64 },
    /// Point load shared by the nodes nearest the middle of the x range.
    MidspanPoint { magnitude: f64 },
    /// Explicit loads.
    Custom(Vec<Load>),
    /// No external load.
    None,
}

/// Builder and driver for a linear static analysis.
#[derive(Debug, Clone)]
pub struct StaticAnalysis<'a> {
    mesh: &'a Mesh,
    material: Material,
    support: Support,
    load: LoadCase,
    config: AnalysisConfig,
}

impl<'a> StaticAnalysis<'a> {
    /// Cantilever support and no load until configured.
    pub fn new(mesh: &'a Mesh, material: Material) -> Self {
        Self {
            mesh,
            material,
            support: Support::Cantilever,
            load: LoadCase::None,
            config: AnalysisConfig::default(),
        }
    }

    pub fn support(mut self, support: Support) -> Self {
        self.support = support;
        self
    }

    pub fn load(mut self, load: LoadCase) -> Self {
        self.load = load;
        self
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the support into prescribed displacements.
    pub fn constraints(&self) -> Result<Vec<Constraint>> {
        let rule = match &self.support {
            Support::Cantilever => {
                let (min, _) = self.mesh.bounds();
                NodeRule::face_at(Axis::X, min.x)
            }
            Support::SimplySupported => NodeRule::SimplySupported { axis: Axis::X },
            Support::Fixed(nodes) => NodeRule::Explicit(nodes.as_slice().to_vec()),
            Support::Custom(constraints) => return Ok(constraints.clone()),
        };
        Ok(classify_nodes(self.mesh, &rule)?.fixed_constraints())
    }

    /// Resolve the load case into explicit loads.
    pub fn loads(&self) -> Result<Vec<Load>> {
        let (min, max) = self.mesh.bounds();
        let preset = |rule: NodeRule, magnitude: f64| -> Result<Vec<Load>> {
            let target = classify_nodes(self.mesh, &rule)?;
            Ok(vec![Load::point(magnitude, downward(), target)?])
        };

        match &self.load {
            LoadCase::TipPoint { magnitude } => {
                preset(NodeRule::face_at(Axis::X, max.x), *magnitude)
            }
            LoadCase::TopDistributed { magnitude } => {
                let target = classify_nodes(self.mesh, &NodeRule::face_at(Axis::Z, max.z))?;
                Ok(vec![Load::distributed(*magnitude, downward(), target)?])
            }
            LoadCase::MidspanPoint { magnitude } => preset(
                NodeRule::Nearest {
                    axis: Axis::X,
                    coordinate: 0.5 * (min.x + max.x),
                },
                *magnitude,
            ),
            LoadCase::Custom(loads) => Ok(loads.clone()),
            LoadCase::None => Ok(Vec::new()),
        }
    }

    /// Run the pipeline.
    ///
    /// # Errors
    ///
    /// Propagates the first failure of any stage; no partial results.
    pub fn run(&self) -> Result<StaticResults<'a>> {
        let mesh = self.mesh;
        let constraints = self.constraints()?;
        let loads = self.loads()?;

        let mut system = assemble_with(mesh, &self.material, &self.config.assembly)?;
        info!(
            n_nodes = mesh.n_nodes(),
            n_elements = mesh.n_elements(),
            n_dofs = system.n_dofs(),
            nnz = system.stiffness().nnz(),
            "assembly complete"
        );

        for load in &loads {
            system.apply_load(mesh, load)?;
        }
        system.apply_prescribed(mesh, &constraints)?;
        info!(
            n_loads = loads.len(),
            n_constraints = constraints.len(),
            "boundary conditions applied"
        );

        let solution = system.solve(&self.config.solver)?;
        info!(
            solver = %solution.stats.solver,
            rcond = solution.stats.rcond,
            seconds = solution.stats.time_seconds,
            "solve complete"
        );

        let field = postprocess::recover(mesh, &self.material, &solution.displacements)?;
        info!(n_elements = field.n_elements(), "stress recovery complete");

        Ok(StaticResults {
            mesh,
            material: self.material,
            displacements: solution.displacements,
            field,
            stats: solution.stats,
            von_mises: OnceLock::new(),
        })
    }
}

/// Displacements and recovered element fields of a solved analysis.
#[derive(Debug)]
pub struct StaticResults<'a> {
    mesh: &'a Mesh,
    material: Material,
    displacements: DVector<f64>,
    field: StressField,
    stats: SolveStats,
    von_mises: OnceLock<Vec<f64>>,
}

impl<'a> StaticResults<'a> {
    pub fn mesh(&self) -> &'a Mesh {
        self.mesh
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Global displacement vector, DOF 3i+k for component k of node i.
    pub fn displacements(&self) -> &DVector<f64> {
        &self.displacements
    }

    /// Displacement vector of one node.
    pub fn node_displacement(&self, node: usize) -> Option<Vec3> {
        (node < self.mesh.n_nodes()).then(|| {
            let u = &self.displacements;
            let base = DOFS_PER_NODE * node;
            Vec3::new(u[base], u[base + 1], u[base + 2])
        })
    }

    pub fn stress_field(&self) -> &StressField {
        &self.field
    }

    pub fn solve_stats(&self) -> &SolveStats {
        &self.stats
    }

    /// Element von Mises stresses, computed on first use.
    pub fn von_mises(&self) -> &[f64] {
        self.von_mises.get_or_init(|| self.field.von_mises())
    }

    pub fn max_abs_normal(&self) -> Vec<f64> {
        self.field.max_abs_normal()
    }

    pub fn displacement_magnitudes(&self) -> Vec<f64> {
        postprocess::displacement_magnitudes(&self.displacements)
    }

    /// (node, magnitude) of the largest displacement.
    pub fn max_displacement(&self) -> Option<(usize, f64)> {
        postprocess::max_displacement(&self.displacements)
    }

    /// Von Mises stress averaged to the nodes.
    pub fn nodal_von_mises(&self) -> Result<Vec<f64>> {
        postprocess::nodal_average(self.mesh, self.von_mises())
    }

    pub fn factor_of_safety(&self, yield_stress: f64) -> Result<f64> {
        postprocess::factor_of_safety(yield_stress, self.von_mises())
    }

    /// Headline numbers; the factor of safety is included when a yield
    /// stress is given.
    pub fn summary(&self, yield_stress: Option<f64>) -> Result<Summary> {
        let vm = self.von_mises();
        let (max_displacement_node, max_displacement) = self.max_displacement().unwrap_or((0, 0.0));
        let n = vm.len().max(1) as f64;

        Ok(Summary {
            n_nodes: self.mesh.n_nodes(),
            n_elements: self.mesh.n_elements(),
            max_displacement,
            max_displacement_node,
            max_von_mises: vm.iter().copied().fold(0.0, f64::max),
            min_von_mises: vm.iter().copied().fold(f64::INFINITY, f64::min),
            mean_von_mises: vm.iter().sum::<f64>() / n,
            max_abs_normal: self.max_abs_normal().into_iter().fold(0.0, f64::max),
            factor_of_safety: yield_stress
                .map(|sy| self.factor_of_safety(sy))
                .transpose()?,
        })
    }
}

/// Safety verdict from a factor of safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// FoS < 1
    Failure,
    /// 1 ≤ FoS < 2
    Marginal,
    /// FoS ≥ 2
    Safe,
}

impl Assessment {
    pub fn from_factor_of_safety(fos: f64) -> Self {
        if fos < 1.0 {
            Assessment::Failure
        } else if fos < 2.0 {
            Assessment::Marginal
        } else {
            Assessment::Safe
        }
    }
}

/// Headline results of an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub n_nodes: usize,
    pub n_elements: usize,
    pub max_displacement: f64,
    pub max_displacement_node: usize,
    pub max_von_mises: f64,
    pub min_von_mises: f64,
    pub mean_von_mises: f64,
    pub max_abs_normal: f64,
    pub factor_of_safety: Option<f64>,
}

impl Summary {
    pub fn assessment(&self) -> Option<Assessment> {
        self.factor_of_safety.map(Assessment::from_factor_of_safety)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes: {}", self.n_nodes)?;
        writeln!(f, "elements: {}", self.n_elements)?;
        writeln!(
            f,
            "max displacement: {:.6e} m (node {})",
            self.max_displacement, self.max_displacement_node
        )?;
        writeln!(
            f,
            "von Mises: max {:.2} Pa, min {:.2} Pa, mean {:.2} Pa",
            self.max_von_mises, self.min_von_mises, self.mean_von_mises
        )?;
        write!(f, "max |normal stress|: {:.2} Pa", self.max_abs_normal)?;
        if let Some(fos) = self.factor_of_safety {
            write!(f, "\nfactor of safety: {fos:.2}")?;
        }
        Ok(())
    }
}
