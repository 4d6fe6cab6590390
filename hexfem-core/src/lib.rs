//! hexfem - linear elastic static analysis on hexahedral meshes
//!
//! Small-strain finite element solver for 3D solids built from 8-node
//! trilinear hexahedra:
//! - Isotropic linear elastic material
//! - Full 2×2×2 Gauss integration of element stiffness
//! - Parallel element assembly using Rayon into a deterministic CSR matrix
//! - Sparse Cholesky solve with a reciprocal condition check
//! - Element strain/stress recovery and derived scalar fields
//!
//! # Architecture
//!
//! - [`Mesh`]: node coordinates and hexahedral connectivity
//! - [`Material`]: elastic constants and the constitutive matrix
//! - [`Element`] trait: element stiffness and stress recovery ([`Hex8`])
//! - [`boundary`]: node selection, loads and prescribed displacements
//! - [`LinearSystem`]: assembled K and f, modified in place by constraints
//! - [`Solver`] trait: linear system solution strategies
//! - [`StaticAnalysis`]: the whole pipeline from mesh to summary

pub mod types;
pub mod error;
pub mod material;
pub mod mesh;
pub mod generator;
pub mod element;
pub mod boundary;
pub mod sparse;
pub mod assembly;
pub mod solver;
pub mod postprocess;
pub mod analysis;

pub use analysis::{AnalysisConfig, LoadCase, StaticAnalysis, StaticResults, Summary, Support};
pub use assembly::{assemble, LinearSystem};
pub use boundary::{Axis, Constraint, Load, NodeRule, NodeSet};
pub use element::{Element, Hex8};
pub use error::{Error, Result};
pub use material::Material;
pub use mesh::Mesh;
pub use postprocess::StressField;
pub use solver::{Solver, SolverConfig};
pub use sparse::CsrMatrix;
pub use types::{Point3, StrainTensor, StressTensor, Vec3};
