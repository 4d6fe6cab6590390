//! Boundary sets, nodal loads and displacement constraints.
//!
//! Node sets are classified geometrically from the mesh once at setup:
//!
//! - [`NodeRule::FaceAt`] - nodes on a coordinate plane
//! - [`NodeRule::SimplySupported`] - both extreme planes along an axis
//! - [`NodeRule::Nearest`] - nodes closest to a plane (e.g. midspan)
//! - [`NodeRule::Explicit`] - a caller-provided list
//!
//! Loads spread a total force equally over their target set; the distributed
//! mode uses the same per-node share and does not integrate a traction.

use crate::error::{Error, Result};
use crate::mesh::{dof_index, Mesh, DOFS_PER_NODE};
use crate::types::Vec3;
use nalgebra::DVector;
use std::fmt;

/// Relative tolerance used when none is supplied.
pub const DEFAULT_RELATIVE_TOL: f64 = 1e-6;

/// Maximum deviation of a load direction's length from 1.
pub const UNIT_DIRECTION_TOL: f64 = 1e-9;

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index (0 = x, 1 = y, 2 = z).
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Sorted, duplicate-free set of node indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet(Vec<usize>);

impl NodeSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from any index list; sorts and removes duplicates.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut v: Vec<usize> = indices.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        Self(v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.0.binary_search(&node).is_ok()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Set union.
    pub fn union(&self, other: &NodeSet) -> NodeSet {
        Self::from_indices(self.iter().chain(other.iter()))
    }

    /// Zero-displacement constraints on all three components of every node.
    pub fn fixed_constraints(&self) -> Vec<Constraint> {
        self.iter()
            .flat_map(|node| (0..DOFS_PER_NODE).map(move |c| Constraint::fixed(node, c)))
            .collect()
    }
}

impl FromIterator<usize> for NodeSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_indices(iter)
    }
}

/// Geometric rule selecting a node set.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeRule {
    /// Nodes whose coordinate along `axis` is within `tol` of `coordinate`.
    /// `None` uses 1e-6 of the mesh extent along the axis.
    FaceAt {
        axis: Axis,
        coordinate: f64,
        tol: Option<f64>,
    },
    /// Union of the minimum and maximum faces along `axis`.
    SimplySupported { axis: Axis },
    /// Nodes at the minimum distance from the plane `axis = coordinate`.
    Nearest { axis: Axis, coordinate: f64 },
    /// Caller-provided node indices.
    Explicit(Vec<usize>),
}

impl NodeRule {
    pub fn face_at(axis: Axis, coordinate: f64) -> Self {
        NodeRule::FaceAt {
            axis,
            coordinate,
            tol: None,
        }
    }
}

/// Default matching tolerance along an axis.
pub fn default_tolerance(mesh: &Mesh, axis: Axis) -> f64 {
    let (min, max) = mesh.bounds();
    let extent = max[axis.index()] - min[axis.index()];
    if extent > 0.0 {
        DEFAULT_RELATIVE_TOL * extent
    } else {
        DEFAULT_RELATIVE_TOL
    }
}

/// Select the nodes matching `rule`.
///
/// # Errors
///
/// [`Error::InvalidConstraint`] for a non-finite coordinate, a negative or
/// non-finite tolerance, or an explicit index outside the mesh.
pub fn classify_nodes(mesh: &Mesh, rule: &NodeRule) -> Result<NodeSet> {
    match rule {
        NodeRule::FaceAt {
            axis,
            coordinate,
            tol,
        } => {
            let tol = match tol {
                Some(t) if t.is_finite() && *t >= 0.0 => *t,
                Some(t) => {
                    return Err(Error::InvalidConstraint(format!(
                        "face tolerance must be non-negative and finite, got {t}"
                    )))
                }
                None => default_tolerance(mesh, *axis),
            };
            check_coordinate(*coordinate)?;
            Ok(face_nodes(mesh, *axis, *coordinate, tol))
        }
        NodeRule::SimplySupported { axis } => {
            let (min, max) = mesh.bounds();
            let a = axis.index();
            let tol = default_tolerance(mesh, *axis);
            Ok(face_nodes(mesh, *axis, min[a], tol).union(&face_nodes(mesh, *axis, max[a], tol)))
        }
        NodeRule::Nearest { axis, coordinate } => {
            check_coordinate(*coordinate)?;
            let a = axis.index();
            let distance = |n: usize| (mesh.nodes()[n][a] - coordinate).abs();
            let closest = (0..mesh.n_nodes()).map(distance).fold(f64::INFINITY, f64::min);
            let tol = default_tolerance(mesh, *axis);
            Ok((0..mesh.n_nodes())
                .filter(|&n| distance(n) - closest <= tol)
                .collect())
        }
        NodeRule::Explicit(nodes) => {
            if let Some(&bad) = nodes.iter().find(|&&n| n >= mesh.n_nodes()) {
                return Err(Error::InvalidConstraint(format!(
                    "node {bad} out of range (mesh has {} nodes)",
                    mesh.n_nodes()
                )));
            }
            Ok(NodeSet::from_indices(nodes.iter().copied()))
        }
    }
}

fn check_coordinate(coordinate: f64) -> Result<()> {
    if coordinate.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidConstraint(format!(
            "plane coordinate must be finite, got {coordinate}"
        )))
    }
}

fn face_nodes(mesh: &Mesh, axis: Axis, coordinate: f64, tol: f64) -> NodeSet {
    let a = axis.index();
    mesh.nodes()
        .iter()
        .enumerate()
        .filter(|(_, p)| (p[a] - coordinate).abs() <= tol)
        .map(|(i, _)| i)
        .collect()
}

/// How a load's total force reaches the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Concentrated force shared by the target nodes.
    Point,
    /// Surface load; shared equally per node, no areal integration.
    Distributed,
}

/// Unit direction of gravity-style loads, (0, 0, -1).
pub fn downward() -> Vec3 {
    Vec3::new(0.0, 0.0, -1.0)
}

/// Total force applied along a unit direction and split over a node set.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    kind: LoadKind,
    magnitude: f64,
    direction: Vec3,
    target: NodeSet,
}

impl Load {
    /// Validated load.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLoadSpec`] if the magnitude is non-finite, the
    /// direction is not a unit vector to within 1e-9, or the target set is
    /// empty.
    pub fn new(kind: LoadKind, magnitude: f64, direction: Vec3, target: NodeSet) -> Result<Self> {
        if !magnitude.is_finite() {
            return Err(Error::InvalidLoadSpec(format!(
                "magnitude must be finite, got {magnitude}"
            )));
        }
        let norm = direction.norm();
        if !norm.is_finite() || (norm - 1.0).abs() > UNIT_DIRECTION_TOL {
            return Err(Error::InvalidLoadSpec(format!(
                "direction ({}, {}, {}) is not a unit vector (length {norm})",
                direction.x, direction.y, direction.z
            )));
        }
        if target.is_empty() {
            return Err(Error::InvalidLoadSpec("target node set is empty".into()));
        }

        Ok(Self {
            kind,
            magnitude,
            direction: direction / norm,
            target,
        })
    }

    pub fn point(magnitude: f64, direction: Vec3, target: NodeSet) -> Result<Self> {
        Self::new(LoadKind::Point, magnitude, direction, target)
    }

    pub fn distributed(magnitude: f64, direction: Vec3, target: NodeSet) -> Result<Self> {
        Self::new(LoadKind::Distributed, magnitude, direction, target)
    }

    pub fn kind(&self) -> LoadKind {
        self.kind
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn target(&self) -> &NodeSet {
        &self.target
    }

    /// Force vector received by each target node.
    pub fn nodal_force(&self) -> Vec3 {
        self.direction * (self.magnitude / self.target.len() as f64)
    }
}

/// Add a load's nodal forces into the global force vector.
///
/// # Errors
///
/// [`Error::InvalidLoadSpec`] if a target node is outside the mesh or `f`
/// does not have one entry per DOF.
pub fn apply_load(f: &mut DVector<f64>, mesh: &Mesh, load: &Load) -> Result<()> {
    if f.len() != mesh.n_dofs() {
        return Err(Error::InvalidLoadSpec(format!(
            "force vector has {} entries, mesh has {} DOFs",
            f.len(),
            mesh.n_dofs()
        )));
    }
    if let Some(bad) = load.target.iter().find(|&n| n >= mesh.n_nodes()) {
        return Err(Error::InvalidLoadSpec(format!(
            "load targets node {bad} (mesh has {} nodes)",
            mesh.n_nodes()
        )));
    }

    let share = load.nodal_force();
    for node in load.target.iter() {
        for c in 0..DOFS_PER_NODE {
            f[dof_index(node, c)] += share[c];
        }
    }
    Ok(())
}

/// Prescribed displacement of one nodal component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub node: usize,
    /// 0 = x, 1 = y, 2 = z
    pub component: usize,
    pub value: f64,
}

impl Constraint {
    pub fn new(node: usize, component: usize, value: f64) -> Self {
        Self {
            node,
            component,
            value,
        }
    }

    /// Zero displacement.
    pub fn fixed(node: usize, component: usize) -> Self {
        Self::new(node, component, 0.0)
    }

    /// Check against a mesh and return the global DOF index.
    pub fn dof(&self, mesh: &Mesh) -> Result<usize> {
        if self.node >= mesh.n_nodes() {
            return Err(Error::InvalidConstraint(format!(
                "node {} out of range (mesh has {} nodes)",
                self.node,
                mesh.n_nodes()
            )));
        }
        if self.component >= DOFS_PER_NODE {
            return Err(Error::InvalidConstraint(format!(
                "component {} out of range on node {}",
                self.component, self.node
            )));
        }
        if !self.value.is_finite() {
            return Err(Error::InvalidConstraint(format!(
                "prescribed value {} on node {} is not finite",
                self.value, self.node
            )));
        }
        Ok(dof_index(self.node, self.component))
    }
}
