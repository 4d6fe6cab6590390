//! Mesh data structure for FEA.
//!
//! Stores nodal coordinates and 8-node hexahedral connectivity. A [`Mesh`]
//! is validated once at construction and immutable afterwards.

use crate::element::Hex8;
use crate::error::{Error, Result};
use crate::types::Point3;
use tracing::debug;

/// Nodes per element.
pub const NODES_PER_ELEMENT: usize = 8;

/// Displacement components per node.
pub const DOFS_PER_NODE: usize = 3;

/// Element connectivity: eight node indices in reference-cube vertex order.
pub type Connectivity = [usize; NODES_PER_ELEMENT];

/// Global DOF index of component `component` (0 = x, 1 = y, 2 = z) of `node`.
#[inline]
pub const fn dof_index(node: usize, component: usize) -> usize {
    DOFS_PER_NODE * node + component
}

/// Finite element mesh of 8-node hexahedra.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    nodes: Vec<Point3>,
    elements: Vec<Connectivity>,
}

impl Mesh {
    /// Build and validate a mesh.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMesh`] if there are no elements, fewer than eight
    /// nodes, a non-finite coordinate, a node index out of range, or an
    /// element whose Jacobian determinant is not positive at some 2×2×2
    /// integration point.
    pub fn new(nodes: Vec<Point3>, elements: Vec<Connectivity>) -> Result<Self> {
        if elements.is_empty() {
            return Err(Error::InvalidMesh("mesh has no elements".into()));
        }
        if nodes.len() < NODES_PER_ELEMENT {
            return Err(Error::InvalidMesh(format!(
                "mesh needs at least {} nodes, got {}",
                NODES_PER_ELEMENT,
                nodes.len()
            )));
        }
        if let Some(i) = nodes.iter().position(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(Error::InvalidMesh(format!("node {i} has a non-finite coordinate")));
        }

        for (e, conn) in elements.iter().enumerate() {
            if let Some(&bad) = conn.iter().find(|&&n| n >= nodes.len()) {
                return Err(Error::InvalidMesh(format!(
                    "element {e} references node {bad} (mesh has {} nodes)",
                    nodes.len()
                )));
            }
        }

        let mesh = Self { nodes, elements };

        for (e, conn) in mesh.elements.iter().enumerate() {
            let dets = Hex8::jacobian_determinants(&mesh.coords_of(conn))?;
            if let Some((gp, det)) = dets.iter().enumerate().find(|&(_, &d)| !(d > 0.0)) {
                return Err(Error::InvalidMesh(format!(
                    "element {e} has non-positive Jacobian determinant {det:e} at Gauss point {gp}"
                )));
            }
        }

        debug!(
            n_nodes = mesh.n_nodes(),
            n_elements = mesh.n_elements(),
            "mesh validated"
        );
        Ok(mesh)
    }

    /// Build a mesh from plain coordinate triples.
    pub fn from_arrays(nodes: &[[f64; 3]], elements: &[Connectivity]) -> Result<Self> {
        Self::new(
            nodes.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
            elements.to_vec(),
        )
    }

    /// Number of nodes in the mesh.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements in the mesh.
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// Total number of degrees of freedom, 3 per node.
    pub fn n_dofs(&self) -> usize {
        DOFS_PER_NODE * self.nodes.len()
    }

    /// Nodal coordinates.
    pub fn nodes(&self) -> &[Point3] {
        &self.nodes
    }

    /// A specific node's coordinates.
    pub fn node(&self, idx: usize) -> Option<&Point3> {
        self.nodes.get(idx)
    }

    /// Element connectivity.
    pub fn elements(&self) -> &[Connectivity] {
        &self.elements
    }

    /// A specific element's connectivity.
    pub fn element(&self, idx: usize) -> Option<&Connectivity> {
        self.elements.get(idx)
    }

    /// Coordinates of an element's nodes in local vertex order.
    pub fn element_coords(&self, elem_idx: usize) -> Option<[Point3; NODES_PER_ELEMENT]> {
        self.elements.get(elem_idx).map(|conn| self.coords_of(conn))
    }

    // connectivity is validated at construction
    pub(crate) fn coords_of(&self, conn: &Connectivity) -> [Point3; NODES_PER_ELEMENT] {
        conn.map(|i| self.nodes[i])
    }

    /// Global DOF indices of an element, node-major.
    pub fn element_dofs(&self, conn: &Connectivity) -> [usize; NODES_PER_ELEMENT * DOFS_PER_NODE] {
        let mut dofs = [0; NODES_PER_ELEMENT * DOFS_PER_NODE];
        for (i, &node) in conn.iter().enumerate() {
            for c in 0..DOFS_PER_NODE {
                dofs[DOFS_PER_NODE * i + c] = dof_index(node, c);
            }
        }
        dofs
    }

    /// Number of elements incident to each node.
    pub fn incident_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.nodes.len()];
        for conn in &self.elements {
            for &n in conn {
                counts[n] += 1;
            }
        }
        counts
    }

    /// Axis-aligned bounding box as (min, max).
    pub fn bounds(&self) -> (Point3, Point3) {
        let mut min = self.nodes[0];
        let mut max = self.nodes[0];

        for node in &self.nodes[1..] {
            for i in 0..3 {
                min[i] = min[i].min(node[i]);
                max[i] = max[i].max(node[i]);
            }
        }

        (min, max)
    }
}
