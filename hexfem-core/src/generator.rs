//! Structured hexahedral mesh generation.
//!
//! Nodes of an `nx × ny × nz` grid are numbered with `k` (z) fastest:
//!
//! ```text
//! node(i, j, k) = (i * (ny + 1) + j) * (nz + 1) + k
//! ```
//!
//! and every element lists its vertices in reference-cube order, so the
//! generated elements always have a positive Jacobian.

use crate::error::{Error, Result};
use crate::mesh::{Connectivity, Mesh};
use crate::types::{Point3, Vec3};

/// Structured box mesh spanning `origin .. origin + extents`.
///
/// # Errors
///
/// [`Error::InvalidMesh`] if any division count is zero or any extent is
/// not positive and finite.
pub fn box_mesh(origin: Point3, extents: Vec3, divisions: [usize; 3]) -> Result<Mesh> {
    if divisions.contains(&0) {
        return Err(Error::InvalidMesh(format!(
            "division counts must be at least 1, got {divisions:?}"
        )));
    }
    if !extents.iter().all(|e| e.is_finite() && *e > 0.0) || !origin.iter().all(|c| c.is_finite()) {
        return Err(Error::InvalidMesh(format!(
            "box extents must be positive and finite, got ({}, {}, {})",
            extents.x, extents.y, extents.z
        )));
    }

    let [nx, ny, nz] = divisions;
    let node_id = |i: usize, j: usize, k: usize| (i * (ny + 1) + j) * (nz + 1) + k;

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for i in 0..=nx {
        let x = origin.x + extents.x * (i as f64 / nx as f64);
        for j in 0..=ny {
            let y = origin.y + extents.y * (j as f64 / ny as f64);
            for k in 0..=nz {
                let z = origin.z + extents.z * (k as f64 / nz as f64);
                nodes.push(Point3::new(x, y, z));
            }
        }
    }

    let mut elements: Vec<Connectivity> = Vec::with_capacity(nx * ny * nz);
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                elements.push([
                    node_id(i, j, k),
                    node_id(i + 1, j, k),
                    node_id(i + 1, j + 1, k),
                    node_id(i, j + 1, k),
                    node_id(i, j, k + 1),
                    node_id(i + 1, j, k + 1),
                    node_id(i + 1, j + 1, k + 1),
                    node_id(i, j + 1, k + 1),
                ]);
            }
        }
    }

    Mesh::new(nodes, elements)
}

/// Slender beam along +x with a single element through its cross-section.
///
/// Spans x ∈ [0, length], y ∈ [-width/2, width/2], z ∈ [-height/2, height/2].
pub fn cantilever_beam(length: f64, height: f64, width: f64, n_elements: usize) -> Result<Mesh> {
    box_mesh(
        Point3::new(0.0, -0.5 * width, -0.5 * height),
        Vec3::new(length, width, height),
        [n_elements, 1, 1],
    )
}

/// Four-element bracket on a 2×2×1 unit grid in the z = 0..1 slab.
///
/// The first two elements form the y ∈ [0, 1] leg, the last two the
/// y ∈ [1, 2] leg; 18 nodes in total.
pub fn bracket() -> Result<Mesh> {
    #[rustfmt::skip]
    const NODES: [[f64; 3]; 18] = [
        [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0],
        [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [2.0, 1.0, 0.0],
        [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [2.0, 0.0, 1.0],
        [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [2.0, 1.0, 1.0],
        [0.0, 2.0, 0.0], [1.0, 2.0, 0.0], [2.0, 2.0, 0.0],
        [0.0, 2.0, 1.0], [1.0, 2.0, 1.0], [2.0, 2.0, 1.0],
    ];
    const ELEMENTS: [Connectivity; 4] = [
        [0, 1, 4, 3, 6, 7, 10, 9],
        [1, 2, 5, 4, 7, 8, 11, 10],
        [3, 4, 13, 12, 9, 10, 16, 15],
        [4, 5, 14, 13, 10, 11, 17, 16],
    ];

    Mesh::from_arrays(&NODES, &ELEMENTS)
}
