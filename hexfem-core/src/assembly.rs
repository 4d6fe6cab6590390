//! Global stiffness assembly and constraint application.
//!
//! Element stiffness matrices are computed with Rayon and scattered into a
//! triplet accumulator serially in element order, so the parallel and serial
//! paths produce bit-identical matrices.

use crate::boundary::{self, Constraint, Load, NodeSet};
use crate::element::{Element, Hex8};
use crate::error::{Error, Result};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::solver::{select_solver, Solution, SolverConfig};
use crate::sparse::{self, CsrMatrix, TripletMatrix};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Non-zeros contributed by one 24×24 element matrix.
const ELEMENT_NNZ: usize = 24 * 24;

/// Assembly options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Compute element matrices on the Rayon pool.
    pub parallel: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Global stiffness K and force vector f.
///
/// Built by [`assemble`], modified in place by loads and constraints, and
/// consumed by [`LinearSystem::solve`].
#[derive(Debug, Clone)]
pub struct LinearSystem {
    stiffness: CsrMatrix,
    force: DVector<f64>,
    /// Prescribed value of every constrained DOF.
    constrained: BTreeMap<usize, f64>,
}

/// Assemble the global stiffness matrix with a zero force vector.
///
/// # Example
///
/// ```
/// use hexfem_core::assembly::assemble;
/// use hexfem_core::generator::cantilever_beam;
/// use hexfem_core::material::Material;
///
/// let mesh = cantilever_beam(5.0, 0.5, 0.3, 4).unwrap();
/// let system = assemble(&mesh, &Material::steel()).unwrap();
/// assert_eq!(system.n_dofs(), mesh.n_dofs());
/// ```
pub fn assemble(mesh: &Mesh, material: &Material) -> Result<LinearSystem> {
    assemble_with(mesh, material, &AssemblyOptions::default())
}

/// [`assemble`] with explicit options.
pub fn assemble_with(
    mesh: &Mesh,
    material: &Material,
    options: &AssemblyOptions,
) -> Result<LinearSystem> {
    let n_dofs = mesh.n_dofs();
    let d = material.constitutive_matrix();
    let hex = Hex8::new();

    let element_matrix = |e: usize| -> Result<DMatrix<f64>> {
        let coords = mesh.coords_of(&mesh.elements()[e]);
        hex.stiffness(&coords, &d)
    };
    let element_matrices: Vec<DMatrix<f64>> = if options.parallel {
        (0..mesh.n_elements())
            .into_par_iter()
            .map(element_matrix)
            .collect::<Result<_>>()?
    } else {
        (0..mesh.n_elements())
            .map(element_matrix)
            .collect::<Result<_>>()?
    };

    let mut triplet =
        TripletMatrix::with_capacity(n_dofs, n_dofs, n_dofs + mesh.n_elements() * ELEMENT_NNZ);
    triplet.add_structural_diagonal();
    for (conn, ke) in mesh.elements().iter().zip(&element_matrices) {
        triplet.add_submatrix(&mesh.element_dofs(conn), ke);
    }
    drop(element_matrices);
    debug!(n_dofs, triplets = triplet.nnz(), "scattered element matrices");

    let stiffness = triplet.to_csr()?;
    debug!(nnz = stiffness.nnz(), "global stiffness assembled");

    Ok(LinearSystem {
        stiffness,
        force: DVector::zeros(n_dofs),
        constrained: BTreeMap::new(),
    })
}

impl LinearSystem {
    /// Wrap an existing matrix and force vector.
    ///
    /// # Errors
    ///
    /// [`Error::Solver`] if K is not square, f does not match, a diagonal
    /// entry is missing from the sparsity pattern, or the pattern is not
    /// symmetric.
    pub fn new(stiffness: CsrMatrix, force: DVector<f64>) -> Result<Self> {
        let n = stiffness.nrows();
        if n != stiffness.ncols() || n != force.len() {
            return Err(Error::Solver(format!(
                "stiffness is {}x{} but force has {} entries",
                n,
                stiffness.ncols(),
                force.len()
            )));
        }
        if let Some(i) = (0..n).find(|&i| sparse::find_entry(&stiffness, i, i).is_none()) {
            return Err(Error::Solver(format!("no stored diagonal entry in row {i}")));
        }
        if let Some((r, c, _)) = stiffness
            .triplet_iter()
            .find(|&(r, c, _)| sparse::find_entry(&stiffness, c, r).is_none())
        {
            return Err(Error::Solver(format!(
                "sparsity pattern stores ({r}, {c}) but not ({c}, {r})"
            )));
        }
        Ok(Self {
            stiffness,
            force,
            constrained: BTreeMap::new(),
        })
    }

    pub fn n_dofs(&self) -> usize {
        self.force.len()
    }

    pub fn stiffness(&self) -> &CsrMatrix {
        &self.stiffness
    }

    pub fn force(&self) -> &DVector<f64> {
        &self.force
    }

    /// Constrained DOFs and their prescribed values, in DOF order.
    pub fn constrained_dofs(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.constrained.iter().map(|(&d, &g)| (d, g))
    }

    /// Add a load's nodal forces to f.
    pub fn apply_load(&mut self, mesh: &Mesh, load: &Load) -> Result<()> {
        self.check_mesh(mesh)?;
        boundary::apply_load(&mut self.force, mesh, load)
    }

    /// Fix all three components of every node in `nodes`.
    ///
    /// Applying the same set twice leaves K and f unchanged.
    pub fn apply_fixed(&mut self, mesh: &Mesh, nodes: &NodeSet) -> Result<()> {
        self.apply_prescribed(mesh, &nodes.fixed_constraints())
    }

    /// Enforce prescribed displacements.
    ///
    /// For each constrained DOF d with value g: f ← f − g·K[:, d], then row
    /// and column d are zeroed, K[d, d] = 1 and f[d] = g. Symmetry of K is
    /// preserved. A DOF that is already constrained to the same value is
    /// skipped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConstraint`] if a constraint is out of range, or if a
    /// DOF would be prescribed two different values (within `constraints`
    /// or against an earlier call). Nothing is modified in that case.
    pub fn apply_prescribed(&mut self, mesh: &Mesh, constraints: &[Constraint]) -> Result<()> {
        self.check_mesh(mesh)?;

        let mut pending = BTreeMap::new();
        for c in constraints {
            let d = c.dof(mesh)?;
            let previous = self.constrained.get(&d).or_else(|| pending.get(&d)).copied();
            match previous {
                Some(g) if g == c.value => {}
                Some(g) => {
                    return Err(Error::InvalidConstraint(format!(
                        "node {} component {} prescribed both {g} and {}",
                        c.node, c.component, c.value
                    )))
                }
                None => {
                    pending.insert(d, c.value);
                }
            }
        }

        for (d, g) in pending {
            self.constrain_dof(d, g);
            self.constrained.insert(d, g);
        }
        Ok(())
    }

    fn constrain_dof(&mut self, d: usize, value: f64) {
        let (row_offsets, col_indices, values) = self.stiffness.csr_data_mut();

        for idx in row_offsets[d]..row_offsets[d + 1] {
            let r = col_indices[idx];
            if r == d {
                values[idx] = 1.0;
                continue;
            }
            // pattern symmetry is checked on construction, so K[r, d] is stored
            let row = &col_indices[row_offsets[r]..row_offsets[r + 1]];
            if let Ok(k) = row.binary_search(&d) {
                let pos = row_offsets[r] + k;
                self.force[r] -= values[pos] * value;
                values[pos] = 0.0;
            }
            values[idx] = 0.0;
        }

        self.force[d] = value;
    }

    fn check_mesh(&self, mesh: &Mesh) -> Result<()> {
        if mesh.n_dofs() != self.n_dofs() {
            return Err(Error::Solver(format!(
                "system has {} DOFs, mesh has {}",
                self.n_dofs(),
                mesh.n_dofs()
            )));
        }
        Ok(())
    }

    /// Solve K u = f, consuming the system.
    ///
    /// K is released once factorised.
    pub fn solve(self, config: &SolverConfig) -> Result<Solution> {
        let solver = select_solver(config);
        debug!(solver = solver.name(), n_dofs = self.n_dofs(), "solving");
        let LinearSystem { stiffness, force, .. } = self;
        solver.solve(stiffness, force.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{classify_nodes, downward, Axis, NodeRule};
    use crate::generator::{box_mesh, cantilever_beam};
    use crate::types::{Point3, Vec3};
    use approx::assert_relative_eq;

    fn unit_cube() -> Mesh {
        box_mesh(Point3::zeros(), Vec3::new(1.0, 1.0, 1.0), [1, 1, 1]).unwrap()
    }

    #[test]
    fn test_single_element_matches_kernel() {
        let mesh = unit_cube();
        let material = Material::steel();
        let system = assemble(&mesh, &material).unwrap();

        let ke = Hex8::new()
            .stiffness(&mesh.element_coords(0).unwrap(), &material.constitutive_matrix())
            .unwrap();
        let dofs = mesh.element_dofs(&mesh.elements()[0]);
        for i in 0..24 {
            for j in 0..24 {
                assert_eq!(sparse::get(system.stiffness(), dofs[i], dofs[j]), ke[(i, j)]);
            }
        }
        assert!(system.force().iter().all(|&f| f == 0.0));
    }

    #[test]
    fn test_sparsity_pattern() {
        let mesh = cantilever_beam(5.0, 0.5, 0.3, 3).unwrap();
        let system = assemble(&mesh, &Material::steel()).unwrap();
        let k = system.stiffness();
        for i in 0..mesh.n_dofs() {
            assert!(sparse::find_entry(k, i, i).is_some());
        }
        // nodes 0 and 12 share no element
        assert!(sparse::find_entry(k, 0, 3 * 12).is_none());
        assert!(k.nnz() <= 3 * ELEMENT_NNZ);
    }

    #[test]
    fn test_global_symmetry_exact() {
        let mesh = cantilever_beam(5.0, 0.5, 0.3, 6).unwrap();
        let system = assemble(&mesh, &Material::steel()).unwrap();
        assert!(sparse::is_symmetric(system.stiffness()));
    }

    #[test]
    fn test_parallel_matches_serial_bitwise() {
        let mesh = box_mesh(Point3::zeros(), Vec3::new(2.0, 1.0, 1.5), [4, 3, 2]).unwrap();
        let material = Material::aluminum();
        let par = assemble_with(&mesh, &material, &AssemblyOptions { parallel: true }).unwrap();
        let ser = assemble_with(&mesh, &material, &AssemblyOptions { parallel: false }).unwrap();

        assert_eq!(par.stiffness().row_offsets(), ser.stiffness().row_offsets());
        assert_eq!(par.stiffness().col_indices(), ser.stiffness().col_indices());
        assert_eq!(par.stiffness().values(), ser.stiffness().values());
    }

    #[test]
    fn test_rigid_translation_in_global_null_space() {
        let mesh = cantilever_beam(2.0, 0.5, 0.3, 4).unwrap();
        let system = assemble(&mesh, &Material::steel()).unwrap();
        let u = DVector::from_fn(mesh.n_dofs(), |i, _| [0.3, -1.0, 2.0][i % 3]);
        let f = sparse::mul_vec(system.stiffness(), &u);
        assert!(f.amax() <= 1e-8 * sparse::inf_norm(system.stiffness()));
    }

    #[test]
    fn test_apply_fixed_zeroes_rows_and_columns() {
        let mesh = unit_cube();
        let mut system = assemble(&mesh, &Material::steel()).unwrap();
        let face = classify_nodes(&mesh, &NodeRule::face_at(Axis::X, 0.0)).unwrap();
        system.apply_fixed(&mesh, &face).unwrap();

        let k = system.stiffness();
        for node in face.iter() {
            for c in 0..3 {
                let d = 3 * node + c;
                for j in 0..24 {
                    let expected = if j == d { 1.0 } else { 0.0 };
                    assert_eq!(sparse::get(k, d, j), expected);
                    assert_eq!(sparse::get(k, j, d), expected);
                }
                assert_eq!(system.force()[d], 0.0);
            }
        }
        assert!(sparse::is_symmetric(k));
    }

    #[test]
    fn test_apply_fixed_idempotent() {
        let mesh = unit_cube();
        let mut system = assemble(&mesh, &Material::steel()).unwrap();
        let loaded = classify_nodes(&mesh, &NodeRule::face_at(Axis::Z, 1.0)).unwrap();
        system
            .apply_load(&mesh, &Load::point(1e4, downward(), loaded).unwrap())
            .unwrap();
        let fixed = classify_nodes(&mesh, &NodeRule::face_at(Axis::Z, 0.0)).unwrap();

        system.apply_fixed(&mesh, &fixed).unwrap();
        let once = system.clone();
        system.apply_fixed(&mesh, &fixed).unwrap();

        assert_eq!(once.stiffness().values(), system.stiffness().values());
        assert_eq!(once.force(), system.force());
    }

    #[test]
    fn test_apply_prescribed_lifts_load() {
        let mesh = unit_cube();
        let mut system = assemble(&mesh, &Material::steel()).unwrap();
        let k_before = system.stiffness().clone();
        let g = 1e-3;

        system
            .apply_prescribed(&mesh, &[Constraint::new(1, 0, g)])
            .unwrap();

        let d = 3;
        assert_eq!(system.force()[d], g);
        for r in (0..24).filter(|&r| r != d) {
            assert_eq!(system.force()[r], -sparse::get(&k_before, r, d) * g);
            assert_eq!(sparse::get(system.stiffness(), r, d), 0.0);
        }
    }

    #[test]
    fn test_invalid_constraint_leaves_system_untouched() {
        let mesh = unit_cube();
        let mut system = assemble(&mesh, &Material::steel()).unwrap();
        let before = system.stiffness().values().to_vec();

        let result = system.apply_prescribed(
            &mesh,
            &[Constraint::fixed(0, 0), Constraint::fixed(99, 0)],
        );
        assert!(matches!(result, Err(Error::InvalidConstraint(_))));
        assert_eq!(system.stiffness().values(), before.as_slice());
    }

    #[test]
    fn test_mesh_mismatch() {
        let small = unit_cube();
        let large = cantilever_beam(5.0, 0.5, 0.3, 3).unwrap();
        let mut system = assemble(&small, &Material::steel()).unwrap();
        let nodes = NodeSet::from_indices([0]);
        assert!(matches!(
            system.apply_fixed(&large, &nodes),
            Err(Error::Solver(_))
        ));
    }

    #[test]
    fn test_new_requires_diagonal() {
        let mut triplet = TripletMatrix::new(2, 2);
        triplet.add(0, 0, 1.0);
        let k = triplet.to_csr().unwrap();
        assert!(LinearSystem::new(k, DVector::zeros(2)).is_err());
    }

    #[test]
    fn test_new_requires_symmetric_pattern() {
        let mut upper = TripletMatrix::new(2, 2);
        upper.add_structural_diagonal();
        upper.add(0, 1, -1.0);
        let result = LinearSystem::new(upper.to_csr().unwrap(), DVector::zeros(2));
        assert!(matches!(result, Err(Error::Solver(_))));

        let mut full = TripletMatrix::new(2, 2);
        full.add_structural_diagonal();
        full.add(0, 1, -1.0);
        full.add(1, 0, -1.0);
        assert!(LinearSystem::new(full.to_csr().unwrap(), DVector::zeros(2)).is_ok());
    }

    fn clamped_beam() -> (Mesh, LinearSystem) {
        let mesh = cantilever_beam(5.0, 0.5, 0.3, 4).unwrap();
        let mut system = assemble(&mesh, &Material::steel()).unwrap();
        let root = classify_nodes(&mesh, &NodeRule::face_at(Axis::X, 0.0)).unwrap();
        system.apply_fixed(&mesh, &root).unwrap();
        (mesh, system)
    }

    #[test]
    fn test_conflicting_values_in_one_call_rejected() {
        let (mesh, mut system) = clamped_beam();
        let before = system.clone();

        let result = system.apply_prescribed(
            &mesh,
            &[Constraint::new(19, 2, 1e-3), Constraint::fixed(19, 2)],
        );
        assert!(matches!(result, Err(Error::InvalidConstraint(_))));
        assert_eq!(system.stiffness().values(), before.stiffness().values());
        assert_eq!(system.force(), before.force());
        assert_eq!(system.constrained_dofs().count(), 12);
    }

    #[test]
    fn test_conflicting_value_across_calls_rejected() {
        let (mesh, mut system) = clamped_beam();
        system
            .apply_prescribed(&mesh, &[Constraint::new(19, 2, 1e-3)])
            .unwrap();
        let before = system.clone();

        let result = system.apply_fixed(&mesh, &NodeSet::from_indices([19]));
        assert!(matches!(result, Err(Error::InvalidConstraint(_))));
        assert_eq!(system.force(), before.force());

        // the clamped root overlaps a zero-valued request without conflict
        system.apply_fixed(&mesh, &NodeSet::from_indices([0])).unwrap();
        let root_with_offset = system.apply_prescribed(&mesh, &[Constraint::new(0, 1, 1e-4)]);
        assert!(root_with_offset.is_err());
    }

    #[test]
    fn test_repeated_same_value_matches_single() {
        let solve = |constraints: &[Constraint]| {
            let (mesh, mut system) = clamped_beam();
            system.apply_prescribed(&mesh, constraints).unwrap();
            assert!(system.constrained_dofs().any(|(d, g)| d == 3 * 19 + 2 && g == 1e-3));
            system.solve(&SolverConfig::default()).unwrap().displacements
        };

        let single = solve(&[Constraint::new(19, 2, 1e-3)]);
        let repeated = solve(&[Constraint::new(19, 2, 1e-3), Constraint::new(19, 2, 1e-3)]);
        assert_eq!(single, repeated);
        assert_eq!(single[3 * 19 + 2], 1e-3);
    }

    #[test]
    fn test_uniaxial_cube_solve() {
        // roller supports: free lateral contraction, rigid motion removed
        let mesh = unit_cube();
        let e = 2.0e11;
        let material = Material::new(e, 0.3).unwrap();
        let mut system = assemble(&mesh, &material).unwrap();

        let x0 = classify_nodes(&mesh, &NodeRule::face_at(Axis::X, 0.0)).unwrap();
        let mut constraints: Vec<Constraint> = x0.iter().map(|n| Constraint::fixed(n, 0)).collect();
        for n in x0.iter() {
            let p = mesh.nodes()[n];
            if p.y == 0.0 {
                constraints.push(Constraint::fixed(n, 1));
            }
            if p.z == 0.0 {
                constraints.push(Constraint::fixed(n, 2));
            }
        }
        system.apply_prescribed(&mesh, &constraints).unwrap();

        let x1 = classify_nodes(&mesh, &NodeRule::face_at(Axis::X, 1.0)).unwrap();
        system
            .apply_load(&mesh, &Load::point(1.0e6, Vec3::x(), x1.clone()).unwrap())
            .unwrap();

        let solution = system.solve(&SolverConfig::default()).unwrap();
        for n in x1.iter() {
            assert_relative_eq!(solution.displacements[3 * n], 1.0e6 / e, max_relative = 1e-9);
        }
    }
}
