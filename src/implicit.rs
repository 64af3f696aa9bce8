//! Block-banded linear system of the implicit Euler scheme.
//!
//! Each cell couples to itself through the main diagonal and to its lower
//! and upper neighbors in each index direction through six off-diagonals,
//! all made of `NUM_EQNS × NUM_EQNS` blocks.

use faer::{
    solvers::{PartialPivLu, Solver},
    Mat,
};
use faer_core::{zipped, MatMut, MatRef};
use reborrow::*;

use crate::{
    error::{CellLocation, SolverError},
    mesh::{Dims, Direction},
    state::{StateVector, NUM_EQNS, ZERO_STATE},
};

/// A pivot smaller than this, relative to the largest entry of its block,
/// marks the block as singular.
const SINGULAR_PIVOT: f64 = 1e-13;

/// One block per cell, stored contiguously as a `(NUM_EQNS·cells) × NUM_EQNS`
/// matrix.
#[derive(Debug, Clone)]
pub struct BlockDiagonal {
    data: Mat<f64>,
}

impl BlockDiagonal {
    pub fn zeros(cells: usize) -> Self {
        Self {
            data: Mat::zeros(NUM_EQNS * cells, NUM_EQNS),
        }
    }

    pub fn len(&self) -> usize {
        self.data.nrows() / NUM_EQNS
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for j in 0..NUM_EQNS {
            for i in 0..self.data.nrows() {
                self.data[(i, j)] = 0.0;
            }
        }
    }

    pub fn block(&self, cell: usize) -> MatRef<'_, f64> {
        self.data
            .as_ref()
            .submatrix(NUM_EQNS * cell, 0, NUM_EQNS, NUM_EQNS)
    }

    pub fn block_mut(&mut self, cell: usize) -> MatMut<'_, f64> {
        self.data
            .as_mut()
            .submatrix(NUM_EQNS * cell, 0, NUM_EQNS, NUM_EQNS)
    }

    /// `block += scale * m`
    pub fn add(&mut self, cell: usize, scale: f64, m: MatRef<'_, f64>) {
        let mut dst = self.block_mut(cell);
        zipped!(dst.rb_mut(), m).for_each(|mut d, m| d.write(d.read() + scale * m.read()));
    }

    pub fn add_identity(&mut self, cell: usize, value: f64) {
        for e in 0..NUM_EQNS {
            self.data[(NUM_EQNS * cell + e, e)] += value;
        }
    }

    /// `y -= block · x`
    #[inline]
    fn sub_product(&self, cell: usize, x: &StateVector, y: &mut StateVector) {
        let b = self.block(cell);
        for (i, y) in y.iter_mut().enumerate() {
            for (j, x) in x.iter().enumerate() {
                *y -= b[(i, j)] * x;
            }
        }
    }
}

/// Pivoted LU factors of a single diagonal block.
struct BlockLu {
    lu: PartialPivLu<f64>,
}

impl BlockLu {
    /// `None` when a pivot is negligible against the largest entry of the
    /// block.
    fn factor(m: MatRef<'_, f64>) -> Option<Self> {
        let mut scale: f64 = 0.0;
        for j in 0..NUM_EQNS {
            for i in 0..NUM_EQNS {
                let v = m.read(i, j);
                if !v.is_finite() {
                    return None;
                }
                scale = scale.max(v.abs());
            }
        }
        if scale <= 0.0 {
            return None;
        }

        let lu = PartialPivLu::new(m);
        // faer keeps the pivots on the diagonal of L
        let l = lu.compute_l();
        let singular = (0..NUM_EQNS).any(|e| {
            let pivot = l.read(e, e).abs();
            pivot <= SINGULAR_PIVOT * scale || pivot.is_nan()
        });
        (!singular).then_some(Self { lu })
    }

    fn solve(&self, b: &StateVector) -> StateVector {
        let mut x = Mat::from_fn(NUM_EQNS, 1, |i, _| b[i]);
        self.lu.solve_in_place(x.as_mut());
        std::array::from_fn(|i| x.read(i, 0))
    }
}

/// The seven block diagonals of one block's implicit operator.
#[derive(Debug, Clone)]
pub struct ImplicitSystem {
    cells: Dims,
    sweeps: usize,
    main: BlockDiagonal,
    lower: [BlockDiagonal; 3],
    upper: [BlockDiagonal; 3],
}

impl ImplicitSystem {
    pub fn new(cells: Dims, sweeps: usize) -> Self {
        let n = cells.len();
        Self {
            cells,
            sweeps: sweeps.max(1),
            main: BlockDiagonal::zeros(n),
            lower: std::array::from_fn(|_| BlockDiagonal::zeros(n)),
            upper: std::array::from_fn(|_| BlockDiagonal::zeros(n)),
        }
    }

    pub fn clear(&mut self) {
        self.main.clear();
        for d in self.lower.iter_mut().chain(self.upper.iter_mut()) {
            d.clear();
        }
    }

    pub fn main(&self) -> &BlockDiagonal {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut BlockDiagonal {
        &mut self.main
    }

    /// Coupling of each cell to its lower neighbor along `direction`.
    pub fn lower_mut(&mut self, direction: Direction) -> &mut BlockDiagonal {
        &mut self.lower[direction.axis()]
    }

    /// Coupling of each cell to its upper neighbor along `direction`.
    pub fn upper_mut(&mut self, direction: Direction) -> &mut BlockDiagonal {
        &mut self.upper[direction.axis()]
    }

    pub fn lower(&self, direction: Direction) -> &BlockDiagonal {
        &self.lower[direction.axis()]
    }

    pub fn upper(&self, direction: Direction) -> &BlockDiagonal {
        &self.upper[direction.axis()]
    }

    /// Solves `M Δu = rhs` by symmetric block Gauss-Seidel: each sweep
    /// visits the cells forward then backward, inverting the main diagonal
    /// blocks exactly.
    pub fn solve(&self, block: usize, rhs: &[StateVector]) -> Result<Vec<StateVector>, SolverError> {
        let n = self.cells.len();
        debug_assert_eq!(rhs.len(), n);

        let factors = (0..n)
            .map(|c| {
                BlockLu::factor(self.main.block(c).rb()).ok_or(SolverError::SingularDiagonal {
                    at: CellLocation::new(block, self.cells.ijk(c)),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut du = vec![ZERO_STATE; n];
        for _ in 0..self.sweeps {
            for c in 0..n {
                self.relax(c, rhs, &factors, &mut du);
            }
            for c in (0..n).rev() {
                self.relax(c, rhs, &factors, &mut du);
            }
        }
        Ok(du)
    }

    #[inline]
    fn relax(&self, c: usize, rhs: &[StateVector], factors: &[BlockLu], du: &mut [StateVector]) {
        let ijk = self.cells.ijk(c);
        let mut r = rhs[c];
        for direction in Direction::ALL {
            let d = direction.axis();
            let stride = self.cells.stride(d);
            if ijk[d] > 0 {
                self.lower[d].sub_product(c, &du[c - stride], &mut r);
            }
            if ijk[d] + 1 < self.cells.get(d) {
                self.upper[d].sub_product(c, &du[c + stride], &mut r);
            }
        }
        du[c] = factors[c].solve(&r);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn lu_solves_a_pivoting_system() {
        let m = Mat::from_fn(5, 5, |i, j| match (i, j) {
            (0, 0) => 0.0,
            (i, j) if i == j => 4.0,
            (i, j) if i + j == 4 => 1.0,
            _ => 0.5,
        });
        let lu = BlockLu::factor(m.as_ref()).unwrap();
        let x = [1.0, -2.0, 0.5, 3.0, -1.0];
        let mut b = [0.0; 5];
        for i in 0..5 {
            b[i] = (0..5).map(|j| m[(i, j)] * x[j]).sum();
        }
        let y = lu.solve(&b);
        for (a, b) in x.iter().zip(&y) {
            assert_relative_eq!(a, b, epsilon = 1e-13);
        }
    }

    #[test]
    fn singular_diagonal_is_reported() {
        let cells = Dims::new(2, 1, 1);
        let mut sys = ImplicitSystem::new(cells, 1);
        sys.main_mut().add_identity(0, 1.0);
        // cell 1 keeps a zero block
        let err = sys.solve(7, &[[1.0; 5], [1.0; 5]]).unwrap_err();
        match err {
            SolverError::SingularDiagonal { at } => assert_eq!(at, CellLocation::new(7, [1, 0, 0])),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rank_deficient_blocks_are_rejected() {
        // rows 1 and 3 coincide
        let m = Mat::from_fn(5, 5, |i, j| match (i, j) {
            (1 | 3, _) => 1.0 + j as f64,
            (i, j) if i == j => 2.0,
            _ => 0.0,
        });
        assert!(BlockLu::factor(m.as_ref()).is_none());

        let mut nan = Mat::from_fn(5, 5, |i, j| if i == j { 1.0 } else { 0.0 });
        nan.write(2, 4, f64::NAN);
        assert!(BlockLu::factor(nan.as_ref()).is_none());
    }

    #[test]
    fn gauss_seidel_converges_on_a_dominant_line() {
        // 1D line of 4 cells: 4 on the diagonal, -1 to both neighbors
        let cells = Dims::new(4, 1, 1);
        let mut sys = ImplicitSystem::new(cells, 30);
        let id = Mat::from_fn(5, 5, |i, j| if i == j { 1.0 } else { 0.0 });
        for c in 0..4 {
            sys.main_mut().add_identity(c, 4.0);
            if c > 0 {
                sys.lower_mut(Direction::I).add(c, -1.0, id.as_ref());
            }
            if c < 3 {
                sys.upper_mut(Direction::I).add(c, -1.0, id.as_ref());
            }
        }
        let rhs = vec![[2.0; 5], [1.0; 5], [1.0; 5], [2.0; 5]];
        let du = sys.solve(0, &rhs).unwrap();
        for c in 0..4 {
            let left = if c > 0 { du[c - 1][0] } else { 0.0 };
            let right = if c < 3 { du[c + 1][0] } else { 0.0 };
            assert_relative_eq!(4.0 * du[c][0] - left - right, rhs[c][0], epsilon = 1e-12);
        }
    }
}
