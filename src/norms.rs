use crate::{
    error::CellLocation,
    state::{StateVector, NUM_EQNS, ZERO_STATE},
};

/// Floor added to both sides of the L2 normalization.
pub const NORM_EPSILON: f64 = 1e-20;

/// Largest residual component of an iteration and where it occurred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxResidual {
    pub value: f64,
    pub eqn: usize,
    pub at: CellLocation,
}

/// Per-equation residual norms accumulated over cells: squared L2 sums
/// and the L∞ maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualNorms {
    pub l2_sq: StateVector,
    pub linf: Option<MaxResidual>,
}

impl Default for ResidualNorms {
    fn default() -> Self {
        Self {
            l2_sq: ZERO_STATE,
            linf: None,
        }
    }
}

impl ResidualNorms {
    pub fn accumulate(&mut self, at: CellLocation, residual: &StateVector) {
        for (eqn, r) in residual.iter().enumerate() {
            self.l2_sq[eqn] += r * r;
            let value = r.abs();
            if self.linf.map_or(true, |m| value > m.value) {
                self.linf = Some(MaxResidual { value, eqn, at });
            }
        }
    }

    /// Combines the partial norms of two disjoint sets of cells. Ties in
    /// L∞ keep `self`.
    pub fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.l2_sq.iter_mut().zip(other.l2_sq) {
            *a += b;
        }
        self.linf = match (self.linf, other.linf) {
            (Some(a), Some(b)) if b.value > a.value => Some(b),
            (None, b) => b,
            (a, _) => a,
        };
        self
    }

    pub fn l2(&self) -> StateVector {
        self.l2_sq.map(f64::sqrt)
    }
}

/// Global residual of one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualReport {
    pub iteration: usize,
    /// L2 norms relative to the first iteration.
    pub l2: StateVector,
    pub l2_abs: StateVector,
    pub linf: Option<MaxResidual>,
}

/// Remembers the first iteration's L2 norms to produce relative
/// convergence figures.
#[derive(Debug, Clone, Default)]
pub struct ResidualMonitor {
    first: Option<StateVector>,
}

impl ResidualMonitor {
    pub fn report(&mut self, iteration: usize, norms: &ResidualNorms) -> ResidualReport {
        let l2_abs = norms.l2();
        let first = *self.first.get_or_insert(l2_abs);
        let mut l2 = ZERO_STATE;
        for eqn in 0..NUM_EQNS {
            l2[eqn] = (l2_abs[eqn] + NORM_EPSILON) / (first[eqn] + NORM_EPSILON);
        }
        ResidualReport {
            iteration,
            l2,
            l2_abs,
            linf: norms.linf,
        }
    }

    pub fn first(&self) -> Option<&StateVector> {
        self.first.as_ref()
    }
}
