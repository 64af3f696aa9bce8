use crate::{
    error::SolverError,
    norms::ResidualNorms,
    solver::{BlockSolver, Ctx},
    state::{axpy, StateVector},
};

/// A pseudo-time integration scheme advancing one block by one iteration.
pub trait Method: Send + Sync {
    /// Number of Gauss-Seidel sweeps of the implicit system, or `None` for
    /// explicit schemes, which do not allocate one.
    fn implicit_sweeps(&self) -> Option<usize> {
        None
    }

    /// Updates the state of `solver` and returns the norms of the residual
    /// it started from.
    fn advance(&self, solver: &mut BlockSolver, ctx: &Ctx<'_>) -> Result<ResidualNorms, SolverError>;

    fn name(&self) -> &'static str;
}

/// A system of ODEs `du/dt = f(u)` over a flat array of state vectors.
pub trait Semidiscrete {
    fn unknowns(&self) -> &[StateVector];

    fn unknowns_mut(&mut self) -> &mut [StateVector];

    /// Right-hand side at the current unknowns.
    fn rate(&mut self) -> Result<Vec<StateVector>, SolverError>;
}

/// `u ← u + h·k1`, with `k1` the rate at `u`.
pub fn explicit_euler<S: Semidiscrete + ?Sized>(sys: &mut S, h: f64, k1: &[StateVector]) {
    for (u, k) in sys.unknowns_mut().iter_mut().zip(k1) {
        axpy(u, h, k);
    }
}

/// Classical fourth-order Runge-Kutta step, `k1` being the rate at the
/// current unknowns.
pub fn rk4<S: Semidiscrete + ?Sized>(sys: &mut S, h: f64, k1: &[StateVector]) -> Result<(), SolverError> {
    let u0 = sys.unknowns().to_vec();

    let stage = |sys: &mut S, c: f64, k: &[StateVector]| {
        for ((u, u0), k) in sys.unknowns_mut().iter_mut().zip(&u0).zip(k) {
            *u = *u0;
            axpy(u, c * h, k);
        }
    };

    stage(sys, 0.5, k1);
    let k2 = sys.rate()?;
    stage(sys, 0.5, &k2);
    let k3 = sys.rate()?;
    stage(sys, 1.0, &k3);
    let k4 = sys.rate()?;

    for (n, u) in sys.unknowns_mut().iter_mut().enumerate() {
        *u = u0[n];
        axpy(u, h / 6.0, &k1[n]);
        axpy(u, h / 3.0, &k2[n]);
        axpy(u, h / 3.0, &k3[n]);
        axpy(u, h / 6.0, &k4[n]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NUM_EQNS;

    /// `y' = -y` in every component.
    struct Decay(Vec<StateVector>);

    impl Semidiscrete for Decay {
        fn unknowns(&self) -> &[StateVector] {
            &self.0
        }

        fn unknowns_mut(&mut self) -> &mut [StateVector] {
            &mut self.0
        }

        fn rate(&mut self) -> Result<Vec<StateVector>, SolverError> {
            Ok(self.0.iter().map(|u| u.map(|v| -v)).collect())
        }
    }

    fn local_error(h: f64, fourth_order: bool) -> f64 {
        let mut sys = Decay(vec![[1.0; NUM_EQNS]]);
        let k1 = sys.rate().unwrap();
        if fourth_order {
            rk4(&mut sys, h, &k1).unwrap();
        } else {
            explicit_euler(&mut sys, h, &k1);
        }
        (sys.0[0][0] - (-h).exp()).abs()
    }

    #[test]
    fn rk4_local_error_is_fifth_order() {
        // local truncation error O(h^5), i.e. global O(h^4)
        let ratio = local_error(0.1, true) / local_error(0.05, true);
        assert!((ratio - 32.0).abs() < 2.0, "ratio {ratio}");
    }

    #[test]
    fn euler_local_error_is_second_order() {
        let ratio = local_error(0.1, false) / local_error(0.05, false);
        assert!((ratio - 4.0).abs() < 0.3, "ratio {ratio}");
    }

    #[test]
    fn global_orders() {
        let global = |h: f64, fourth_order: bool| {
            let steps = (1.0 / h).round() as usize;
            let mut sys = Decay(vec![[1.0; NUM_EQNS]]);
            for _ in 0..steps {
                let k1 = sys.rate().unwrap();
                if fourth_order {
                    rk4(&mut sys, h, &k1).unwrap();
                } else {
                    explicit_euler(&mut sys, h, &k1);
                }
            }
            (sys.0[0][3] - (-1.0_f64).exp()).abs()
        };
        let rk = global(0.1, true) / global(0.05, true);
        let eu = global(0.1, false) / global(0.05, false);
        assert!((rk - 16.0).abs() < 1.5, "rk4 ratio {rk}");
        assert!((eu - 2.0).abs() < 0.2, "euler ratio {eu}");
    }
}
