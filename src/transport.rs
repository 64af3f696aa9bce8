/// Sutherland's law for the dynamic viscosity of air, in nondimensional
/// form: temperatures are scaled by the reference temperature and the
/// result by the viscosity at that temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sutherland {
    t_ref: f64,
    s: f64,
}

impl Sutherland {
    pub const AIR: f64 = 110.4;

    pub fn new(t_ref: f64) -> Self {
        Self::with_constant(t_ref, Self::AIR)
    }

    pub fn with_constant(t_ref: f64, s: f64) -> Self {
        Self { t_ref, s }
    }

    pub fn reference_temperature(&self) -> f64 {
        self.t_ref
    }

    /// `μ/μ_ref` at temperature `t = T/T_ref`.
    #[inline]
    pub fn viscosity(&self, t: f64) -> f64 {
        let s = self.s / self.t_ref;
        t * t.sqrt() * (1.0 + s) / (t + s)
    }
}
