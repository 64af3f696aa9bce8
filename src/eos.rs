/// Calorically perfect ideal gas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealGas {
    gamma: f64,
    gas_constant: f64,
}

impl IdealGas {
    pub fn new(gamma: f64, gas_constant: f64) -> Self {
        Self {
            gamma,
            gas_constant,
        }
    }

    /// Gas in variables scaled by the reference density and speed of sound,
    /// where `R = 1/γ` so that the temperature equals `a²`.
    pub fn nondimensional(gamma: f64) -> Self {
        Self::new(gamma, 1.0 / gamma)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn gas_constant(&self) -> f64 {
        self.gas_constant
    }

    /// Pressure from density and specific internal energy.
    #[inline]
    pub fn pressure(&self, rho: f64, internal_energy: f64) -> f64 {
        (self.gamma - 1.0) * rho * internal_energy
    }

    #[inline]
    pub fn temperature(&self, p: f64, rho: f64) -> f64 {
        p / (rho * self.gas_constant)
    }

    #[inline]
    pub fn sound_speed(&self, p: f64, rho: f64) -> f64 {
        (self.gamma * p / rho).sqrt()
    }

    /// Specific total energy.
    #[inline]
    pub fn energy(&self, p: f64, rho: f64, vel_sq: f64) -> f64 {
        p / ((self.gamma - 1.0) * rho) + 0.5 * vel_sq
    }

    /// Specific total enthalpy.
    #[inline]
    pub fn enthalpy(&self, p: f64, rho: f64, vel_sq: f64) -> f64 {
        self.gamma / (self.gamma - 1.0) * p / rho + 0.5 * vel_sq
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn air_at_sea_level() {
        let air = IdealGas::new(1.4, 287.058);
        let (p, rho) = (101325.0, 1.2256);
        assert_relative_eq!(air.temperature(p, rho), 288.0, max_relative = 1e-3);
        assert_relative_eq!(air.sound_speed(p, rho), 340.2, max_relative = 1e-3);
    }

    #[test]
    fn nondimensional_temperature_is_speed_of_sound_squared() {
        let gas = IdealGas::nondimensional(1.4);
        let (p, rho) = (0.8, 1.1);
        let a = gas.sound_speed(p, rho);
        assert_relative_eq!(gas.temperature(p, rho), a * a, max_relative = 1e-14);
    }

    #[test]
    fn energy_and_pressure_agree() {
        let gas = IdealGas::new(1.4, 1.0);
        let (p, rho, vel_sq) = (2.0, 0.5, 3.0);
        let e = gas.energy(p, rho, vel_sq) - 0.5 * vel_sq;
        assert_relative_eq!(gas.pressure(rho, e), p, max_relative = 1e-14);
        assert_relative_eq!(
            gas.enthalpy(p, rho, vel_sq),
            gas.energy(p, rho, vel_sq) + p / rho,
            max_relative = 1e-14
        );
    }
}
