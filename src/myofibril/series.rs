//! Series elastic element.
//!
//! A lumped elastic link in series with the half-sarcomere chain, expressed
//! in the same stress units. Both directions of the force-extension law are
//! needed: forward for length-control residuals, inverse for the algebraic
//! extension update in force control.

use serde::{Deserialize, Serialize};

/// Linear or exponential series element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesElastic {
    /// Linear stiffness (kN·m⁻²·nm⁻¹)
    pub stiffness_kN_per_m2_per_nm: f64,
    /// Use the exponential law instead of linear
    pub exponential: bool,
    /// Exponential amplitude (kN/m²)
    pub exp_amplitude_kN_per_m2: f64,
    /// Exponential length scale (nm)
    pub exp_length_nm: f64,
}

impl Default for SeriesElastic {
    fn default() -> Self {
        Self {
            stiffness_kN_per_m2_per_nm: 1.0,
            exponential: false,
            exp_amplitude_kN_per_m2: 0.1,
            exp_length_nm: 100.0,
        }
    }
}

impl SeriesElastic {
    /// Stress (kN/m²) at a given extension. Two-sided: compression produces
    /// the mirrored restoring stress.
    pub fn force_kN_per_m2(&self, extension_nm: f64) -> f64 {
        if self.exponential {
            let magnitude = self.exp_amplitude_kN_per_m2
                * ((extension_nm.abs() / self.exp_length_nm).exp() - 1.0);
            magnitude.copysign(extension_nm)
        } else {
            self.stiffness_kN_per_m2_per_nm * extension_nm
        }
    }

    /// Extension (nm) carrying a given stress: the exact inverse of
    /// `force_kN_per_m2`.
    pub fn extension_for_force(&self, force_kN_per_m2: f64) -> f64 {
        if self.exponential {
            let magnitude = self.exp_length_nm
                * (force_kN_per_m2.abs() / self.exp_amplitude_kN_per_m2 + 1.0).ln();
            magnitude.copysign(force_kN_per_m2)
        } else {
            force_kN_per_m2 / self.stiffness_kN_per_m2_per_nm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_inverse() {
        let series = SeriesElastic {
            stiffness_kN_per_m2_per_nm: 2.5,
            ..SeriesElastic::default()
        };
        assert_relative_eq!(series.force_kN_per_m2(4.0), 10.0);
        assert_relative_eq!(series.extension_for_force(10.0), 4.0);
        assert_relative_eq!(series.extension_for_force(-5.0), -2.0);
    }

    #[test]
    fn test_exponential_inverse() {
        let series = SeriesElastic {
            exponential: true,
            exp_amplitude_kN_per_m2: 0.5,
            exp_length_nm: 50.0,
            ..SeriesElastic::default()
        };
        for &extension in &[-80.0, -5.0, 0.0, 12.0, 150.0] {
            let force = series.force_kN_per_m2(extension);
            assert_relative_eq!(
                series.extension_for_force(force),
                extension,
                max_relative = 1e-10,
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_exponential_is_odd() {
        let series = SeriesElastic {
            exponential: true,
            ..SeriesElastic::default()
        };
        assert_relative_eq!(
            series.force_kN_per_m2(-30.0),
            -series.force_kN_per_m2(30.0)
        );
        assert_eq!(series.force_kN_per_m2(0.0), 0.0);
    }
}
