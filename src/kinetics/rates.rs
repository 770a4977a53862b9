//! Rate laws for kinetic transitions.
//!
//! Each transition in a kinetic scheme carries one rate law evaluated against
//! the molecule's current mechanical context (cross-bridge extension and node
//! force). Rate laws form a closed tagged enum dispatched by a single match,
//! so an unknown law is a deserialization error rather than a silent no-op.
//!
//! References:
//! - Gaussian attachment: Campbell, Biophys J 2009 (spatially explicit binding)
//! - Exponential detachment wall: Kaya & Higuchi, Science 2010

use serde::{Deserialize, Serialize};

/// Thermal energy k_B·T at 310 K (37°C), in pN·nm.
pub const KBT_PN_NM: f64 = 4.28;

/// A rate law with typed parameters.
///
/// `x_nm` is the axial distance the cross-bridge spring would have to stretch
/// to reach the candidate site (attachment laws) or its current bound
/// extension (detachment laws). `force_pN` is the axial force borne by the
/// molecule's node, zero when detached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateLaw {
    /// Position- and force-independent rate.
    Constant {
        /// Base rate (s⁻¹)
        rate_per_sec: f64,
    },
    /// Linear force sensitivity: k · (1 + c·F), floored at zero.
    ///
    /// Used for the SRX→DRX transition (mechanosensing thick filament).
    ForceDependent {
        /// Base rate (s⁻¹)
        rate_per_sec: f64,
        /// Force sensitivity (pN⁻¹)
        force_factor_per_pN: f64,
    },
    /// Boltzmann-weighted attachment: A · exp(−k_cb·x² / 2k_BT).
    Gaussian {
        /// Amplitude (s⁻¹)
        amplitude_per_sec: f64,
        /// Cross-bridge spring stiffness entering the Boltzmann factor (pN/nm)
        cb_stiffness_pN_per_nm: f64,
    },
    /// Polynomial strain dependence: k + c·xⁿ, floored at zero.
    Poly {
        /// Base rate (s⁻¹)
        rate_per_sec: f64,
        /// Strain coefficient (s⁻¹·nm⁻ⁿ)
        coefficient: f64,
        /// Strain exponent (even values give symmetric strain sensitivity)
        power: i32,
    },
    /// Strain-biased detachment with a steep wall beyond `wall_nm`:
    /// k · exp(−k_cb·x / k_BT) + max_rate · sigmoid((x − wall) / smoothing).
    ExpWall {
        /// Base rate (s⁻¹)
        rate_per_sec: f64,
        /// Cross-bridge spring stiffness (pN/nm)
        cb_stiffness_pN_per_nm: f64,
        /// Extension at which forced detachment dominates (nm)
        wall_nm: f64,
        /// Wall smoothing width (nm)
        smoothing_nm: f64,
    },
}

impl RateLaw {
    /// Evaluate the rate (s⁻¹) for the given mechanical context.
    ///
    /// The result is clamped to `[0, max_rate_per_sec]`.
    pub fn evaluate(&self, x_nm: f64, force_pN: f64, max_rate_per_sec: f64) -> f64 {
        let rate = match self {
            RateLaw::Constant { rate_per_sec } => *rate_per_sec,
            RateLaw::ForceDependent {
                rate_per_sec,
                force_factor_per_pN,
            } => rate_per_sec * (1.0 + force_factor_per_pN * force_pN),
            RateLaw::Gaussian {
                amplitude_per_sec,
                cb_stiffness_pN_per_nm,
            } => {
                let energy = cb_stiffness_pN_per_nm * x_nm * x_nm / (2.0 * KBT_PN_NM);
                amplitude_per_sec * (-energy).exp()
            }
            RateLaw::Poly {
                rate_per_sec,
                coefficient,
                power,
            } => rate_per_sec + coefficient * x_nm.powi(*power),
            RateLaw::ExpWall {
                rate_per_sec,
                cb_stiffness_pN_per_nm,
                wall_nm,
                smoothing_nm,
            } => {
                let base = rate_per_sec * (-(cb_stiffness_pN_per_nm * x_nm) / KBT_PN_NM).exp();
                let wall = max_rate_per_sec / (1.0 + (-(x_nm - wall_nm) / smoothing_nm).exp());
                base + wall
            }
        };

        rate.clamp(0.0, max_rate_per_sec)
    }

    /// Derived copy with all base rates scaled by `factor`.
    ///
    /// Used for per-half-sarcomere kinetic variation; the shared scheme is
    /// never mutated in place.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut law = self.clone();
        match &mut law {
            RateLaw::Constant { rate_per_sec }
            | RateLaw::ForceDependent { rate_per_sec, .. }
            | RateLaw::ExpWall { rate_per_sec, .. } => *rate_per_sec *= factor,
            RateLaw::Gaussian {
                amplitude_per_sec, ..
            } => *amplitude_per_sec *= factor,
            RateLaw::Poly {
                rate_per_sec,
                coefficient,
                ..
            } => {
                *rate_per_sec *= factor;
                *coefficient *= factor;
            }
        }
        law
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MAX_RATE: f64 = 5000.0;

    #[test]
    fn test_constant_ignores_context() {
        let law = RateLaw::Constant { rate_per_sec: 42.0 };
        assert_relative_eq!(law.evaluate(0.0, 0.0, MAX_RATE), 42.0);
        assert_relative_eq!(law.evaluate(-8.0, 100.0, MAX_RATE), 42.0);
    }

    #[test]
    fn test_force_dependent_floors_at_zero() {
        let law = RateLaw::ForceDependent {
            rate_per_sec: 10.0,
            force_factor_per_pN: 0.1,
        };
        assert_relative_eq!(law.evaluate(0.0, 10.0, MAX_RATE), 20.0);
        // Strong compressive force would drive the rate negative
        assert_relative_eq!(law.evaluate(0.0, -100.0, MAX_RATE), 0.0);
    }

    #[test]
    fn test_gaussian_peaks_at_zero_offset() {
        let law = RateLaw::Gaussian {
            amplitude_per_sec: 200.0,
            cb_stiffness_pN_per_nm: 2.0,
        };
        let at_zero = law.evaluate(0.0, 0.0, MAX_RATE);
        let at_four = law.evaluate(4.0, 0.0, MAX_RATE);
        assert_relative_eq!(at_zero, 200.0);
        assert!(at_four < at_zero, "rate should fall off with offset");
        // Symmetric in x
        assert_relative_eq!(at_four, law.evaluate(-4.0, 0.0, MAX_RATE));
    }

    #[test]
    fn test_exp_wall_saturates_at_max_rate() {
        let law = RateLaw::ExpWall {
            rate_per_sec: 75.0,
            cb_stiffness_pN_per_nm: 1.0,
            wall_nm: 6.0,
            smoothing_nm: 0.5,
        };
        // Far beyond the wall the rate hits the cap
        let rate = law.evaluate(20.0, 0.0, MAX_RATE);
        assert_relative_eq!(rate, MAX_RATE, epsilon = 1.0);
        // Below the wall the rate is modest
        assert!(law.evaluate(0.0, 0.0, MAX_RATE) < 100.0);
    }

    #[test]
    fn test_scaled_copy_leaves_original_untouched() {
        let law = RateLaw::Poly {
            rate_per_sec: 70.0,
            coefficient: 1.0,
            power: 4,
        };
        let scaled = law.scaled(2.0);
        assert_relative_eq!(scaled.evaluate(0.0, 0.0, MAX_RATE), 140.0);
        assert_relative_eq!(law.evaluate(0.0, 0.0, MAX_RATE), 70.0);
    }

    #[test]
    fn test_serde_tagged_round_trip() {
        let law = RateLaw::Gaussian {
            amplitude_per_sec: 200.0,
            cb_stiffness_pN_per_nm: 2.0,
        };
        let json = serde_json::to_string(&law).unwrap();
        assert!(json.contains("\"gaussian\""));
        let parsed: RateLaw = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, law);
    }
}
