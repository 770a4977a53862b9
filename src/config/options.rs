//! Numeric options bundle: tolerances, iteration caps, window widths,
//! threading and seeding policy.
//!
//! These control solver behavior only; structural parameters live in
//! `parameters.rs`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Solver and sampling options for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Relative tolerance on the largest per-node position change between
    /// equilibrium iterations
    pub x_solve_rel_tolerance: f64,
    /// Iteration cap for the equilibrium fixed-point solve.
    /// Hitting the cap is non-fatal; the best available solution is kept.
    pub x_solve_max_iterations: usize,
    /// Force tolerance for the single-half-sarcomere force-control root
    /// finder (kN/m²)
    pub force_control_tolerance_kN_per_m2: f64,
    /// Maximum length change per force-control step (nm); also brackets the
    /// root search
    pub force_control_max_delta_hsl_nm: f64,
    /// Iteration cap for the force-control bisection
    pub force_control_max_iterations: usize,
    /// Force tolerance for the myofibril force-balance solve (kN/m²)
    pub myofibril_force_tolerance_kN_per_m2: f64,
    /// Iteration cap for the myofibril force-balance solve.
    /// Non-fatal; the best iterate is accepted with a logged diagnostic.
    pub myofibril_max_iterations: usize,
    /// Kinetic sub-steps per outer timestep.
    /// Regulatory-unit kinetics are fast relative to cross-bridge kinetics.
    pub kinetic_substeps: usize,
    /// Binding-site window half-width for attachment candidates
    /// (window = nearest site ± this many sites)
    pub attachment_window: usize,
    /// Evaluate half-sarcomeres on a worker pool (pool size = count)
    pub multithreading: bool,
    /// Run-level random seed; each half-sarcomere derives its own stream
    /// from (seed, muscle id, half-sarcomere id)
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            x_solve_rel_tolerance: 1e-4,
            x_solve_max_iterations: 100,
            force_control_tolerance_kN_per_m2: 0.01,
            force_control_max_delta_hsl_nm: 100.0,
            force_control_max_iterations: 100,
            myofibril_force_tolerance_kN_per_m2: 0.01,
            myofibril_max_iterations: 100,
            kinetic_substeps: 10,
            attachment_window: 1,
            multithreading: false,
            seed: 0,
        }
    }
}

impl Options {
    /// Load from a JSON file or return defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(options) => {
                    log::info!("Loaded options from {:?}", path.as_ref());
                    options
                }
                Err(e) => {
                    log::warn!("Failed to parse options: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Options file not found, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert_eq!(options.kinetic_substeps, 10);
        assert_eq!(options.attachment_window, 1);
        assert!(!options.multithreading);
    }

    #[test]
    fn test_serialization() {
        let options = Options::default();
        let json = serde_json::to_string(&options).unwrap();
        let parsed: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.x_solve_max_iterations, options.x_solve_max_iterations);
    }
}
