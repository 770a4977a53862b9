//! Myofibril force-balance coordination.
//!
//! N half-sarcomeres in series with an optional series elastic element share
//! one force. Length control finds the shared force whose per-half-sarcomere
//! lengths (each from its own force-control solve) plus the series extension
//! add up to the imposed total length; the search is a scalar bracketed solve
//! on the shared force, so no Jacobian is ever formed. Force control skips
//! the outer solve entirely: each half-sarcomere solves its own length for
//! the target force and the series extension follows algebraically.
//!
//! When multithreading is enabled, per-half-sarcomere solves and kinetics run
//! on a dedicated worker pool (one thread per half-sarcomere) with a blocking
//! barrier before the coordinator reads any result. Each half-sarcomere owns
//! its random stream, so the draw sequence is independent of threading.

pub mod series;

use rayon::prelude::*;

use crate::config::{ControlMode, ModelParameters, Options, ProtocolStep};
use crate::error::{Result, SarcomereError};
use crate::sarcomere::{force_control, HalfSarcomere, HalfSarcomereMetrics};

pub use series::SeriesElastic;

/// Accept a length residual this small (nm) as balanced.
const LENGTH_RESIDUAL_TOL_NM: f64 = 1e-3;

/// A chain of half-sarcomeres with an optional series elastic element.
pub struct Myofibril {
    /// Muscle id; enters every member's random stream derivation
    pub muscle_id: usize,
    half_sarcomeres: Vec<HalfSarcomere>,
    series: Option<SeriesElastic>,
    series_extension_nm: f64,
    total_length_nm: f64,
    force_kN_per_m2: f64,
    options: Options,
    pool: Option<rayon::ThreadPool>,
    deltas: Vec<f64>,
}

impl Myofibril {
    /// Build `n_half_sarcomeres` identical-parameter members (kinetic rate
    /// variation applies per member through the model's variation table).
    pub fn new(
        muscle_id: usize,
        n_half_sarcomeres: usize,
        params: &ModelParameters,
        options: &Options,
        series: Option<SeriesElastic>,
    ) -> Result<Self> {
        if n_half_sarcomeres == 0 {
            return Err(SarcomereError::invalid_config(
                "a myofibril needs at least one half-sarcomere",
            ));
        }

        let half_sarcomeres: Vec<HalfSarcomere> = (0..n_half_sarcomeres)
            .map(|id| HalfSarcomere::new(muscle_id, id, params, options))
            .collect::<Result<_>>()?;

        let pool = if options.multithreading {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_half_sarcomeres)
                .build()
                .map_err(|e| {
                    SarcomereError::invalid_config(format!("worker pool creation failed: {}", e))
                })?;
            log::info!("myofibril worker pool: {} threads", n_half_sarcomeres);
            Some(pool)
        } else {
            None
        };

        let total_length_nm = half_sarcomeres.iter().map(|hs| hs.hs_length_nm()).sum();
        let force_kN_per_m2 = half_sarcomeres
            .iter()
            .map(|hs| hs.force_kN_per_m2())
            .sum::<f64>()
            / n_half_sarcomeres as f64;

        Ok(Self {
            muscle_id,
            half_sarcomeres,
            series,
            series_extension_nm: 0.0,
            total_length_nm,
            force_kN_per_m2,
            options: options.clone(),
            pool,
            deltas: vec![0.0; n_half_sarcomeres],
        })
    }

    pub fn n_half_sarcomeres(&self) -> usize {
        self.half_sarcomeres.len()
    }

    pub fn half_sarcomere(&self, index: usize) -> &HalfSarcomere {
        &self.half_sarcomeres[index]
    }

    /// Total myofibril length including the series extension (nm).
    pub fn total_length_nm(&self) -> f64 {
        self.total_length_nm
    }

    /// Series element extension (nm); zero without a series element.
    pub fn series_extension_nm(&self) -> f64 {
        self.series_extension_nm
    }

    /// Mean member force from the last step (kN/m²).
    pub fn force_kN_per_m2(&self) -> f64 {
        self.force_kN_per_m2
    }

    /// Per-member summary snapshots.
    pub fn metrics(&self) -> Vec<HalfSarcomereMetrics> {
        self.half_sarcomeres.iter().map(|hs| hs.metrics()).collect()
    }

    /// Advance one protocol step. Returns the number of shared-force residual
    /// evaluations used (1 under force control).
    pub fn step(&mut self, step: &ProtocolStep) -> usize {
        match step.control {
            ControlMode::Length => self.length_control_step(step),
            ControlMode::Force { target_kN_per_m2 } => {
                self.force_control_step(step, target_kN_per_m2)
            }
        }
    }

    /// Length control: advance the total length by the per-member increment
    /// times the member count, then find the shared force consistent with it.
    fn length_control_step(&mut self, step: &ProtocolStep) -> usize {
        let n = self.half_sarcomeres.len();
        self.total_length_nm += step.delta_hsl_nm * n as f64;

        let dt = step.dt_sec;
        let tolerance = self.options.myofibril_force_tolerance_kN_per_m2;
        let max_iterations = self.options.myofibril_max_iterations.max(1);
        let mut iterations = 0;

        // Bracket the shared force around the last step's value. The chain
        // length grows monotonically with force, so one sign change suffices.
        let f0 = self.force_kN_per_m2;
        let residual_0 = self.chain_residual(f0, dt);
        iterations += 1;

        if residual_0.abs() < LENGTH_RESIDUAL_TOL_NM {
            self.apply_members(dt, step.pca);
            self.finish_step(f0);
            return iterations;
        }

        let mut lo = f0;
        let mut hi = f0;
        let mut span = tolerance.max(1.0);
        if residual_0 > 0.0 {
            // Chain too long at f0: the balancing force is lower
            loop {
                lo -= span;
                let residual = self.chain_residual(lo, dt);
                iterations += 1;
                if residual <= 0.0 || iterations >= max_iterations {
                    break;
                }
                span *= 2.0;
            }
        } else {
            loop {
                hi += span;
                let residual = self.chain_residual(hi, dt);
                iterations += 1;
                if residual >= 0.0 || iterations >= max_iterations {
                    break;
                }
                span *= 2.0;
            }
        }

        let mut force = 0.5 * (lo + hi);
        while iterations < max_iterations {
            force = 0.5 * (lo + hi);
            let residual = self.chain_residual(force, dt);
            iterations += 1;

            if residual.abs() < LENGTH_RESIDUAL_TOL_NM || (hi - lo) < tolerance {
                self.apply_members(dt, step.pca);
                self.finish_step(force);
                return iterations;
            }
            if residual > 0.0 {
                hi = force;
            } else {
                lo = force;
            }
        }

        // Cap exceeded: keep the best iterate and move on.
        log::warn!(
            "myofibril force balance hit iteration cap ({}); accepting force {:.3} kN/m²",
            max_iterations,
            force
        );
        self.chain_residual(force, dt);
        self.apply_members(dt, step.pca);
        self.finish_step(force);
        iterations
    }

    /// Force control: members solve their own lengths independently and the
    /// series extension follows from the inverse force-extension law.
    fn force_control_step(&mut self, step: &ProtocolStep, target_kN_per_m2: f64) -> usize {
        let dt = step.dt_sec;
        let pca = step.pca;

        let members = &mut self.half_sarcomeres;
        match &self.pool {
            Some(pool) => pool.install(|| {
                members.par_iter_mut().for_each(|hs| {
                    hs.implement_force_control_step(dt, target_kN_per_m2, pca);
                });
            }),
            None => {
                for hs in members.iter_mut() {
                    hs.implement_force_control_step(dt, target_kN_per_m2, pca);
                }
            }
        }

        self.series_extension_nm = self
            .series
            .as_ref()
            .map_or(0.0, |s| s.extension_for_force(target_kN_per_m2));
        self.total_length_nm = self
            .half_sarcomeres
            .iter()
            .map(|hs| hs.hs_length_nm())
            .sum::<f64>()
            + self.series_extension_nm;
        self.force_kN_per_m2 = self.mean_member_force();
        1
    }

    /// Chain length error (nm) at a trial shared force: positive when the
    /// chain would be longer than the imposed total. Fills `self.deltas` with
    /// each member's solved length change as a side effect.
    fn chain_residual(&mut self, force_kN_per_m2: f64, dt_sec: f64) -> f64 {
        let members = &mut self.half_sarcomeres;
        let deltas = &mut self.deltas;
        match &self.pool {
            Some(pool) => pool.install(|| {
                members
                    .par_iter_mut()
                    .zip(deltas.par_iter_mut())
                    .for_each(|(hs, delta)| {
                        *delta = force_control::solve_delta_for_force(hs, force_kN_per_m2, dt_sec);
                    });
            }),
            None => {
                for (hs, delta) in members.iter_mut().zip(deltas.iter_mut()) {
                    *delta = force_control::solve_delta_for_force(hs, force_kN_per_m2, dt_sec);
                }
            }
        }

        let chain: f64 = self
            .half_sarcomeres
            .iter()
            .zip(self.deltas.iter())
            .map(|(hs, delta)| hs.hs_length_nm() + delta)
            .sum();
        let extension = self
            .series
            .as_ref()
            .map_or(0.0, |s| s.extension_for_force(force_kN_per_m2));
        chain + extension - self.total_length_nm
    }

    /// Commit the solved length changes: one real timestep per member, with
    /// kinetics, at the deltas left by the last residual evaluation.
    fn apply_members(&mut self, dt_sec: f64, pca: f64) {
        let members = &mut self.half_sarcomeres;
        let deltas = &self.deltas;
        match &self.pool {
            Some(pool) => pool.install(|| {
                members
                    .par_iter_mut()
                    .zip(deltas.par_iter())
                    .for_each(|(hs, &delta)| {
                        hs.implement_time_step(dt_sec, delta, pca);
                    });
            }),
            None => {
                for (hs, &delta) in members.iter_mut().zip(deltas.iter()) {
                    hs.implement_time_step(dt_sec, delta, pca);
                }
            }
        }
    }

    /// Post-step bookkeeping after the members have moved.
    fn finish_step(&mut self, balanced_force: f64) {
        let member_total: f64 = self
            .half_sarcomeres
            .iter()
            .map(|hs| hs.hs_length_nm())
            .sum();
        self.series_extension_nm = self.total_length_nm - member_total;
        self.force_kN_per_m2 = if self.series.is_some() {
            balanced_force
        } else {
            self.mean_member_force()
        };
    }

    fn mean_member_force(&self) -> f64 {
        self.half_sarcomeres
            .iter()
            .map(|hs| hs.force_kN_per_m2())
            .sum::<f64>()
            / self.half_sarcomeres.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use approx::assert_relative_eq;

    fn small_params() -> ModelParameters {
        let mut params = ModelParameters::default();
        params.thin.nodes_per_filament = 30;
        params.thick.crowns_per_filament = 20;
        params.titin.thin_attach_node = 20;
        params.titin.thick_attach_node = 19;
        params.accessory.first_crown = 4;
        params.accessory.molecules_per_filament = 5;
        params
    }

    #[test]
    fn test_needs_at_least_one_member() {
        let params = small_params();
        assert!(Myofibril::new(0, 0, &params, &Options::default(), None).is_err());
        assert!(Myofibril::new(0, 1, &params, &Options::default(), None).is_ok());
    }

    #[test]
    fn test_total_length_is_conserved_under_length_control() {
        let params = small_params();
        let mut myofibril = Myofibril::new(0, 3, &params, &Options::default(), None).unwrap();
        let before = myofibril.total_length_nm();

        let protocol = Protocol::length_hold(3, 1e-3, 9.0);
        for step in &protocol.steps {
            myofibril.step(step);
            let member_total: f64 = (0..3)
                .map(|i| myofibril.half_sarcomere(i).hs_length_nm())
                .sum();
            assert_relative_eq!(
                member_total + myofibril.series_extension_nm(),
                myofibril.total_length_nm(),
                epsilon = 1e-6
            );
        }
        assert_relative_eq!(myofibril.total_length_nm(), before, epsilon = 1e-9);
    }

    #[test]
    fn test_identical_members_split_length_evenly() {
        let params = small_params();
        let mut myofibril = Myofibril::new(0, 3, &params, &Options::default(), None).unwrap();

        // Passive stretch: 2 nm per member per step for 5 steps
        for _ in 0..5 {
            myofibril.step(&ProtocolStep {
                dt_sec: 1e-3,
                delta_hsl_nm: 2.0,
                control: ControlMode::Length,
                pca: 9.0,
            });
        }

        let lengths: Vec<f64> = (0..3)
            .map(|i| myofibril.half_sarcomere(i).hs_length_nm())
            .collect();
        // Members have identical passive mechanics, so the split is even to
        // within the force-balance tolerance
        for &length in &lengths {
            assert_relative_eq!(length, lengths[0], epsilon = 2.0);
        }
        let total: f64 = lengths.iter().sum();
        assert_relative_eq!(
            total + myofibril.series_extension_nm(),
            myofibril.total_length_nm(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_force_control_sets_series_extension_algebraically() {
        let params = small_params();
        let series = SeriesElastic {
            stiffness_kN_per_m2_per_nm: 0.5,
            ..SeriesElastic::default()
        };
        let mut myofibril =
            Myofibril::new(0, 2, &params, &Options::default(), Some(series)).unwrap();

        let target = 1.0;
        myofibril.step(&ProtocolStep {
            dt_sec: 1e-3,
            delta_hsl_nm: 0.0,
            control: ControlMode::Force {
                target_kN_per_m2: target,
            },
            pca: 9.0,
        });

        assert_relative_eq!(myofibril.series_extension_nm(), target / 0.5, epsilon = 1e-9);
        let member_total: f64 = (0..2)
            .map(|i| myofibril.half_sarcomere(i).hs_length_nm())
            .sum();
        assert_relative_eq!(
            myofibril.total_length_nm(),
            member_total + myofibril.series_extension_nm(),
            epsilon = 1e-9
        );
    }
}
