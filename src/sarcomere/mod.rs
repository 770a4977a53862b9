//! Half-sarcomere orchestration.
//!
//! A `HalfSarcomere` owns one filament lattice, its equilibrium solver, its
//! kinetics engine, and its own random stream. One timestep is a fixed
//! pipeline: remap nearest-site candidates, run kinetics sub-steps, apply the
//! length change, re-solve mechanical equilibrium, unpack node positions back
//! into the filament structures, and refresh the force summaries. Force
//! control wraps the same pipeline behind a scalar root solve on the length
//! change (`force_control`).

pub mod force_control;
pub mod metrics;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{
    ExtracellularParameters, ForceScalingParameters, ModelParameters, Options, TitinParameters,
};
use crate::error::{Result, SarcomereError};
use crate::geometry::{assign_isotypes, Lattice, ThickFilament, ThinFilament};
use crate::kinetics::engine::KineticsEngine;
use crate::kinetics::scheme::KineticScheme;
use crate::mechanics::forces;
use crate::mechanics::EquilibriumSolver;

pub use metrics::HalfSarcomereMetrics;

/// One half-sarcomere: lattice state, solvers, and its random stream.
pub struct HalfSarcomere {
    /// Index within the owning myofibril
    pub id: usize,
    /// Owning muscle id; enters the random stream derivation
    pub muscle_id: usize,
    thin: Vec<ThinFilament>,
    thick: Vec<ThickFilament>,
    solver: EquilibriumSolver,
    engine: KineticsEngine,
    rng: StdRng,
    x: Vec<f64>,
    x_scratch: Vec<f64>,
    myosin_schemes: Vec<Arc<KineticScheme>>,
    accessory_schemes: Vec<Arc<KineticScheme>>,
    titin: TitinParameters,
    extracellular: ExtracellularParameters,
    force_scaling: ForceScalingParameters,
    options: Options,
    cb_stiffness_pN_per_nm: f64,
    accessory_stiffness_pN_per_nm: f64,
    thick_backbone_stiffness_pN_per_nm: f64,
    bare_zone_nm: f64,
    control_range_nm: f64,
    thin_nodes: usize,
    thick_nodes: usize,
    force_kN_per_m2: f64,
    titin_force_kN_per_m2: f64,
    extracellular_force_kN_per_m2: f64,
    viscous_force_kN_per_m2: f64,
    last_x_iterations: usize,
}

impl HalfSarcomere {
    /// Build a half-sarcomere from a validated model description.
    ///
    /// Construction is fatal on malformed input: non-square filament counts,
    /// empty isotype tables, odd heads per crown, or titin attachment nodes
    /// outside the filaments.
    pub fn new(
        muscle_id: usize,
        id: usize,
        params: &ModelParameters,
        options: &Options,
    ) -> Result<Self> {
        if params.myosin_isotypes.is_empty() || params.accessory_isotypes.is_empty() {
            return Err(SarcomereError::invalid_config("isotype tables may not be empty"));
        }
        if params.titin.thin_attach_node >= params.thin.nodes_per_filament
            || params.titin.thick_attach_node >= params.thick.crowns_per_filament
        {
            return Err(SarcomereError::invalid_config(format!(
                "titin attachment ({}, {}) outside filaments ({} thin nodes, {} crowns)",
                params.titin.thin_attach_node,
                params.titin.thick_attach_node,
                params.thin.nodes_per_filament,
                params.thick.crowns_per_filament
            )));
        }

        let lattice = Lattice::build(&params.lattice)?;

        // Per-half-sarcomere kinetic variation is a derived scheme copy; the
        // base scheme stays shared and immutable.
        let rate_scale = params.rate_scale_for(id);
        let derive = |scheme: &KineticScheme| {
            if (rate_scale - 1.0).abs() < f64::EPSILON {
                Arc::new(scheme.clone())
            } else {
                Arc::new(scheme.with_rate_scale(rate_scale))
            }
        };
        let myosin_schemes: Vec<_> = params
            .myosin_isotypes
            .iter()
            .map(|iso| derive(&iso.scheme))
            .collect();
        let accessory_schemes: Vec<_> = params
            .accessory_isotypes
            .iter()
            .map(|iso| derive(&iso.scheme))
            .collect();

        let thin: Vec<ThinFilament> = (0..lattice.n_thin())
            .map(|f| ThinFilament::new(f, &params.thin, lattice.thin_positions[f]))
            .collect();

        let n_dimers = params.thick.crowns_per_filament * params.thick.cbs_per_crown / 2;
        let myosin_proportions: Vec<f64> =
            params.myosin_isotypes.iter().map(|i| i.proportion).collect();
        let accessory_proportions: Vec<f64> = params
            .accessory_isotypes
            .iter()
            .map(|i| i.proportion)
            .collect();
        let cb_isotypes = assign_isotypes(n_dimers, &myosin_proportions);
        let acc_isotypes = assign_isotypes(
            params.accessory.molecules_per_filament,
            &accessory_proportions,
        );

        let thick: Vec<ThickFilament> = (0..lattice.n_thick())
            .map(|t| {
                ThickFilament::new(
                    t,
                    &params.thick,
                    &params.accessory,
                    lattice.thick_positions[t],
                    lattice.nearest_thin[t],
                    params.lattice.initial_hs_length_nm,
                    &cb_isotypes,
                    &acc_isotypes,
                )
            })
            .collect::<Result<_>>()?;

        let solver = EquilibriumSolver::new(params, options, thin.len(), thick.len());
        let x = solver.rest_positions();

        let engine = KineticsEngine::new(
            options,
            &params.thin,
            &params.thick,
            params.accessory.stiffness_pN_per_nm,
            myosin_schemes.clone(),
            accessory_schemes.clone(),
        );

        let rng = StdRng::seed_from_u64(derive_seed(options.seed, muscle_id, id));

        let mut hs = Self {
            id,
            muscle_id,
            thin,
            thick,
            solver,
            engine,
            rng,
            x_scratch: x.clone(),
            x,
            myosin_schemes,
            accessory_schemes,
            titin: params.titin.clone(),
            extracellular: params.extracellular.clone(),
            force_scaling: params.force_scaling.clone(),
            options: options.clone(),
            cb_stiffness_pN_per_nm: params.thick.cb_stiffness_pN_per_nm,
            accessory_stiffness_pN_per_nm: params.accessory.stiffness_pN_per_nm,
            thick_backbone_stiffness_pN_per_nm: params.thick.backbone_stiffness_pN_per_nm,
            bare_zone_nm: params.thick.bare_zone_nm,
            control_range_nm: params.accessory.control_range_nm,
            thin_nodes: params.thin.nodes_per_filament,
            thick_nodes: params.thick.crowns_per_filament,
            force_kN_per_m2: 0.0,
            titin_force_kN_per_m2: 0.0,
            extracellular_force_kN_per_m2: 0.0,
            viscous_force_kN_per_m2: 0.0,
            last_x_iterations: 0,
        };

        hs.unpack_positions();
        hs.remap_nearest_sites();
        hs.refresh_forces(0.0, 0.0);
        Ok(hs)
    }

    /// Current half-sarcomere length (nm).
    pub fn hs_length_nm(&self) -> f64 {
        self.solver.hs_length_nm()
    }

    /// Total axial stress from the last completed step (kN/m²).
    pub fn force_kN_per_m2(&self) -> f64 {
        self.force_kN_per_m2
    }

    /// Equilibrium iterations used by the last solve.
    pub fn last_x_iterations(&self) -> usize {
        self.last_x_iterations
    }

    /// Advance one timestep at an imposed length change.
    ///
    /// Returns the equilibrium iteration count; hitting the cap is non-fatal
    /// and shows up only in that count.
    pub fn implement_time_step(&mut self, dt_sec: f64, delta_hsl_nm: f64, pca: f64) -> usize {
        self.remap_nearest_sites();

        let ca_molar = crate::config::pca_to_molar(pca);
        self.engine.step(
            &mut self.thin,
            &mut self.thick,
            ca_molar,
            dt_sec,
            &mut self.rng,
        );

        let new_length = self.solver.hs_length_nm() + delta_hsl_nm;
        self.solver.set_hs_length(new_length);
        let iterations = self.solve_equilibrium();
        self.unpack_positions();
        self.refresh_forces(delta_hsl_nm, dt_sec);

        self.last_x_iterations = iterations;
        iterations
    }

    /// Advance one timestep under force control: solve for the length change
    /// that produces `target_kN_per_m2`, then apply it like a fixed-length
    /// step. Returns the applied length change.
    pub fn implement_force_control_step(
        &mut self,
        dt_sec: f64,
        target_kN_per_m2: f64,
        pca: f64,
    ) -> f64 {
        let delta = force_control::solve_delta_for_force(self, target_kN_per_m2, dt_sec);
        self.implement_time_step(dt_sec, delta, pca);
        delta
    }

    /// Evaluate the total force at a trial length change without committing:
    /// the pre-trial length and node positions are restored exactly.
    pub fn trial_force(&mut self, delta_hsl_nm: f64, dt_sec: f64) -> f64 {
        let saved_length = self.solver.hs_length_nm();
        self.x_scratch.copy_from_slice(&self.x);

        self.solver.set_hs_length(saved_length + delta_hsl_nm);
        self.solve_equilibrium();
        let force = self.compute_total_force(delta_hsl_nm, dt_sec).0;

        self.solver.set_hs_length(saved_length);
        self.x.copy_from_slice(&self.x_scratch);
        force
    }

    /// Per-step summary snapshot.
    pub fn metrics(&self) -> HalfSarcomereMetrics {
        let hs_length = self.solver.hs_length_nm();

        let mean_thin = self
            .thin
            .iter()
            .map(|f| f.node_positions_nm[f.n_nodes() - 1])
            .sum::<f64>()
            / self.thin.len() as f64;
        let mean_thick = self
            .thick
            .iter()
            .map(|f| hs_length - f.node_positions_nm[f.n_crowns() - 1])
            .sum::<f64>()
            / self.thick.len() as f64;

        HalfSarcomereMetrics {
            hs_length_nm: hs_length,
            force_kN_per_m2: self.force_kN_per_m2,
            titin_force_kN_per_m2: self.titin_force_kN_per_m2,
            extracellular_force_kN_per_m2: self.extracellular_force_kN_per_m2,
            viscous_force_kN_per_m2: self.viscous_force_kN_per_m2,
            mean_thin_length_nm: mean_thin,
            mean_thick_length_nm: mean_thick,
            site_occupancy: self.site_occupancy(),
            cb_occupancy: self.cb_occupancy(),
            accessory_occupancy: self.accessory_occupancy(),
            x_solve_iterations: self.last_x_iterations,
            rescale_warned: self.engine.rescale_warned(),
        }
    }

    /// Binding-site status proportions `[off, on]`.
    pub fn site_occupancy(&self) -> Vec<f64> {
        let mut counts = [0usize; 2];
        for filament in &self.thin {
            for site in &filament.sites {
                counts[site.active as usize] += 1;
            }
        }
        let total: usize = counts.iter().sum();
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// Cross-bridge state proportions by state index.
    pub fn cb_occupancy(&self) -> Vec<f64> {
        let n_states = self
            .myosin_schemes
            .iter()
            .map(|s| s.n_states())
            .max()
            .unwrap_or(0);
        let mut counts = vec![0usize; n_states];
        for filament in &self.thick {
            for cb in &filament.cross_bridges {
                counts[cb.state] += 1;
            }
        }
        let total: usize = counts.iter().sum();
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// MyBP-C state proportions by state index.
    pub fn accessory_occupancy(&self) -> Vec<f64> {
        let n_states = self
            .accessory_schemes
            .iter()
            .map(|s| s.n_states())
            .max()
            .unwrap_or(0);
        let mut counts = vec![0usize; n_states];
        for filament in &self.thick {
            for molecule in &filament.accessories {
                counts[molecule.state] += 1;
            }
        }
        let total: usize = counts.iter().sum();
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// Iteration cap for the force-control root finder (exposed for the
    /// solver in `force_control`).
    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    /// Rebuild every molecule's nearest-thin-filament, candidate-site window,
    /// and controlling-accessory index from the current geometry. Positions
    /// drift between steps, so this runs at the top of every timestep.
    fn remap_nearest_sites(&mut self) {
        let window = self.options.attachment_window;
        let control_range = self.control_range_nm;

        for filament in self.thick.iter_mut() {
            let n_cbs = filament.n_cross_bridges();
            for cb_idx in 0..n_cbs {
                let angle = filament.cross_bridges[cb_idx].angle_deg;
                let x = filament.cb_position_nm(cb_idx);
                let thin_id = filament.nearest_thin[Lattice::angle_bin(angle)];
                let sites = candidate_window(&self.thin[thin_id], x, window);

                let cb_crown_x = x;
                let controlling = filament
                    .accessories
                    .iter()
                    .enumerate()
                    .filter(|(_, acc)| {
                        (filament.node_positions_nm[acc.crown] - cb_crown_x).abs()
                            <= control_range
                    })
                    .min_by(|(_, a), (_, b)| {
                        angular_distance(a.angle_deg, angle)
                            .total_cmp(&angular_distance(b.angle_deg, angle))
                    })
                    .map(|(idx, _)| idx);

                let cb = &mut filament.cross_bridges[cb_idx];
                cb.nearest_thin_id = thin_id;
                cb.candidate_sites = sites;
                cb.controlling_accessory = controlling;
            }

            let n_acc = filament.accessories.len();
            for acc_idx in 0..n_acc {
                let angle = filament.accessories[acc_idx].angle_deg;
                let x = filament.accessory_position_nm(acc_idx);
                let thin_id = filament.nearest_thin[Lattice::angle_bin(angle)];
                let sites = candidate_window(&self.thin[thin_id], x, window);

                let molecule = &mut filament.accessories[acc_idx];
                molecule.nearest_thin_id = thin_id;
                molecule.candidate_sites = sites;
            }
        }
    }

    /// Run the fixed-point equilibrium solve against the current lattice
    /// connectivity.
    fn solve_equilibrium(&mut self) -> usize {
        let thin = &self.thin;
        let thick = &self.thick;
        let myosin_schemes = &self.myosin_schemes;
        let accessory_schemes = &self.accessory_schemes;
        let titin = &self.titin;
        let cb_k = self.cb_stiffness_pN_per_nm;
        let acc_k = self.accessory_stiffness_pN_per_nm;
        let thin_nodes = self.thin_nodes;
        let thick_nodes = self.thick_nodes;
        let thick_base = thin.len() * thin_nodes;

        self.solver.solve(&mut self.x, |x, rhs| {
            coupling_forces(
                thin,
                thick,
                myosin_schemes,
                accessory_schemes,
                titin,
                cb_k,
                acc_k,
                thin_nodes,
                thick_nodes,
                thick_base,
                x,
                rhs,
            )
        })
    }

    /// Copy solved node positions back into the filament structures.
    fn unpack_positions(&mut self) {
        for (f, filament) in self.thin.iter_mut().enumerate() {
            let offset = f * self.thin_nodes;
            filament
                .node_positions_nm
                .copy_from_slice(&self.x[offset..offset + self.thin_nodes]);
        }
        let thick_base = self.thin.len() * self.thin_nodes;
        for (t, filament) in self.thick.iter_mut().enumerate() {
            let offset = thick_base + t * self.thick_nodes;
            filament
                .node_positions_nm
                .copy_from_slice(&self.x[offset..offset + self.thick_nodes]);
        }
    }

    /// Total stress and its components at the current equilibrium.
    ///
    /// The active/filament part is the mean M-line anchor-spring tension
    /// across thick filaments, scaled to stress; titin, extracellular, and
    /// viscous terms add on top.
    fn compute_total_force(&self, delta_hsl_nm: f64, dt_sec: f64) -> (f64, f64, f64, f64) {
        let hs_length = self.solver.hs_length_nm();
        let thick_base = self.thin.len() * self.thin_nodes;

        // The crown-0 backbone stiffness lives in the chain; reconstruct the
        // anchor tension from the first crown position.
        let mut anchor_sum = 0.0;
        for t in 0..self.thick.len() {
            let x0 = self.x[thick_base + t * self.thick_nodes];
            anchor_sum += hs_length - self.bare_zone_nm - x0;
        }
        let mean_anchor_pN =
            self.thick_backbone_stiffness_pN_per_nm * anchor_sum / self.thick.len() as f64;
        let filament_stress = forces::scale_filament_force(&self.force_scaling, mean_anchor_pN);

        // Titin: sum over all thick-to-neighbor links, normalized per thick
        // filament, then the same geometric scaling.
        let thin_attach = self.titin.thin_attach_node;
        let thick_attach = self.titin.thick_attach_node;
        let mut titin_sum_pN = 0.0;
        for (t, filament) in self.thick.iter().enumerate() {
            let x_m = self.x[thick_base + t * self.thick_nodes + thick_attach];
            for &thin_id in &filament.nearest_thin {
                let x_a = self.x[thin_id * self.thin_nodes + thin_attach];
                titin_sum_pN += forces::titin_force_pN(&self.titin, x_m - x_a);
            }
        }
        let titin_stress = forces::scale_filament_force(
            &self.force_scaling,
            titin_sum_pN / self.thick.len() as f64,
        );

        let extracellular_stress =
            forces::extracellular_force_kN_per_m2(&self.extracellular, hs_length);
        let viscous_stress =
            forces::viscous_force_kN_per_m2(&self.force_scaling, delta_hsl_nm, dt_sec);

        (
            filament_stress + titin_stress + extracellular_stress + viscous_stress,
            titin_stress,
            extracellular_stress,
            viscous_stress,
        )
    }

    fn refresh_forces(&mut self, delta_hsl_nm: f64, dt_sec: f64) {
        let (total, titin, extracellular, viscous) =
            self.compute_total_force(delta_hsl_nm, dt_sec);
        self.force_kN_per_m2 = total;
        self.titin_force_kN_per_m2 = titin;
        self.extracellular_force_kN_per_m2 = extracellular;
        self.viscous_force_kN_per_m2 = viscous;
    }

}

/// Mix the run seed with the muscle and half-sarcomere ids into one stream
/// seed (splitmix-style finalizer, so nearby ids decorrelate).
fn derive_seed(run_seed: u64, muscle_id: usize, hs_id: usize) -> u64 {
    let mut z = run_seed
        .wrapping_add((muscle_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((hs_id as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Sites of the nodes within `window` of the node nearest to `x`, all strands.
fn candidate_window(filament: &ThinFilament, x: f64, window: usize) -> Vec<usize> {
    let nearest = filament.node_of_site(filament.nearest_site(x, 0));
    let lo = nearest.saturating_sub(window);
    let hi = (nearest + window).min(filament.n_nodes() - 1);
    (lo..=hi)
        .flat_map(|node| filament.sites_of_node(node))
        .collect()
}

/// Smallest absolute angular separation in degrees.
fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Inter-filament link forces (pN) at positions `x`, accumulated into `rhs`.
///
/// Positive is toward the M-line. Covers bound cross-bridges, bound MyBP-C,
/// and the six titin links per thick filament.
#[allow(clippy::too_many_arguments)]
fn coupling_forces(
    thin: &[ThinFilament],
    thick: &[ThickFilament],
    myosin_schemes: &[Arc<KineticScheme>],
    accessory_schemes: &[Arc<KineticScheme>],
    titin: &TitinParameters,
    cb_k: f64,
    acc_k: f64,
    thin_nodes: usize,
    thick_nodes: usize,
    thick_base: usize,
    x: &[f64],
    rhs: &mut [f64],
) {
    for (t, filament) in thick.iter().enumerate() {
        let offset = thick_base + t * thick_nodes;

        for cb in &filament.cross_bridges {
            if let Some(bound) = cb.bound {
                let extension = myosin_schemes[cb.isotype].state(cb.state).extension_nm;
                let thin_node = thin[bound.thin_id].node_of_site(bound.site);
                let thin_index = bound.thin_id * thin_nodes + thin_node;
                let thick_index = offset + cb.crown;

                let stretch = x[thick_index] + extension - x[thin_index];
                let force = cb_k * stretch;
                rhs[thin_index] += force;
                rhs[thick_index] -= force;
            }
        }

        for molecule in &filament.accessories {
            if let Some(bound) = molecule.bound {
                let extension = accessory_schemes[molecule.isotype]
                    .state(molecule.state)
                    .extension_nm;
                let thin_node = thin[bound.thin_id].node_of_site(bound.site);
                let thin_index = bound.thin_id * thin_nodes + thin_node;
                let thick_index = offset + molecule.crown;

                let stretch = x[thick_index] + extension - x[thin_index];
                let force = acc_k * stretch;
                rhs[thin_index] += force;
                rhs[thick_index] -= force;
            }
        }

        let thick_index = offset + titin.thick_attach_node;
        for &thin_id in &filament.nearest_thin {
            let thin_index = thin_id * thin_nodes + titin.thin_attach_node;
            let force = forces::titin_force_pN(titin, x[thick_index] - x[thin_index]);
            rhs[thin_index] += force;
            rhs[thick_index] -= force;
        }
    }
}
