//! Mechanical equilibrium of the filament lattice.
//!
//! Node positions satisfy `K(x) x = F` where the backbone stiffness `K0` is
//! constant and tridiagonal per filament, while cross-bridge, MyBP-C, and
//! titin links couple filaments and move with the kinetic state. The solve is
//! a damped fixed-point iteration: link forces are evaluated at the current
//! positions and moved to the right-hand side, then each filament chain is
//! solved exactly with the Thomas algorithm.
//!
//! Convergence is best effort: hitting the iteration cap keeps the last
//! iterate and reports the count, mirroring how the lattice is driven (many
//! small timesteps, each starting from the previous solution).

use crate::config::{LatticeParameters, ModelParameters, Options, ThickParameters, ThinParameters};
use crate::mechanics::tridiagonal::TridiagonalSolver;

/// One filament chain's constant stiffness rows and load vector.
#[derive(Debug, Clone)]
struct Chain {
    offset: usize,
    lower: Vec<f64>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    f0: Vec<f64>,
}

/// Damped fixed-point solver over all filament chains of one half-sarcomere.
#[derive(Debug, Clone)]
pub struct EquilibriumSolver {
    chains: Vec<Chain>,
    n_thin: usize,
    thin_nodes: usize,
    thick_nodes: usize,
    thick_stiffness_pN_per_nm: f64,
    bare_zone_nm: f64,
    crown_spacing_nm: f64,
    hs_length_nm: f64,
    rel_tolerance: f64,
    max_iterations: usize,
    solver: TridiagonalSolver,
    rhs: Vec<f64>,
    x_new: Vec<f64>,
}

impl EquilibriumSolver {
    /// Assemble `K0` for `n_thin` thin and `n_thick` thick filaments.
    pub fn new(params: &ModelParameters, options: &Options, n_thin: usize, n_thick: usize) -> Self {
        let thin = &params.thin;
        let thick = &params.thick;
        let lattice = &params.lattice;

        let thin_nodes = thin.nodes_per_filament;
        let thick_nodes = thick.crowns_per_filament;
        let n_nodes = n_thin * thin_nodes + n_thick * thick_nodes;

        let mut chains = Vec::with_capacity(n_thin + n_thick);
        for f in 0..n_thin {
            chains.push(thin_chain(thin, f * thin_nodes));
        }
        let thick_base = n_thin * thin_nodes;
        for f in 0..n_thick {
            chains.push(thick_chain(
                thick,
                lattice,
                thick_base + f * thick_nodes,
            ));
        }

        let max_chain = thin_nodes.max(thick_nodes);
        Self {
            chains,
            n_thin,
            thin_nodes,
            thick_nodes,
            thick_stiffness_pN_per_nm: thick.backbone_stiffness_pN_per_nm,
            bare_zone_nm: thick.bare_zone_nm,
            crown_spacing_nm: thick.crown_spacing_nm,
            hs_length_nm: lattice.initial_hs_length_nm,
            rel_tolerance: options.x_solve_rel_tolerance,
            max_iterations: options.x_solve_max_iterations.max(1),
            solver: TridiagonalSolver::new(max_chain),
            rhs: vec![0.0; n_nodes],
            x_new: vec![0.0; n_nodes],
        }
    }

    /// Total node count across all chains.
    pub fn n_nodes(&self) -> usize {
        self.rhs.len()
    }

    /// Offset of a thin filament's node block in the position vector.
    pub fn thin_offset(&self, thin_id: usize) -> usize {
        thin_id * self.thin_nodes
    }

    /// Offset of a thick filament's node block in the position vector.
    pub fn thick_offset(&self, thick_id: usize) -> usize {
        self.n_thin * self.thin_nodes + thick_id * self.thick_nodes
    }

    /// Current half-sarcomere length (nm).
    pub fn hs_length_nm(&self) -> f64 {
        self.hs_length_nm
    }

    /// Move the M-line anchor. Only the first thick-chain row carries the
    /// length, so the update touches one load entry per thick filament.
    pub fn set_hs_length(&mut self, hs_length_nm: f64) {
        self.hs_length_nm = hs_length_nm;
        let m = self.thick_stiffness_pN_per_nm;
        let anchor = m * (hs_length_nm - self.bare_zone_nm + self.crown_spacing_nm);
        for chain in &mut self.chains[self.n_thin..] {
            chain.f0[0] = anchor;
        }
    }

    /// Unloaded rest positions for the current length.
    pub fn rest_positions(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.n_nodes()];
        for chain in &self.chains[..self.n_thin] {
            for i in 0..self.thin_nodes {
                // Rest spacing is encoded in the terminal load row
                x[chain.offset + i] = (i + 1) as f64 * chain.f0[self.thin_nodes - 1]
                    / chain.diag[self.thin_nodes - 1];
            }
        }
        for chain in &self.chains[self.n_thin..] {
            for i in 0..self.thick_nodes {
                x[chain.offset + i] =
                    self.hs_length_nm - self.bare_zone_nm - i as f64 * self.crown_spacing_nm;
            }
        }
        x
    }

    /// Run the damped fixed-point iteration in place.
    ///
    /// `coupling` adds every inter-filament link force (pN, positive toward
    /// larger x) into the supplied right-hand side at the current positions.
    /// Returns the number of iterations used; reaching the cap is non-fatal.
    pub fn solve<F>(&mut self, x: &mut [f64], mut coupling: F) -> usize
    where
        F: FnMut(&[f64], &mut [f64]),
    {
        debug_assert_eq!(x.len(), self.n_nodes());
        let scale = self.hs_length_nm.abs().max(1.0);
        let mut damp = 1.0;
        let mut prev_deviation = f64::INFINITY;

        for iteration in 1..=self.max_iterations {
            for (dst, chain) in self.rhs.iter_mut().zip(ChainLoads::new(&self.chains)) {
                *dst = chain;
            }
            coupling(x, &mut self.rhs);

            for chain in &self.chains {
                let range = chain.offset..chain.offset + chain.diag.len();
                self.solver.solve(
                    &chain.lower,
                    &chain.diag,
                    &chain.upper,
                    &self.rhs[range.clone()],
                    &mut self.x_new[range],
                );
            }

            let deviation = x
                .iter()
                .zip(self.x_new.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f64, f64::max);

            // A growing deviation means the undamped map is overshooting;
            // halve the blend and keep it halved.
            if deviation > prev_deviation {
                damp *= 0.5;
            }
            prev_deviation = deviation;

            for (xi, &ni) in x.iter_mut().zip(self.x_new.iter()) {
                *xi += damp * (ni - *xi);
            }

            if deviation < self.rel_tolerance * scale {
                return iteration;
            }
        }

        log::debug!(
            "equilibrium solve hit iteration cap ({}), deviation {:.3e} nm",
            self.max_iterations,
            prev_deviation
        );
        self.max_iterations
    }
}

/// Flattened iterator over per-chain load vectors, in node-vector order.
struct ChainLoads<'a> {
    chains: &'a [Chain],
    chain: usize,
    index: usize,
}

impl<'a> ChainLoads<'a> {
    fn new(chains: &'a [Chain]) -> Self {
        Self {
            chains,
            chain: 0,
            index: 0,
        }
    }
}

impl<'a> Iterator for ChainLoads<'a> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let chain = self.chains.get(self.chain)?;
        let value = chain.f0[self.index];
        self.index += 1;
        if self.index == chain.f0.len() {
            self.index = 0;
            self.chain += 1;
        }
        Some(value)
    }
}

/// Z-disc anchored chain: `2k` on the diagonal except `k` on the free end.
fn thin_chain(thin: &ThinParameters, offset: usize) -> Chain {
    let n = thin.nodes_per_filament;
    let k = thin.backbone_stiffness_pN_per_nm;

    let mut diag = vec![2.0 * k; n];
    diag[n - 1] = k;
    let mut lower = vec![-k; n];
    lower[0] = 0.0;
    let mut upper = vec![-k; n];
    upper[n - 1] = 0.0;
    let mut f0 = vec![0.0; n];
    f0[n - 1] = k * thin.node_spacing_nm;

    Chain {
        offset,
        lower,
        diag,
        upper,
        f0,
    }
}

/// M-line anchored chain: the anchor spring spans the bare zone, so the first
/// row's load carries the half-sarcomere length.
fn thick_chain(thick: &ThickParameters, lattice: &LatticeParameters, offset: usize) -> Chain {
    let n = thick.crowns_per_filament;
    let m = thick.backbone_stiffness_pN_per_nm;

    let mut diag = vec![2.0 * m; n];
    diag[n - 1] = m;
    let mut lower = vec![-m; n];
    lower[0] = 0.0;
    let mut upper = vec![-m; n];
    upper[n - 1] = 0.0;
    let mut f0 = vec![0.0; n];
    f0[0] = m * (lattice.initial_hs_length_nm - thick.bare_zone_nm + thick.crown_spacing_nm);
    f0[n - 1] = -m * thick.crown_spacing_nm;

    Chain {
        offset,
        lower,
        diag,
        upper,
        f0,
    }
}
