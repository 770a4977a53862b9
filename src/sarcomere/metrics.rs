//! Per-step summary metrics.
//!
//! A read-only snapshot taken after each timestep, serializable for whatever
//! output layer sits on top of the engine.

use serde::Serialize;

/// Snapshot of one half-sarcomere after a completed timestep.
#[derive(Debug, Clone, Serialize)]
pub struct HalfSarcomereMetrics {
    /// Half-sarcomere length (nm)
    pub hs_length_nm: f64,
    /// Total axial stress (kN/m²)
    pub force_kN_per_m2: f64,
    /// Titin contribution (kN/m²)
    pub titin_force_kN_per_m2: f64,
    /// Extracellular parallel-element contribution (kN/m²)
    pub extracellular_force_kN_per_m2: f64,
    /// Viscous contribution from the last length change (kN/m²)
    pub viscous_force_kN_per_m2: f64,
    /// Mean thin filament length: average terminal-node position (nm)
    pub mean_thin_length_nm: f64,
    /// Mean thick filament length: average M-line-to-last-crown span (nm)
    pub mean_thick_length_nm: f64,
    /// Binding-site status proportions `[off, on]`; sums to 1
    pub site_occupancy: Vec<f64>,
    /// Cross-bridge state proportions by state index; sums to 1
    pub cb_occupancy: Vec<f64>,
    /// MyBP-C state proportions by state index; sums to 1
    pub accessory_occupancy: Vec<f64>,
    /// Equilibrium iterations used by the last solve
    pub x_solve_iterations: usize,
    /// Whether any probability vector was rescaled so far this run
    pub rescale_warned: bool,
}
