//! Passive force laws and cross-section force scaling.
//!
//! Single-filament forces are in pN; muscle-level stresses are in kN/m².
//! The conversion runs through the thick filament areal density and the
//! myofilament fraction of the cross-section.

use crate::config::{ExtracellularParameters, ForceScalingParameters, TitinParameters};

/// pN per filament → kN/m² of cross-section.
/// 1 pN = 1e-12 N and 1 kN = 1e3 N.
const PN_PER_FILAMENT_TO_KN_PER_M2: f64 = 1e-15;

/// Titin spring force (pN) at a given end-to-end stretch.
///
/// Linear up to `linear_limit_nm`, then an added exponential tail. The spring
/// is two-sided: compression produces a restoring force of the same law.
pub fn titin_force_pN(params: &TitinParameters, stretch_nm: f64) -> f64 {
    let x = stretch_nm - params.offset_nm;
    let mut force = params.stiffness_pN_per_nm * x;
    if x > params.linear_limit_nm {
        force += params.exp_amplitude_pN
            * (((x - params.linear_limit_nm) / params.exp_length_nm).exp() - 1.0);
    }
    force
}

/// Extracellular parallel-element stress (kN/m²) at a half-sarcomere length.
/// Bears no load below slack length.
pub fn extracellular_force_kN_per_m2(
    params: &ExtracellularParameters,
    hs_length_nm: f64,
) -> f64 {
    let extension = hs_length_nm - params.slack_length_nm;
    if extension <= 0.0 {
        return 0.0;
    }
    if params.exponential {
        params.exp_amplitude_kN_per_m2 * ((extension / params.exp_length_nm).exp() - 1.0)
    } else {
        params.stiffness_kN_per_m2_per_nm * extension
    }
}

/// Scale a mean per-thick-filament force (pN) to myofilament stress (kN/m²).
///
/// Fibrosis displaces myofilament cross-section; the remaining area is
/// further partitioned by the myofilament fraction.
pub fn scale_filament_force(params: &ForceScalingParameters, mean_force_pN: f64) -> f64 {
    (1.0 - params.prop_fibrosis)
        * params.prop_myofilaments
        * params.filament_density_per_m2
        * mean_force_pN
        * PN_PER_FILAMENT_TO_KN_PER_M2
}

/// Viscous stress (kN/m²) opposing the imposed length change.
pub fn viscous_force_kN_per_m2(
    params: &ForceScalingParameters,
    delta_hsl_nm: f64,
    dt_sec: f64,
) -> f64 {
    if dt_sec <= 0.0 {
        return 0.0;
    }
    params.viscosity_kN_s_per_m2_per_nm * delta_hsl_nm / dt_sec
}
