//! Scalar force-control root finder.
//!
//! Finds the length change that brings a half-sarcomere to a target force by
//! bisection on `f(Δ) = force(Δ) − target`. Every evaluation is a full but
//! reversible mechanical re-solve (`HalfSarcomere::trial_force`); the chosen
//! Δ is applied for real by the caller.

use crate::sarcomere::HalfSarcomere;

/// Replacement residual for non-finite force evaluations, so the bracket
/// stays well ordered.
const RESIDUAL_SENTINEL: f64 = 1e12;

/// Solve for the length change (nm) producing `target_kN_per_m2`.
///
/// The bracket spans the configured maximum length change per step, floored
/// so the trial length never drops below 10 nm. Terminates on the force
/// tolerance or the iteration cap; the best midpoint is returned either way.
pub fn solve_delta_for_force(
    hs: &mut HalfSarcomere,
    target_kN_per_m2: f64,
    dt_sec: f64,
) -> f64 {
    let options = hs.options();
    let max_delta = options.force_control_max_delta_hsl_nm;
    let tolerance = options.force_control_tolerance_kN_per_m2;
    let max_iterations = options.force_control_max_iterations;

    let mut lo = (-max_delta).max(10.0 - hs.hs_length_nm());
    let mut hi = max_delta;

    let mut f_lo = residual(hs, lo, target_kN_per_m2, dt_sec);
    let f_hi = residual(hs, hi, target_kN_per_m2, dt_sec);

    if f_lo == 0.0 {
        return lo;
    }
    if f_hi == 0.0 {
        return hi;
    }
    if f_lo * f_hi > 0.0 {
        // Target is outside the reachable range; take the closer endpoint.
        log::debug!(
            "force-control bracket does not straddle target {} kN/m²",
            target_kN_per_m2
        );
        return if f_lo.abs() <= f_hi.abs() { lo } else { hi };
    }

    let mut mid = 0.5 * (lo + hi);
    for _ in 0..max_iterations {
        mid = 0.5 * (lo + hi);
        let f_mid = residual(hs, mid, target_kN_per_m2, dt_sec);
        if f_mid.abs() < tolerance {
            return mid;
        }
        if f_mid * f_lo < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    mid
}

fn residual(hs: &mut HalfSarcomere, delta_nm: f64, target: f64, dt_sec: f64) -> f64 {
    let value = hs.trial_force(delta_nm, dt_sec) - target;
    if value.is_finite() {
        value
    } else if value.is_sign_negative() {
        -RESIDUAL_SENTINEL
    } else {
        RESIDUAL_SENTINEL
    }
}
