//! Validation tests for lattice mechanics.
//!
//! The equilibrium solver is checked against closed-form solutions of the
//! underlying spring chains: anchored filaments at rest, point loads on a
//! free end, and soft cross-links between chains. Passive force laws are
//! checked at hand-computed operating points.

use approx::assert_relative_eq;
use sarcosim::config::{ModelParameters, Options, TitinParameters};
use sarcosim::mechanics::forces;
use sarcosim::mechanics::EquilibriumSolver;

fn test_params() -> ModelParameters {
    let mut params = ModelParameters::default();
    params.thin.nodes_per_filament = 20;
    params.thick.crowns_per_filament = 12;
    params.titin.thin_attach_node = 15;
    params.titin.thick_attach_node = 11;
    params
}

// ============================================================================
// Bare-Lattice Equilibrium Tests
// ============================================================================

#[test]
fn test_rest_state_is_exact_fixed_point() {
    let params = test_params();
    let options = Options::default();
    let mut solver = EquilibriumSolver::new(&params, &options, 8, 4);
    let mut x = solver.rest_positions();

    let iterations = solver.solve(&mut x, |_, _| {});
    assert_eq!(
        iterations, 1,
        "an unloaded lattice at rest should converge on the first iteration"
    );
}

#[test]
fn test_bare_lattice_length_step_converges_within_two_iterations() {
    let params = test_params();
    let options = Options::default();
    let mut solver = EquilibriumSolver::new(&params, &options, 8, 4);
    let mut x = solver.rest_positions();

    solver.set_hs_length(1085.0);
    let iterations = solver.solve(&mut x, |_, _| {});
    assert!(
        iterations <= 2,
        "without coupling the tridiagonal solve is exact; took {} iterations",
        iterations
    );

    // Every thick chain rigidly follows the M-line
    for t in 0..4 {
        let offset = solver.thick_offset(t);
        assert_relative_eq!(x[offset], 1085.0 - 80.0, max_relative = 1e-9);
        assert_relative_eq!(
            x[offset + 11],
            1085.0 - 80.0 - 11.0 * 13.5,
            max_relative = 1e-9
        );
    }
}

#[test]
fn test_point_load_stretches_every_spring_equally() {
    let params = test_params();
    let options = Options::default();
    let mut solver = EquilibriumSolver::new(&params, &options, 1, 1);
    let mut x = solver.rest_positions();

    let force_pN = 40.0;
    let k = params.thin.backbone_stiffness_pN_per_nm;
    let spacing = params.thin.node_spacing_nm;
    solver.solve(&mut x, |_, rhs| rhs[19] += force_pN);

    for node in 0..20 {
        let expected = (node + 1) as f64 * (spacing + force_pN / k);
        assert_relative_eq!(x[node], expected, max_relative = 1e-6);
    }
}

#[test]
fn test_stiff_coupling_engages_damping_but_still_converges() {
    // A link stiffness comparable to the backbone makes the undamped
    // fixed-point map oscillate; the halving damping must rescue it.
    let params = test_params();
    let options = Options {
        x_solve_max_iterations: 500,
        ..Options::default()
    };
    let mut solver = EquilibriumSolver::new(&params, &options, 1, 1);
    let mut x = solver.rest_positions();

    let k_link = 1500.0;
    let thin_end = 19;
    let thick_start = solver.thick_offset(0);
    let iterations = solver.solve(&mut x, |x, rhs| {
        let force = k_link * (x[thick_start] - x[thin_end]);
        rhs[thin_end] += force;
        rhs[thick_start] -= force;
    });
    assert!(
        iterations < 500,
        "damped iteration failed to converge ({} iterations)",
        iterations
    );

    // Converged positions satisfy the coupled force balance at the link
    let k = params.thin.backbone_stiffness_pN_per_nm;
    let link_force = k_link * (x[thick_start] - x[thin_end]);
    let backbone_force = k * (x[thin_end] - x[thin_end - 1] - params.thin.node_spacing_nm);
    assert!(
        (backbone_force - link_force).abs() < 1.0,
        "residual {} pN at the link",
        backbone_force - link_force
    );
}

#[test]
fn test_iteration_cap_is_nonfatal() {
    let params = test_params();
    let options = Options {
        x_solve_max_iterations: 3,
        ..Options::default()
    };
    let mut solver = EquilibriumSolver::new(&params, &options, 1, 1);
    let mut x = solver.rest_positions();

    // An oscillatory stiff link cannot settle in 3 iterations
    let thin_end = 19;
    let thick_start = solver.thick_offset(0);
    let iterations = solver.solve(&mut x, |x, rhs| {
        let force = 1800.0 * (x[thick_start] - x[thin_end]);
        rhs[thin_end] += force;
        rhs[thick_start] -= force;
    });
    assert_eq!(iterations, 3, "cap should be reported, not panicked on");
    assert!(x.iter().all(|v| v.is_finite()));
}

// ============================================================================
// Passive Force Law Tests
// ============================================================================

#[test]
fn test_titin_piecewise_law_is_continuous_at_the_limit() {
    let params = TitinParameters {
        stiffness_pN_per_nm: 0.01,
        linear_limit_nm: 40.0,
        exp_amplitude_pN: 0.5,
        exp_length_nm: 20.0,
        ..TitinParameters::default()
    };
    let below = forces::titin_force_pN(&params, 40.0 - 1e-9);
    let above = forces::titin_force_pN(&params, 40.0 + 1e-9);
    assert!(
        (above - below).abs() < 1e-6,
        "force law jumps at the linear limit: {} vs {}",
        below,
        above
    );
}

#[test]
fn test_total_force_scaling_chain() {
    let params = ModelParameters::default();
    // 1 pN per thick filament through the default cross-section fractions
    let stress = forces::scale_filament_force(&params.force_scaling, 1.0);
    assert_relative_eq!(stress, 0.2035, max_relative = 1e-10);
}
