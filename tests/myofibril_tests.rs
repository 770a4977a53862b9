//! Validation tests for serial force-balance coordination.
//!
//! Covers length sharing across members, the series elastic element, force
//! holds, activation of the whole chain, and the requirement that worker-pool
//! execution reproduces the single-threaded run exactly.

use approx::assert_relative_eq;
use sarcosim::config::{ControlMode, ModelParameters, Options, Protocol, ProtocolStep};
use sarcosim::{Myofibril, SeriesElastic};

/// Reduced lattice with realistic filament overlap at a 500 nm length.
fn test_params() -> ModelParameters {
    let mut params = ModelParameters::default();
    params.lattice.initial_hs_length_nm = 500.0;
    params.thin.nodes_per_filament = 30;
    params.thick.crowns_per_filament = 20;
    params.titin.thin_attach_node = 20;
    params.titin.thick_attach_node = 19;
    params.accessory.first_crown = 4;
    params.accessory.molecules_per_filament = 5;
    params
}

fn length_step(delta_hsl_nm: f64, pca: f64) -> ProtocolStep {
    ProtocolStep {
        dt_sec: 1e-3,
        delta_hsl_nm,
        control: ControlMode::Length,
        pca,
    }
}

// ============================================================================
// Length Sharing Tests
// ============================================================================

#[test]
fn test_passive_stretch_is_shared_between_members() {
    let params = test_params();
    let mut myofibril = Myofibril::new(0, 4, &params, &Options::default(), None).unwrap();
    let initial = myofibril.half_sarcomere(0).hs_length_nm();

    // 1 nm per member per step for 10 steps
    for _ in 0..10 {
        myofibril.step(&length_step(1.0, 9.0));
    }

    assert_relative_eq!(
        myofibril.total_length_nm(),
        4.0 * (initial + 10.0),
        epsilon = 1e-9
    );
    for i in 0..4 {
        assert_relative_eq!(
            myofibril.half_sarcomere(i).hs_length_nm(),
            initial + 10.0,
            epsilon = 2.0
        );
    }
}

#[test]
fn test_hold_after_stretch_keeps_members_balanced() {
    let params = test_params();
    let mut myofibril = Myofibril::new(0, 3, &params, &Options::default(), None).unwrap();

    for _ in 0..5 {
        myofibril.step(&length_step(2.0, 9.0));
    }
    let total = myofibril.total_length_nm();
    for _ in 0..10 {
        myofibril.step(&length_step(0.0, 9.0));
    }

    assert_relative_eq!(myofibril.total_length_nm(), total, epsilon = 1e-9);
    // The per-member force-control tolerance maps to a few nm of length slack
    let member_total: f64 = (0..3)
        .map(|i| myofibril.half_sarcomere(i).hs_length_nm())
        .sum();
    assert_relative_eq!(member_total, total, epsilon = 10.0);
}

// ============================================================================
// Series Elastic Tests
// ============================================================================

#[test]
fn test_series_element_takes_part_of_the_stretch() {
    let params = test_params();
    let series = SeriesElastic {
        stiffness_kN_per_m2_per_nm: 0.002,
        ..SeriesElastic::default()
    };
    let mut myofibril =
        Myofibril::new(0, 2, &params, &Options::default(), Some(series.clone())).unwrap();

    // Stretch well past the resting balance point
    for _ in 0..20 {
        myofibril.step(&length_step(3.0, 9.0));
    }

    let extension = myofibril.series_extension_nm();
    assert!(
        extension > 0.0,
        "a compliant series element should absorb part of a stretch, got {}",
        extension
    );
    // The balanced force is carried by the series element
    assert!(
        (series.force_kN_per_m2(extension) - myofibril.force_kN_per_m2()).abs() < 0.1,
        "series force {} vs chain force {}",
        series.force_kN_per_m2(extension),
        myofibril.force_kN_per_m2()
    );
}

// ============================================================================
// Force Hold Tests
// ============================================================================

#[test]
fn test_force_hold_brings_every_member_to_target() {
    let params = test_params();
    let options = Options::default();
    let mut myofibril = Myofibril::new(0, 3, &params, &options, None).unwrap();

    // Probe the passive operating point, then ask for slightly more force
    myofibril.step(&length_step(0.0, 9.0));
    let target = myofibril.force_kN_per_m2() + 0.2;

    let protocol = Protocol::force_hold(5, 1e-3, 9.0, target);
    for step in &protocol.steps {
        let evaluations = myofibril.step(step);
        assert_eq!(evaluations, 1, "force control needs no outer iteration");
    }

    for i in 0..3 {
        assert!(
            (myofibril.half_sarcomere(i).force_kN_per_m2() - target).abs()
                < 10.0 * options.force_control_tolerance_kN_per_m2,
            "member {} force {} vs target {}",
            i,
            myofibril.half_sarcomere(i).force_kN_per_m2(),
            target
        );
    }
    assert!((myofibril.force_kN_per_m2() - target).abs() < 0.1);
}

// ============================================================================
// Activation Tests
// ============================================================================

#[test]
fn test_activation_raises_chain_force() {
    let params = test_params();
    let mut myofibril = Myofibril::new(0, 2, &params, &Options::default(), None).unwrap();

    for _ in 0..20 {
        myofibril.step(&length_step(0.0, 9.0));
    }
    let passive = myofibril.force_kN_per_m2();

    for _ in 0..80 {
        myofibril.step(&length_step(0.0, 4.5));
    }
    assert!(
        myofibril.force_kN_per_m2() > passive,
        "calcium activation should raise force ({} -> {})",
        passive,
        myofibril.force_kN_per_m2()
    );
}

#[test]
fn test_slowed_member_lags_its_neighbors() {
    let mut params = test_params();
    // Member 2 runs its myosin scheme at 1% speed
    params.rate_variation = vec![1.0, 1.0, 0.01];
    let mut myofibril = Myofibril::new(0, 3, &params, &Options::default(), None).unwrap();

    for _ in 0..40 {
        myofibril.step(&length_step(0.0, 4.5));
    }

    let metrics = myofibril.metrics();
    assert!(
        metrics[2].cb_occupancy[0] > metrics[0].cb_occupancy[0],
        "slowed member should keep more heads parked ({} vs {})",
        metrics[2].cb_occupancy[0],
        metrics[0].cb_occupancy[0]
    );
}

// ============================================================================
// Worker Pool Determinism Tests
// ============================================================================

#[test]
fn test_worker_pool_reproduces_the_single_threaded_run() {
    let params = test_params();
    let serial_options = Options {
        seed: 42,
        ..Options::default()
    };
    let pooled_options = Options {
        seed: 42,
        multithreading: true,
        ..Options::default()
    };

    let mut serial = Myofibril::new(0, 3, &params, &serial_options, None).unwrap();
    let mut pooled = Myofibril::new(0, 3, &params, &pooled_options, None).unwrap();

    for _ in 0..40 {
        serial.step(&length_step(0.0, 4.5));
        pooled.step(&length_step(0.0, 4.5));
    }

    // Each member owns its random stream, so scheduling may not change any
    // draw sequence or any arithmetic
    assert_eq!(serial.force_kN_per_m2(), pooled.force_kN_per_m2());
    for (a, b) in serial.metrics().iter().zip(pooled.metrics().iter()) {
        assert_eq!(a.hs_length_nm, b.hs_length_nm);
        assert_eq!(a.cb_occupancy, b.cb_occupancy);
        assert_eq!(a.site_occupancy, b.site_occupancy);
    }
}

#[test]
fn test_different_muscle_ids_decorrelate() {
    let params = test_params();
    let options = Options {
        seed: 7,
        ..Options::default()
    };
    let mut a = Myofibril::new(0, 2, &params, &options, None).unwrap();
    let mut b = Myofibril::new(1, 2, &params, &options, None).unwrap();

    for _ in 0..40 {
        a.step(&length_step(0.0, 4.5));
        b.step(&length_step(0.0, 4.5));
    }
    assert_ne!(
        a.metrics()[0].cb_occupancy,
        b.metrics()[0].cb_occupancy,
        "muscle id enters the stream derivation, so microstates should differ"
    );
}
