//! SarcoSim - Entry point
//!
//! Spatially explicit half-sarcomere simulation engine.
//!
//! CLI Usage:
//!   cargo run                              # Run the default activation protocol
//!   cargo run -- --diagnose                # Run engine diagnostics
//!   cargo run -- -m model.json -p prot.json  # Custom model and protocol

use std::time::Instant;

use anyhow::Result;
use sarcosim::{
    config::{ControlMode, ModelParameters, Options, Protocol},
    Myofibril,
};

/// Run engine diagnostics: build a small lattice, activate it, and sanity
/// check convergence and occupancies.
fn run_diagnostics(n_steps: usize) -> Result<()> {
    println!("=== SarcoSim - Engine Diagnostics ===\n");

    let params = ModelParameters::default();
    let options = Options::default();
    println!("Thick filaments: {}", params.lattice.thick_filament_count);
    println!(
        "Crowns per filament: {}, heads per crown: {}",
        params.thick.crowns_per_filament, params.thick.cbs_per_crown
    );
    println!(
        "Thin nodes per filament: {} ({} strands)",
        params.thin.nodes_per_filament, params.thin.strands_per_filament
    );

    let mut myofibril = Myofibril::new(0, 1, &params, &options, None)?;
    println!(
        "Initial half-sarcomere length: {:.1} nm",
        myofibril.half_sarcomere(0).hs_length_nm()
    );
    println!("Initial force: {:.4} kN/m²", myofibril.force_kN_per_m2());

    println!("\n--- Activating at pCa 4.5 for {} ms ---\n", n_steps);
    let protocol = Protocol::length_hold(n_steps, 1e-3, 4.5);

    let start_time = Instant::now();
    let mut max_x_iterations = 0;
    for (step_idx, step) in protocol.steps.iter().enumerate() {
        myofibril.step(step);
        let metrics = myofibril.half_sarcomere(0).metrics();
        max_x_iterations = max_x_iterations.max(metrics.x_solve_iterations);

        if n_steps >= 10 && step_idx % (n_steps / 10) == 0 {
            println!(
                "  {:3.0}%: t={:4} ms, force={:8.3} kN/m², sites on={:.3}, attached={:.3}",
                (step_idx as f64 / n_steps as f64) * 100.0,
                step_idx,
                metrics.force_kN_per_m2,
                metrics.site_occupancy[1],
                metrics.cb_occupancy.last().copied().unwrap_or(0.0)
            );
        }
    }
    let elapsed = start_time.elapsed();

    let metrics = myofibril.half_sarcomere(0).metrics();
    println!("\n=== Results ===");
    println!("Elapsed time: {:.2?}", elapsed);
    println!(
        "Steps per second: {:.0}",
        n_steps as f64 / elapsed.as_secs_f64()
    );
    println!("Final force: {:.3} kN/m²", metrics.force_kN_per_m2);
    println!("Titin force: {:.4} kN/m²", metrics.titin_force_kN_per_m2);
    println!(
        "Extracellular force: {:.4} kN/m²",
        metrics.extracellular_force_kN_per_m2
    );
    println!("Site occupancy [off, on]: {:?}", metrics.site_occupancy);
    println!("Cross-bridge occupancy: {:?}", metrics.cb_occupancy);
    println!("MyBP-C occupancy: {:?}", metrics.accessory_occupancy);
    println!("Worst equilibrium iteration count: {}", max_x_iterations);

    println!("\n=== Diagnostic Checks ===");
    let occupancy_sum: f64 = metrics.cb_occupancy.iter().sum();
    if (occupancy_sum - 1.0).abs() > 1e-9 {
        println!("⚠️  WARNING: cross-bridge occupancies sum to {}", occupancy_sum);
    } else {
        println!("✓ Occupancy proportions sum to 1");
    }
    if metrics.site_occupancy[1] < 0.5 {
        println!("⚠️  WARNING: few sites switched on at saturating calcium");
    } else {
        println!("✓ Thin filament activated");
    }
    if max_x_iterations >= options.x_solve_max_iterations {
        println!("⚠️  WARNING: equilibrium solver hit its iteration cap");
    } else {
        println!("✓ Equilibrium solves converged");
    }
    if metrics.rescale_warned {
        println!("⚠️  WARNING: probability vector rescaling occurred (timestep too coarse?)");
    } else {
        println!("✓ No probability rescaling needed");
    }

    Ok(())
}

/// Parse CLI arguments
#[allow(clippy::type_complexity)]
fn parse_args() -> (bool, usize, usize, String, String, String) {
    let args: Vec<String> = std::env::args().collect();
    let mut diagnose = false;
    let mut steps = 500;
    let mut n_half_sarcomeres = 1;
    let mut model_path = String::from("model.json");
    let mut options_path = String::from("options.json");
    let mut protocol_path = String::from("protocol.json");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--diagnose" | "-d" => diagnose = true,
            "-n" | "--steps" => {
                i += 1;
                if i < args.len() {
                    steps = args[i].parse().unwrap_or(500);
                }
            }
            "-s" | "--half-sarcomeres" => {
                i += 1;
                if i < args.len() {
                    n_half_sarcomeres = args[i].parse().unwrap_or(1);
                }
            }
            "-m" | "--model" => {
                i += 1;
                if i < args.len() {
                    model_path = args[i].clone();
                }
            }
            "-o" | "--options" => {
                i += 1;
                if i < args.len() {
                    options_path = args[i].clone();
                }
            }
            "-p" | "--protocol" => {
                i += 1;
                if i < args.len() {
                    protocol_path = args[i].clone();
                }
            }
            "--help" | "-h" => {
                println!("SarcoSim");
                println!();
                println!("Usage: sarcosim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --diagnose, -d           Run engine diagnostics");
                println!("  -n, --steps N            Diagnostic step count (default: 500)");
                println!("  -s, --half-sarcomeres N  Half-sarcomeres in series (default: 1)");
                println!("  -m, --model PATH         Model parameters JSON (default: model.json)");
                println!("  -o, --options PATH       Solver options JSON (default: options.json)");
                println!("  -p, --protocol PATH      Protocol JSON (default: protocol.json)");
                println!("  --help, -h               Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    (
        diagnose,
        steps,
        n_half_sarcomeres,
        model_path,
        options_path,
        protocol_path,
    )
}

fn main() -> Result<()> {
    env_logger::init();

    let (diagnose, steps, n_half_sarcomeres, model_path, options_path, protocol_path) =
        parse_args();

    if diagnose {
        return run_diagnostics(steps);
    }

    log::info!("SarcoSim starting...");

    let params = ModelParameters::load_or_default(&model_path);
    let options = Options::load_or_default(&options_path);
    let protocol = Protocol::load_or_default(&protocol_path);
    log::info!(
        "{} half-sarcomere(s), {} protocol steps ({:.3} s simulated)",
        n_half_sarcomeres,
        protocol.steps.len(),
        protocol.duration_sec()
    );

    let mut myofibril = Myofibril::new(0, n_half_sarcomeres, &params, &options, None)?;

    println!(
        "{:>10} {:>8} {:>12} {:>12} {:>10} {:>10}",
        "time_s", "pCa", "length_nm", "force_kNm2", "sites_on", "attached"
    );

    let mut time_sec = 0.0;
    for step in &protocol.steps {
        myofibril.step(step);
        time_sec += step.dt_sec;

        let metrics = myofibril.half_sarcomere(0).metrics();
        let mode = match step.control {
            ControlMode::Length => "",
            ControlMode::Force { .. } => "*",
        };
        println!(
            "{:>10.4} {:>8.2} {:>12.2} {:>12.4} {:>10.4} {:>10.4}{}",
            time_sec,
            step.pca,
            metrics.hs_length_nm,
            metrics.force_kN_per_m2,
            metrics.site_occupancy[1],
            metrics.cb_occupancy.last().copied().unwrap_or(0.0),
            mode
        );
    }

    log::info!("Run complete: {:.4} s simulated", time_sec);
    Ok(())
}
