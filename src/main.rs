use std::process::ExitCode;

use drift_stabilizer::{
    load_config, run_simulated_session, DriftSimulator, SessionMetrics, StabilizerConfig,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/stabilizer.toml";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Using default configuration ({path}: {e})");
            StabilizerConfig::default()
        }
    };

    let mut controller = match cfg.controller.build() {
        Ok(controller) => controller,
        Err(e) => {
            tracing::error!("Invalid controller configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let metrics = match SessionMetrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    println!("===========================================");
    println!("Simulated drift stabilization ({})", cfg.controller.kind());
    println!("===========================================\n");

    let sim = &cfg.simulation;
    let mut simulator = DriftSimulator::from_config(sim);
    let summary = run_simulated_session(
        controller.as_mut(),
        &mut simulator,
        sim.cycles,
        sim.interval_s,
        Some(&metrics),
    );

    // Same drift, no correction applied
    let mut baseline = DriftSimulator::from_config(sim);
    let mut uncorrected = [0.0; 3];
    for k in 0..sim.cycles {
        baseline.generate(k as f64 * sim.interval_s);
        for (acc, r) in uncorrected.iter_mut().zip(baseline.true_residual()) {
            *acc += r.abs() / sim.cycles.max(1) as f64;
        }
    }

    let report = metrics.report();
    println!("Cycles: {} ({} with degraded input)", report.cycles, report.degraded_cycles);
    println!(
        "Mean |residual| nm  X: {:.3}  Y: {:.3}  Z: {:.3}",
        summary.mean_abs_residual[0], summary.mean_abs_residual[1], summary.mean_abs_residual[2]
    );
    println!(
        "Uncorrected     nm  X: {:.3}  Y: {:.3}  Z: {:.3}",
        uncorrected[0], uncorrected[1], uncorrected[2]
    );
    println!(
        "XY residual P50: {:.3} nm, P99: {:.3} nm",
        report.residual_xy_p50_nm, report.residual_xy_p99_nm
    );
    println!(
        "Z residual  P50: {:.3} nm, P99: {:.3} nm",
        report.residual_z_p50_nm, report.residual_z_p99_nm
    );
    println!("Response P50: {:?}, P99: {:?}", report.response_p50, report.response_p99);

    ExitCode::SUCCESS
}
