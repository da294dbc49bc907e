//! Closed-loop replay of a controller against the drift simulator.
//!
//! Every cycle the controller sees the simulated measurement and its
//! response is applied to the simulated stage.

use std::time::Instant;

use crate::controller::{Controller, Vec3, AXES};
use crate::measurement::generator::DriftSimulator;
use crate::metrics::SessionMetrics;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub cycles: usize,
    /// Mean absolute noiseless residual per axis, in nanometers.
    pub mean_abs_residual: Vec3,
    pub last_response: Vec3,
}

/// Drive `controller` for `cycles` cycles at `t = k * interval_s`.
///
/// Both reset hooks are called first, as when a tracking session starts.
pub fn run_simulated_session(
    controller: &mut dyn Controller,
    simulator: &mut DriftSimulator,
    cycles: usize,
    interval_s: f64,
    metrics: Option<&SessionMetrics>,
) -> SessionSummary {
    let span = tracing::info_span!("session", cycles, interval_s);
    let _enter = span.enter();

    controller.reset_xy(simulator.markers);
    controller.reset_z();

    let mut residual_sum = [0.0; AXES];
    let mut last_response = [0.0; AXES];

    for k in 0..cycles {
        let t = k as f64 * interval_s;
        let measurement = simulator.generate(t);
        let residual = simulator.true_residual();

        let start = Instant::now();
        let response = controller.response(measurement.t, measurement.xy(), measurement.z_shift);
        let elapsed = start.elapsed();

        if let Some(metrics) = metrics {
            metrics.record_response(elapsed);
            metrics.record_residual(residual);
            if measurement.is_degraded() {
                metrics.record_degraded_input();
            }
        }

        for axis in 0..AXES {
            residual_sum[axis] += residual[axis].abs();
        }
        simulator.apply_correction(response);
        last_response = response;

        if measurement.sequence_id % 50 == 0 {
            tracing::debug!(
                cycle = measurement.sequence_id,
                t,
                ?residual,
                ?response,
                "cycle processed"
            );
        }
    }

    let mean_abs_residual = if cycles > 0 {
        residual_sum.map(|s| s / cycles as f64)
    } else {
        [0.0; AXES]
    };
    tracing::info!(?mean_abs_residual, "session finished");

    SessionSummary {
        cycles,
        mean_abs_residual,
        last_response,
    }
}
