//! Seeded mock of the upstream tracker: drifting stage, noisy markers.

use std::f64::consts::{E, PI, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Measurement, XyShift};
use crate::config::SimulationConfig;
use crate::controller::Vec3;

const X_PERIOD_S: f64 = 4.0;
const Y_PERIOD_S: f64 = 4.0 * E;
const Z_PERIOD_S: f64 = 4.0 * PI;

/// `gen_bool` panics outside [0, 1]; NaN disables the event.
fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

pub struct DriftSimulator {
    rng: StdRng,
    sequence_counter: u64,
    stage: Vec3,
    last_t: f64,
    pub markers: usize,
    pub drift_amplitude: f64,
    pub noise_amplitude: f64,
    pub outlier_probability: f64,
    pub outlier_magnitude: f64,
    pub dropout_probability: f64,
}

impl DriftSimulator {
    pub fn new(seed: u64) -> Self {
        Self::from_config(&SimulationConfig {
            seed,
            ..SimulationConfig::default()
        })
    }

    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            sequence_counter: 0,
            stage: [0.0; 3],
            last_t: 0.0,
            markers: cfg.markers,
            drift_amplitude: cfg.drift_amplitude_nm,
            noise_amplitude: cfg.noise_nm,
            outlier_probability: probability(cfg.outlier_probability),
            outlier_magnitude: cfg.outlier_magnitude_nm,
            dropout_probability: probability(cfg.dropout_probability),
        }
    }

    /// Specimen drift at time `t`, before any stage correction.
    pub fn drift_at(&self, t: f64) -> Vec3 {
        let a = self.drift_amplitude;
        let z_phase = t / Z_PERIOD_S;
        [
            a * (t / X_PERIOD_S * TAU).sin(),
            a * (t / Y_PERIOD_S * TAU).sin(),
            // triangle wave
            a * (2.0 * (2.0 * (z_phase - (z_phase + 0.5).floor())).abs() - 1.0),
        ]
    }

    /// Noiseless displacement left over at the last generated timestamp.
    pub fn true_residual(&self) -> Vec3 {
        let drift = self.drift_at(self.last_t);
        [
            drift[0] + self.stage[0],
            drift[1] + self.stage[1],
            drift[2] + self.stage[2],
        ]
    }

    pub fn generate(&mut self, t: f64) -> Measurement {
        self.sequence_counter += 1;
        self.last_t = t;
        let residual = self.true_residual();

        let mut xy_shifts: Vec<XyShift> = Vec::with_capacity(self.markers);
        for _ in 0..self.markers {
            let mut x = residual[0] + self.noise();
            let mut y = residual[1] + self.noise();
            if self.rng.gen_bool(self.outlier_probability) {
                x += self.signed_outlier();
                y += self.signed_outlier();
            }
            if self.rng.gen_bool(self.dropout_probability) {
                x = f64::NAN;
            }
            if self.rng.gen_bool(self.dropout_probability) {
                y = f64::NAN;
            }
            xy_shifts.push((x, y));
        }

        let mut z_shift = residual[2] + self.noise();
        if self.rng.gen_bool(self.dropout_probability) {
            z_shift = f64::NAN;
        }

        Measurement {
            t,
            xy_shifts: if xy_shifts.is_empty() { None } else { Some(xy_shifts) },
            z_shift,
            sequence_id: self.sequence_counter,
        }
    }

    /// Move the simulated stage by a controller response.
    pub fn apply_correction(&mut self, correction: Vec3) {
        for (stage, c) in self.stage.iter_mut().zip(correction) {
            *stage += c;
        }
    }

    pub fn inject_disturbance(&mut self, dx: f64, dy: f64, dz: f64) {
        self.apply_correction([dx, dy, dz]);
    }

    pub fn get_sequence(&self) -> u64 {
        self.sequence_counter
    }

    fn noise(&mut self) -> f64 {
        (self.rng.gen::<f64>() - 0.5) * self.noise_amplitude
    }

    fn signed_outlier(&mut self) -> f64 {
        if self.rng.gen_bool(0.5) {
            self.outlier_magnitude
        } else {
            -self.outlier_magnitude
        }
    }
}
