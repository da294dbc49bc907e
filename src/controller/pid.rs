//! PID control: the PI core plus a derivative averaged over recent cycles.

use std::collections::VecDeque;

use super::{error_vector, negate, AxisGains, Controller, Gains, PiCore, Vec3, AXES, X, Y, Z};
use crate::error::ControlError;
use crate::measurement::XyShift;
use crate::outlier::MeanFilter;

pub const DEFAULT_DERIV_POINTS: usize = 10;

// ============================================================================
// DERIVATIVE WINDOW - Fixed-length history of per-axis derivatives
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct DerivativeWindow {
    window: usize,
    samples: VecDeque<Vec3>,
}

impl DerivativeWindow {
    fn new(window: usize) -> Self {
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    fn push(&mut self, derivative: Vec3) {
        self.samples.push_back(derivative);
        if self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    /// NaN-aware sum over the window divided by its full length.
    fn average(&self) -> Vec3 {
        let mut sum = [0.0; AXES];
        for sample in &self.samples {
            for axis in 0..AXES {
                if !sample[axis].is_nan() {
                    sum[axis] += sample[axis];
                }
            }
        }
        sum.map(|s| s / self.window as f64)
    }

    fn clear_axes(&mut self, axes: &[usize]) {
        for sample in self.samples.iter_mut() {
            for &axis in axes {
                sample[axis] = f64::NAN;
            }
        }
    }
}

// ============================================================================
// PID CONTROLLER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    core: PiCore,
    kd: AxisGains,
    last_error: Vec3,
    derivatives: DerivativeWindow,
}

impl PidController {
    pub fn new(
        kp: impl Into<Gains>,
        ki: impl Into<Gains>,
        kd: impl Into<Gains>,
        deriv_points: usize,
    ) -> Result<Self, ControlError> {
        if deriv_points == 0 {
            return Err(ControlError::InvalidParameter {
                name: "deriv_points",
                value: 0.0,
            });
        }
        Ok(Self {
            core: PiCore::new(&kp.into(), &ki.into())?,
            kd: AxisGains::try_from(&kd.into())?,
            last_error: [0.0; AXES],
            derivatives: DerivativeWindow::new(deriv_points),
        })
    }

    pub fn core(&self) -> &PiCore {
        &self.core
    }

    pub fn kd(&self) -> Vec3 {
        self.kd.as_array()
    }

    pub fn set_kd(&mut self, kd: Gains) -> Result<(), ControlError> {
        self.kd.set(&kd)
    }

    /// Current averaged derivative estimate.
    pub fn derivative(&self) -> Vec3 {
        self.derivatives.average()
    }

    fn reset_axes(&mut self, axes: &[usize]) {
        self.core.reset_axes(axes);
        self.derivatives.clear_axes(axes);
        for &axis in axes {
            self.last_error[axis] = 0.0;
        }
    }
}

impl Controller for PidController {
    fn set_kp(&mut self, kp: Gains) -> Result<(), ControlError> {
        self.core.set_kp(&kp)
    }

    fn set_ki(&mut self, ki: Gains) -> Result<(), ControlError> {
        self.core.set_ki(&ki)
    }

    fn reset_xy(&mut self, n_rois: usize) {
        self.reset_axes(&[X, Y]);
        tracing::debug!(n_rois, "PID controller XY reset");
    }

    fn reset_z(&mut self) {
        self.reset_axes(&[Z]);
        tracing::debug!("PID controller Z reset");
    }

    fn response(&mut self, t: f64, xy_shifts: Option<&[XyShift]>, z_shift: f64) -> Vec3 {
        let error = error_vector(&MeanFilter, xy_shifts, z_shift);
        let delta_t = self.core.integrate(t, &error);

        let mut instantaneous = [f64::NAN; AXES];
        for axis in 0..AXES {
            if delta_t[axis] > 0.0 {
                instantaneous[axis] = (error[axis] - self.last_error[axis]) / delta_t[axis];
            }
        }
        self.derivatives.push(instantaneous);
        self.last_error = error;

        let derivative = self.derivatives.average();
        let mut out = self.core.law(&error);
        for axis in 0..AXES {
            out[axis] += self.kd[axis] * derivative[axis];
        }
        negate(out)
    }
}
