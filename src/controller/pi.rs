//! Proportional-integral control with elapsed-time integration.
//!
//! The sampling loop upstream does not run at a fixed cadence, so the
//! integral accumulates `error * elapsed` rather than `error` per call.
//! Timestamps are expected to be non-decreasing per axis.

use super::{error_vector, negate, AxisGains, Controller, Gains, Vec3, AXES, X, Y, Z};
use crate::error::ControlError;
use crate::measurement::XyShift;
use crate::outlier::{MadFilter, MeanFilter, OutlierFilter, SdFilter};

/// Longest elapsed time credited to a single integration step, in seconds.
///
/// Bounds integral wind-up after the process was suspended.
pub const MAX_STEP_S: f64 = 1.0;

// ============================================================================
// PI CORE - Per-axis integral state
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PiCore {
    kp: AxisGains,
    ki: AxisGains,
    cumulative_error: Vec3,
    /// `None` until the axis has seen its first sample.
    last_sample_time: [Option<f64>; AXES],
}

impl PiCore {
    pub fn new(kp: &Gains, ki: &Gains) -> Result<Self, ControlError> {
        Ok(Self {
            kp: AxisGains::try_from(kp)?,
            ki: AxisGains::try_from(ki)?,
            cumulative_error: [0.0; AXES],
            last_sample_time: [None; AXES],
        })
    }

    pub fn kp(&self) -> Vec3 {
        self.kp.as_array()
    }

    pub fn ki(&self) -> Vec3 {
        self.ki.as_array()
    }

    pub fn set_kp(&mut self, kp: &Gains) -> Result<(), ControlError> {
        self.kp.set(kp)
    }

    pub fn set_ki(&mut self, ki: &Gains) -> Result<(), ControlError> {
        self.ki.set(ki)
    }

    pub fn cumulative_error(&self) -> Vec3 {
        self.cumulative_error
    }

    pub fn last_sample_time(&self) -> [Option<f64>; AXES] {
        self.last_sample_time
    }

    /// Zero the accumulator and forget the last timestamp of `axes`.
    pub fn reset_axes(&mut self, axes: &[usize]) {
        for &axis in axes {
            self.cumulative_error[axis] = 0.0;
            self.last_sample_time[axis] = None;
        }
    }

    /// Accumulate `error` up to time `t`; returns the elapsed time credited
    /// to each axis (0 on an axis's first sample).
    pub fn integrate(&mut self, t: f64, error: &Vec3) -> Vec3 {
        let mut delta_t = [0.0; AXES];
        for axis in 0..AXES {
            let last = *self.last_sample_time[axis].get_or_insert(t);
            delta_t[axis] = (t - last).clamp(0.0, MAX_STEP_S);
            self.cumulative_error[axis] += error[axis] * delta_t[axis];
            self.last_sample_time[axis] = Some(t);
        }
        delta_t
    }

    /// `Kp * e + Ki * cumulative`, before the sign flip.
    pub fn law(&self, error: &Vec3) -> Vec3 {
        let mut out = [0.0; AXES];
        for axis in 0..AXES {
            out[axis] = error[axis] * self.kp[axis] + self.ki[axis] * self.cumulative_error[axis];
        }
        out
    }

    /// Full control step: integrate, then return the negated PI law.
    pub fn step(&mut self, t: f64, error: &Vec3) -> Vec3 {
        self.integrate(t, error);
        negate(self.law(error))
    }
}

// ============================================================================
// PI CONTROLLER - PI core behind an outlier policy
// ============================================================================

pub struct PiController<F = MeanFilter> {
    core: PiCore,
    filter: F,
    n_rois: usize,
}

/// PI control over markers trimmed by iterative standard deviation.
pub type RejectPiControllerSd = PiController<SdFilter>;

/// PI control over markers trimmed by median absolute deviation.
pub type RejectPiControllerMad = PiController<MadFilter>;

impl PiController<MeanFilter> {
    pub fn new(kp: impl Into<Gains>, ki: impl Into<Gains>) -> Result<Self, ControlError> {
        Self::with_filter(kp, ki, MeanFilter)
    }
}

impl PiController<SdFilter> {
    pub fn with_sd_rejection(
        kp: impl Into<Gains>,
        ki: impl Into<Gains>,
        threshold: f64,
    ) -> Result<Self, ControlError> {
        Self::with_filter(kp, ki, SdFilter::new(threshold)?)
    }
}

impl PiController<MadFilter> {
    pub fn with_mad_rejection(
        kp: impl Into<Gains>,
        ki: impl Into<Gains>,
        threshold: f64,
    ) -> Result<Self, ControlError> {
        Self::with_filter(kp, ki, MadFilter::new(threshold)?)
    }
}

impl<F: OutlierFilter> PiController<F> {
    pub fn with_filter(
        kp: impl Into<Gains>,
        ki: impl Into<Gains>,
        filter: F,
    ) -> Result<Self, ControlError> {
        Ok(Self {
            core: PiCore::new(&kp.into(), &ki.into())?,
            filter,
            n_rois: 0,
        })
    }

    pub fn core(&self) -> &PiCore {
        &self.core
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Markers announced by the last `reset_xy`.
    pub fn n_rois(&self) -> usize {
        self.n_rois
    }
}

impl<F: OutlierFilter> Controller for PiController<F> {
    fn set_kp(&mut self, kp: Gains) -> Result<(), ControlError> {
        self.core.set_kp(&kp)?;
        tracing::debug!(kp = ?self.core.kp(), "Kp updated");
        Ok(())
    }

    fn set_ki(&mut self, ki: Gains) -> Result<(), ControlError> {
        self.core.set_ki(&ki)?;
        tracing::debug!(ki = ?self.core.ki(), "Ki updated");
        Ok(())
    }

    fn reset_xy(&mut self, n_rois: usize) {
        self.n_rois = n_rois;
        self.core.reset_axes(&[X, Y]);
        tracing::debug!(n_rois, "PI controller XY reset");
    }

    fn reset_z(&mut self) {
        self.core.reset_axes(&[Z]);
        tracing::debug!("PI controller Z reset");
    }

    fn response(&mut self, t: f64, xy_shifts: Option<&[XyShift]>, z_shift: f64) -> Vec3 {
        let error = error_vector(&self.filter, xy_shifts, z_shift);
        self.core.step(t, &error)
    }
}
