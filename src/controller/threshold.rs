//! Threshold-switched proportional control with output saturation.
//!
//! No integral term: far from the reference the stage is driven with an
//! elevated gain, and no single correction may exceed `max_shift`.

use super::{error_vector, AxisGains, Controller, Gains, Vec3, AXES};
use crate::error::ControlError;
use crate::measurement::XyShift;
use crate::outlier::MeanFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdController {
    kp: AxisGains,
    threshold_distance: f64,
    kp_above: f64,
    max_shift: f64,
}

impl ThresholdController {
    /// Nominal `Kp` starts at 1.0 on every axis.
    pub fn new(threshold_distance: f64, kp_above: f64, max_shift: f64) -> Result<Self, ControlError> {
        if !(threshold_distance.is_finite() && threshold_distance >= 0.0) {
            return Err(ControlError::InvalidParameter {
                name: "threshold_distance",
                value: threshold_distance,
            });
        }
        if !kp_above.is_finite() {
            return Err(ControlError::InvalidParameter {
                name: "kp_above",
                value: kp_above,
            });
        }
        if max_shift.is_nan() || max_shift <= 0.0 {
            return Err(ControlError::InvalidParameter {
                name: "max_shift",
                value: max_shift,
            });
        }
        Ok(Self {
            kp: AxisGains::splat(1.0),
            threshold_distance,
            kp_above,
            max_shift,
        })
    }

    pub fn kp(&self) -> Vec3 {
        self.kp.as_array()
    }

    /// Gain in effect for an axis error of `error`.
    pub fn gain_for(&self, axis: usize, error: f64) -> f64 {
        if error.abs() >= self.threshold_distance {
            self.kp_above
        } else {
            self.kp[axis]
        }
    }

    fn saturate(&self, raw: f64) -> f64 {
        if raw.is_nan() {
            // inf * 0
            0.0
        } else if raw.abs() >= self.max_shift {
            raw.signum() * self.max_shift
        } else {
            raw
        }
    }

    /// Saturated response to an already conditioned error vector.
    pub fn law(&self, error: &Vec3) -> Vec3 {
        let mut out = [0.0; AXES];
        for axis in 0..AXES {
            let raw = error[axis] * self.gain_for(axis, error[axis]);
            out[axis] = -self.saturate(raw);
        }
        out
    }
}

impl Controller for ThresholdController {
    fn set_kp(&mut self, kp: Gains) -> Result<(), ControlError> {
        self.kp.set(&kp)
    }

    fn set_ki(&mut self, _ki: Gains) -> Result<(), ControlError> {
        Ok(())
    }

    fn reset_xy(&mut self, _n_rois: usize) {}

    fn reset_z(&mut self) {}

    fn response(&mut self, _t: f64, xy_shifts: Option<&[XyShift]>, z_shift: f64) -> Vec3 {
        self.law(&error_vector(&MeanFilter, xy_shifts, z_shift))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_switches_at_the_threshold() {
        let ctl = ThresholdController::new(10.0, 3.0, 1000.0).unwrap();
        assert_eq!(ctl.gain_for(0, 10.0), 3.0);
        assert_eq!(ctl.gain_for(0, -10.0), 3.0);
        assert_eq!(ctl.gain_for(0, 9.9), 1.0);
    }

    #[test]
    fn saturation_is_symmetric() {
        let ctl = ThresholdController::new(10.0, 3.0, 20.0).unwrap();
        assert_eq!(ctl.law(&[50.0, -50.0, 5.0]), [-20.0, 20.0, -5.0]);
    }

    #[test]
    fn infinite_error_with_zero_gain_is_not_nan() {
        let mut ctl = ThresholdController::new(10.0, 0.0, 25.0).unwrap();
        assert_eq!(ctl.response(0.0, None, f64::INFINITY), [0.0; 3]);
    }

    #[test]
    fn rejects_unusable_parameters() {
        assert!(ThresholdController::new(-1.0, 2.0, 10.0).is_err());
        assert!(ThresholdController::new(1.0, f64::NAN, 10.0).is_err());
        assert!(ThresholdController::new(1.0, 2.0, 0.0).is_err());
        assert!(ThresholdController::new(1.0, 2.0, f64::NAN).is_err());
    }
}
