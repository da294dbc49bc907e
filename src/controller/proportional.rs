//! Plain proportional responder: `-(Kp * error)`, nothing remembered.

use super::{error_vector, negate, AxisGains, Controller, Gains, Vec3, AXES};
use crate::error::ControlError;
use crate::measurement::XyShift;
use crate::outlier::MeanFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct ProportionalController {
    kp: AxisGains,
}

impl ProportionalController {
    pub fn new(kp: impl Into<Gains>) -> Result<Self, ControlError> {
        Ok(Self {
            kp: AxisGains::try_from(&kp.into())?,
        })
    }

    pub fn kp(&self) -> Vec3 {
        self.kp.as_array()
    }
}

impl Controller for ProportionalController {
    fn set_kp(&mut self, kp: Gains) -> Result<(), ControlError> {
        self.kp.set(&kp)
    }

    fn set_ki(&mut self, _ki: Gains) -> Result<(), ControlError> {
        Ok(())
    }

    fn reset_xy(&mut self, _n_rois: usize) {}

    fn reset_z(&mut self) {}

    fn response(&mut self, _t: f64, xy_shifts: Option<&[XyShift]>, z_shift: f64) -> Vec3 {
        let error = error_vector(&MeanFilter, xy_shifts, z_shift);
        let mut out = [0.0; AXES];
        for axis in 0..AXES {
            out[axis] = error[axis] * self.kp[axis];
        }
        negate(out)
    }
}
