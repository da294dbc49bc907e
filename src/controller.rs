//! Controller module - Capability contract shared by every control law
//!
//! A controller receives, once per sampling cycle, a timestamp, the per-marker
//! XY shifts (if XY was measured at all) and the Z shift, and returns the
//! correction to apply to the stage. Every output is already negated: the
//! caller adds it to the current setpoint.

pub mod pi;
pub mod pid;
pub mod proportional;
pub mod threshold;

pub use pi::{PiController, PiCore, RejectPiControllerMad, RejectPiControllerSd};
pub use pid::PidController;
pub use proportional::ProportionalController;
pub use threshold::ThresholdController;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::measurement::XyShift;
use crate::outlier::OutlierFilter;

pub const AXES: usize = 3;
pub const X: usize = 0;
pub const Y: usize = 1;
pub const Z: usize = 2;

const AXIS_NAMES: [&str; AXES] = ["x", "y", "z"];

/// One value per axis, ordered X, Y, Z.
pub type Vec3 = [f64; AXES];

// ============================================================================
// GAINS - What the setters accept: a scalar or one value per axis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gains {
    Scalar(f64),
    PerAxis(Vec<f64>),
}

impl Gains {
    /// Broadcast a scalar, or check that a per-axis list has exactly 3 values.
    pub fn resolve(&self) -> Result<Vec3, ControlError> {
        match self {
            Gains::Scalar(value) => Ok([*value; AXES]),
            Gains::PerAxis(values) => {
                <Vec3>::try_from(values.as_slice()).map_err(|_| ControlError::GainShape {
                    expected: AXES,
                    got: values.len(),
                })
            }
        }
    }
}

impl From<f64> for Gains {
    fn from(value: f64) -> Self {
        Gains::Scalar(value)
    }
}

impl From<Vec3> for Gains {
    fn from(values: Vec3) -> Self {
        Gains::PerAxis(values.to_vec())
    }
}

impl From<(f64, f64, f64)> for Gains {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Gains::PerAxis(vec![x, y, z])
    }
}

impl From<Vec<f64>> for Gains {
    fn from(values: Vec<f64>) -> Self {
        Gains::PerAxis(values)
    }
}

impl From<&[f64]> for Gains {
    fn from(values: &[f64]) -> Self {
        Gains::PerAxis(values.to_vec())
    }
}

/// Per-axis gain vector; always exactly three entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisGains(Vec3);

impl AxisGains {
    pub fn splat(value: f64) -> Self {
        Self([value; AXES])
    }

    pub fn as_array(&self) -> Vec3 {
        self.0
    }

    /// Replace in place. Leaves the gains untouched on a shape error.
    pub fn set(&mut self, gains: &Gains) -> Result<(), ControlError> {
        self.0 = gains.resolve()?;
        Ok(())
    }
}

impl TryFrom<&Gains> for AxisGains {
    type Error = ControlError;

    fn try_from(gains: &Gains) -> Result<Self, Self::Error> {
        gains.resolve().map(Self)
    }
}

impl std::ops::Index<usize> for AxisGains {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        &self.0[axis]
    }
}

// ============================================================================
// CONTROLLER - The capability contract
// ============================================================================

pub trait Controller {
    /// Proportional gain, scalar or per axis.
    fn set_kp(&mut self, kp: Gains) -> Result<(), ControlError>;

    /// Integral gain. Laws without an integral term accept and ignore it.
    fn set_ki(&mut self, ki: Gains) -> Result<(), ControlError>;

    /// Restart X and Y after the XY tracking session restarted.
    ///
    /// `n_rois` is the number of markers now tracked; it is informational.
    fn reset_xy(&mut self, n_rois: usize);

    /// Restart Z after the Z tracking session restarted.
    fn reset_z(&mut self);

    /// One control step. Never fails and never returns NaN for NaN input.
    fn response(&mut self, t: f64, xy_shifts: Option<&[XyShift]>, z_shift: f64) -> Vec3;
}

// ============================================================================
// ERROR VECTOR - Shared input conditioning
// ============================================================================

/// Reduce the XY samples with `filter` and assemble a NaN-free error vector.
pub(crate) fn error_vector<F>(filter: &F, xy_shifts: Option<&[XyShift]>, z_shift: f64) -> Vec3
where
    F: OutlierFilter + ?Sized,
{
    let (x, y) = match xy_shifts {
        Some(samples) if !samples.is_empty() => filter.reduce(samples).shift(),
        _ => (0.0, 0.0),
    };
    [
        nan_to_zero(X, x),
        nan_to_zero(Y, y),
        nan_to_zero(Z, z_shift),
    ]
}

fn nan_to_zero(axis: usize, value: f64) -> f64 {
    if value.is_nan() {
        tracing::warn!(axis = AXIS_NAMES[axis], "{} shift is NaN, using 0", AXIS_NAMES[axis]);
        0.0
    } else {
        value
    }
}

pub(crate) fn negate(values: Vec3) -> Vec3 {
    values.map(|v| -v)
}
