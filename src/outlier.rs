//! Outlier module - Collapse per-marker shift estimates into one trusted shift
//!
//! Every tracked fiducial yields its own (x, y) estimate per cycle. A filter
//! reduces them to a single shift, optionally discarding markers that
//! disagree with the majority (lost tracking, debris, bleaching).

pub mod mad;
pub mod sd;

pub use mad::{MadFilter, DEFAULT_MAD_THRESHOLD};
pub use sd::{SdFilter, DEFAULT_SD_THRESHOLD};

use crate::error::ControlError;
use crate::measurement::{masked_mean_xy, nan_mean_xy, XyShift};

/// A trimmed estimate built from fewer markers than this is low confidence.
pub const MIN_TRUSTED_MARKERS: usize = 3;

/// Sample sets smaller than this are averaged without any trimming.
pub const MIN_SAMPLES_TO_TRIM: usize = 4;

// ============================================================================
// TRIMMED SHIFT - Result of one reduction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimmedShift {
    pub x: f64,
    pub y: f64,
    /// Markers that contributed to the estimate.
    pub retained: usize,
    pub low_confidence: bool,
}

impl TrimmedShift {
    /// Plain NaN-aware average, no marker discarded.
    pub fn untrimmed(samples: &[XyShift]) -> Self {
        let (x, y) = nan_mean_xy(samples);
        Self {
            x,
            y,
            retained: samples.len(),
            low_confidence: false,
        }
    }

    /// Average of the surviving markers; `fallback` is used when none survive.
    pub(crate) fn from_mask(
        samples: &[XyShift],
        valid: &[bool],
        fallback: XyShift,
        filter: &'static str,
    ) -> Self {
        let retained = valid.iter().filter(|v| **v).count();
        let (x, y) = if retained == 0 {
            fallback
        } else {
            masked_mean_xy(samples, valid)
        };
        let low_confidence = retained < MIN_TRUSTED_MARKERS;
        if low_confidence {
            tracing::warn!(
                filter,
                retained,
                total = samples.len(),
                "There might be invalid positions: too few markers survived trimming"
            );
        }
        Self {
            x,
            y,
            retained,
            low_confidence,
        }
    }

    pub fn shift(&self) -> XyShift {
        (self.x, self.y)
    }
}

// ============================================================================
// OUTLIER FILTER - Policy seam used by the PI controllers
// ============================================================================

pub trait OutlierFilter {
    fn reduce(&self, samples: &[XyShift]) -> TrimmedShift;
}

/// No rejection: every marker is averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanFilter;

impl OutlierFilter for MeanFilter {
    fn reduce(&self, samples: &[XyShift]) -> TrimmedShift {
        TrimmedShift::untrimmed(samples)
    }
}

/// Normalized deviation. A zero scale yields 0 for a zero deviation and
/// infinity otherwise; NaN inputs never count as evidence of an outlier.
pub(crate) fn deviation_score(deviation: f64, scale: f64) -> f64 {
    if deviation.is_nan() || scale.is_nan() {
        0.0
    } else if scale > 0.0 {
        deviation / scale
    } else if deviation == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

pub(crate) fn check_threshold(name: &'static str, value: f64) -> Result<f64, ControlError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ControlError::InvalidParameter { name, value })
    }
}
