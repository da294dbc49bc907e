//! Median-absolute-deviation trimming, single pass.

use super::{check_threshold, deviation_score, OutlierFilter, TrimmedShift};
use super::MIN_SAMPLES_TO_TRIM;
use crate::error::ControlError;
use crate::measurement::{nan_mean_xy, nan_median, XyShift};

pub const DEFAULT_MAD_THRESHOLD: f64 = 1.5;

/// Scales MAD to the standard deviation of a normal distribution.
const MAD_CONSISTENCY: f64 = 0.6745;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MadFilter {
    threshold: f64,
}

impl MadFilter {
    pub fn new(threshold: f64) -> Result<Self, ControlError> {
        Ok(Self {
            threshold: check_threshold("mad_threshold", threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for MadFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MAD_THRESHOLD,
        }
    }
}

impl OutlierFilter for MadFilter {
    fn reduce(&self, samples: &[XyShift]) -> TrimmedShift {
        if samples.len() < MIN_SAMPLES_TO_TRIM {
            return TrimmedShift::untrimmed(samples);
        }

        let center = nan_mean_xy(samples);
        let deviations: Vec<XyShift> = samples
            .iter()
            .map(|&(x, y)| ((x - center.0).abs(), (y - center.1).abs()))
            .collect();
        let mad = (
            nan_median(deviations.iter().map(|d| d.0)),
            nan_median(deviations.iter().map(|d| d.1)),
        );

        let valid: Vec<bool> = deviations
            .iter()
            .map(|&(dx, dy)| {
                let zx = MAD_CONSISTENCY * deviation_score(dx, mad.0);
                let zy = MAD_CONSISTENCY * deviation_score(dy, mad.1);
                !(zx > self.threshold || zy > self.threshold)
            })
            .collect();

        TrimmedShift::from_mask(samples, &valid, center, "mad")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_gross_outlier_among_five() {
        let samples = [
            (10.0, -5.0),
            (10.1, -5.1),
            (9.9, -4.9),
            (10.0, -5.0),
            (500.0, 300.0),
        ];
        let shift = MadFilter::default().reduce(&samples);
        assert_eq!(shift.retained, 4);
        assert_abs_diff_eq!(shift.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(shift.y, -5.0, epsilon = 1e-9);
    }

    #[test]
    fn fewer_than_four_samples_return_the_plain_mean() {
        let samples = [(1.0, 2.0), (3.0, 4.0), (300.0, 400.0)];
        let shift = MadFilter::default().reduce(&samples);
        assert_eq!(shift.retained, 3);
        assert_abs_diff_eq!(shift.x, 304.0 / 3.0);
        assert_abs_diff_eq!(shift.y, 406.0 / 3.0);
    }

    #[test]
    fn zero_mad_keeps_samples_at_the_center() {
        let samples = vec![(1.0, 1.0); 5];
        let shift = MadFilter::default().reduce(&samples);
        assert_eq!(shift.retained, 5);
        assert_eq!(shift.shift(), (1.0, 1.0));
    }

    #[test]
    fn flags_low_confidence_when_axes_trim_different_markers() {
        let samples = [(0.0, 0.0), (0.0, 0.0), (0.0, 10.0), (10.0, 0.0)];
        let shift = MadFilter::default().reduce(&samples);
        assert_eq!(shift.retained, 2);
        assert!(shift.low_confidence);
        assert_eq!(shift.shift(), (0.0, 0.0));
    }

    #[test]
    fn is_a_single_pass() {
        // A second pass over the four survivors would drop the 12.0 marker.
        let samples = [
            (10.0, 0.0),
            (10.0, 0.0),
            (10.0, 0.0),
            (12.0, 0.0),
            (100.0, 0.0),
        ];
        let shift = MadFilter::default().reduce(&samples);
        assert_eq!(shift.retained, 4);
        assert_abs_diff_eq!(shift.x, 10.5, epsilon = 1e-12);
    }
}
