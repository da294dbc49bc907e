//! Iterative standard-deviation trimming.
//!
//! The standard deviation is inflated by the very outliers it is meant to
//! expose, so the center and spread are re-estimated from the survivors
//! until the surviving count stops changing.

use super::{check_threshold, deviation_score, OutlierFilter, TrimmedShift};
use super::{MIN_SAMPLES_TO_TRIM, MIN_TRUSTED_MARKERS};
use crate::error::ControlError;
use crate::measurement::{masked_mean_xy, masked_std_xy, XyShift};

pub const DEFAULT_SD_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdFilter {
    threshold: f64,
}

impl SdFilter {
    pub fn new(threshold: f64) -> Result<Self, ControlError> {
        Ok(Self {
            threshold: check_threshold("sd_threshold", threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Valid mask over *all* samples, so a marker trimmed earlier can return.
    fn classify(&self, samples: &[XyShift], center: XyShift, spread: XyShift) -> Vec<bool> {
        samples
            .iter()
            .map(|&(x, y)| {
                let zx = deviation_score((x - center.0).abs(), spread.0);
                let zy = deviation_score((y - center.1).abs(), spread.1);
                !(zx > self.threshold || zy > self.threshold)
            })
            .collect()
    }
}

impl Default for SdFilter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SD_THRESHOLD,
        }
    }
}

fn count_valid(valid: &[bool]) -> usize {
    valid.iter().filter(|v| **v).count()
}

impl SdFilter {
    /// Final valid mask, last center and the number of re-estimation rounds.
    fn trim(&self, samples: &[XyShift]) -> (Vec<bool>, XyShift, usize) {
        let n = samples.len();
        let mut valid = vec![true; n];
        let mut center = masked_mean_xy(samples, &valid);
        let spread = masked_std_xy(samples, &valid);
        valid = self.classify(samples, center, spread);
        let mut n_valid = count_valid(&valid);
        let mut last_n_valid = n;

        // Bounded: a valid set that oscillates must not spin forever.
        let mut iterations = 0;
        while n_valid >= MIN_TRUSTED_MARKERS && n_valid != last_n_valid && iterations < n {
            last_n_valid = n_valid;
            center = masked_mean_xy(samples, &valid);
            let spread = masked_std_xy(samples, &valid);
            valid = self.classify(samples, center, spread);
            n_valid = count_valid(&valid);
            iterations += 1;
        }
        tracing::trace!(iterations, retained = n_valid, total = n, "sd trimming converged");
        (valid, center, iterations)
    }
}

impl OutlierFilter for SdFilter {
    fn reduce(&self, samples: &[XyShift]) -> TrimmedShift {
        if samples.len() < MIN_SAMPLES_TO_TRIM {
            return TrimmedShift::untrimmed(samples);
        }
        let (valid, center, _) = self.trim(samples);
        TrimmedShift::from_mask(samples, &valid, center, "sd")
    }
}
