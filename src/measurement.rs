//! Measurement module - Per-cycle upstream input and NaN-aware reducers

pub mod generator;

/// One marker's (x, y) shift from its reference position, in nanometers.
pub type XyShift = (f64, f64);

// ============================================================================
// MEASUREMENT - What the upstream tracker hands over every sampling cycle
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Monotonic timestamp in seconds.
    pub t: f64,
    /// One entry per tracked marker, `None` when XY was not measured.
    pub xy_shifts: Option<Vec<XyShift>>,
    pub z_shift: f64,
    pub sequence_id: u64,
}

impl Measurement {
    pub fn xy(&self) -> Option<&[XyShift]> {
        self.xy_shifts.as_deref()
    }

    /// True when XY is missing or any coordinate (Z included) is NaN.
    pub fn is_degraded(&self) -> bool {
        self.z_shift.is_nan()
            || match self.xy() {
                None => true,
                Some(samples) => samples.iter().any(|(x, y)| x.is_nan() || y.is_nan()),
            }
    }
}

// ============================================================================
// NAN-AWARE REDUCERS
// ============================================================================

/// Mean of the non-NaN values, NaN when there are none.
pub fn nan_mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation of the non-NaN values.
pub fn nan_std<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let kept: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if kept.is_empty() {
        return f64::NAN;
    }
    let n = kept.len() as f64;
    let mean = kept.iter().sum::<f64>() / n;
    let var = kept.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Median of the non-NaN values; an even count averages the middle pair.
pub fn nan_median<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Per-axis NaN-aware mean over every sample.
pub fn nan_mean_xy(samples: &[XyShift]) -> XyShift {
    (
        nan_mean(samples.iter().map(|s| s.0)),
        nan_mean(samples.iter().map(|s| s.1)),
    )
}

/// Per-axis NaN-aware mean over the samples whose mask entry is set.
pub fn masked_mean_xy(samples: &[XyShift], valid: &[bool]) -> XyShift {
    let kept = || samples.iter().zip(valid).filter(|(_, v)| **v).map(|(s, _)| *s);
    (nan_mean(kept().map(|s| s.0)), nan_mean(kept().map(|s| s.1)))
}

/// Per-axis NaN-aware population standard deviation over the masked samples.
pub fn masked_std_xy(samples: &[XyShift], valid: &[bool]) -> XyShift {
    let kept = || samples.iter().zip(valid).filter(|(_, v)| **v).map(|(s, _)| *s);
    (nan_std(kept().map(|s| s.0)), nan_std(kept().map(|s| s.1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nan_mean_skips_missing_values() {
        assert_abs_diff_eq!(nan_mean([1.0, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean([f64::NAN, f64::NAN]).is_nan());
        assert!(nan_mean(std::iter::empty()).is_nan());
    }

    #[test]
    fn nan_std_is_population_deviation() {
        assert_abs_diff_eq!(nan_std([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_abs_diff_eq!(nan_std([3.0, f64::NAN, 3.0]), 0.0);
    }

    #[test]
    fn nan_median_handles_even_and_odd_counts() {
        assert_abs_diff_eq!(nan_median([5.0, 1.0, 3.0]), 3.0);
        assert_abs_diff_eq!(nan_median([4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_abs_diff_eq!(nan_median([f64::NAN, 4.0, 2.0]), 3.0);
    }

    #[test]
    fn masked_mean_only_uses_valid_samples() {
        let samples = [(1.0, 10.0), (3.0, 30.0), (100.0, 1000.0)];
        let (x, y) = masked_mean_xy(&samples, &[true, true, false]);
        assert_abs_diff_eq!(x, 2.0);
        assert_abs_diff_eq!(y, 20.0);
    }

    #[test]
    fn nan_coordinate_does_not_poison_the_other_axis() {
        let samples = [(f64::NAN, 1.0), (2.0, 3.0)];
        let (x, y) = nan_mean_xy(&samples);
        assert_abs_diff_eq!(x, 2.0);
        assert_abs_diff_eq!(y, 2.0);
    }
}
