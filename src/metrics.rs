//! Metrics module - Per-session control performance tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::controller::{Vec3, X, Y, Z};
use crate::error::MetricsError;

/// Residuals are stored as integer picometres.
const PICOMETRES_PER_NM: f64 = 1000.0;

// ============================================================================
// SESSION METRICS - Thread-safe, cheaply cloneable recorder
// ============================================================================

#[derive(Clone)]
pub struct SessionMetrics {
    response_hist: Arc<Mutex<Histogram<u64>>>,
    residual_xy_hist: Arc<Mutex<Histogram<u64>>>,
    residual_z_hist: Arc<Mutex<Histogram<u64>>>,
    cycles: Arc<AtomicU64>,
    degraded_cycles: Arc<AtomicU64>,
}

impl SessionMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            response_hist: Arc::new(Mutex::new(Histogram::new(3)?)),
            residual_xy_hist: Arc::new(Mutex::new(Histogram::new(3)?)),
            residual_z_hist: Arc::new(Mutex::new(Histogram::new(3)?)),
            cycles: Arc::new(AtomicU64::new(0)),
            degraded_cycles: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Time spent inside one `response()` call.
    pub fn record_response(&self, duration: Duration) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.response_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Displacement left on the specimen, in nanometers.
    pub fn record_residual(&self, residual: Vec3) {
        let xy = residual[X].hypot(residual[Y]);
        self.residual_xy_hist.lock().record(to_picometres(xy)).ok();
        self.residual_z_hist.lock().record(to_picometres(residual[Z])).ok();
    }

    /// A cycle whose measurement carried NaN coordinates or no XY data.
    pub fn record_degraded_input(&self) {
        self.degraded_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let response = self.response_hist.lock();
        let xy = self.residual_xy_hist.lock();
        let z = self.residual_z_hist.lock();

        MetricsReport {
            cycles: self.cycles.load(Ordering::Relaxed),
            degraded_cycles: self.degraded_cycles.load(Ordering::Relaxed),
            response_p50: Duration::from_nanos(response.value_at_quantile(0.5)),
            response_p99: Duration::from_nanos(response.value_at_quantile(0.99)),
            residual_xy_p50_nm: from_picometres(xy.value_at_quantile(0.5)),
            residual_xy_p99_nm: from_picometres(xy.value_at_quantile(0.99)),
            residual_z_p50_nm: from_picometres(z.value_at_quantile(0.5)),
            residual_z_p99_nm: from_picometres(z.value_at_quantile(0.99)),
        }
    }
}

fn to_picometres(nm: f64) -> u64 {
    // NaN casts to 0, infinities saturate
    (nm.abs() * PICOMETRES_PER_NM).round() as u64
}

fn from_picometres(pm: u64) -> f64 {
    pm as f64 / PICOMETRES_PER_NM
}

// ============================================================================
// METRICS REPORT - Summary statistics
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub cycles: u64,
    pub degraded_cycles: u64,
    pub response_p50: Duration,
    pub response_p99: Duration,
    pub residual_xy_p50_nm: f64,
    pub residual_xy_p99_nm: f64,
    pub residual_z_p50_nm: f64,
    pub residual_z_p99_nm: f64,
}
