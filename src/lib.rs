//! Feedback-control core for fiducial-marker drift stabilization.
//!
//! Each sampling cycle a [`Controller`] turns per-marker XY shifts and a Z
//! shift into the stage correction that cancels the measured drift.

pub mod config;
pub mod controller;
pub mod error;
pub mod measurement;
pub mod metrics;
pub mod outlier;
pub mod session;

pub use config::{load_config, ControllerConfig, SimulationConfig, StabilizerConfig};
pub use controller::{
    AxisGains, Controller, Gains, PiController, PiCore, PidController, ProportionalController,
    RejectPiControllerMad, RejectPiControllerSd, ThresholdController, Vec3,
};
pub use error::{ConfigError, ControlError, MetricsError};
pub use measurement::generator::DriftSimulator;
pub use measurement::{Measurement, XyShift};
pub use metrics::{MetricsReport, SessionMetrics};
pub use outlier::{MadFilter, MeanFilter, OutlierFilter, SdFilter, TrimmedShift};
pub use session::{run_simulated_session, SessionSummary};
