//! Configuration loading - controller selection and simulation parameters

use std::path::Path;

use serde::Deserialize;

use crate::controller::pid::DEFAULT_DERIV_POINTS;
use crate::controller::{
    Controller, Gains, PiController, PidController, ProportionalController, RejectPiControllerMad,
    RejectPiControllerSd, ThresholdController,
};
use crate::error::{ConfigError, ControlError};
use crate::outlier::{DEFAULT_MAD_THRESHOLD, DEFAULT_SD_THRESHOLD};

// ============================================================================
// CONTROLLER CONFIG - One variant per control law
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerConfig {
    Pi {
        #[serde(default = "unit_gains")]
        kp: Gains,
        #[serde(default = "unit_gains")]
        ki: Gains,
    },
    RejectSd {
        #[serde(default = "unit_gains")]
        kp: Gains,
        #[serde(default = "unit_gains")]
        ki: Gains,
        #[serde(default = "default_sd_threshold")]
        threshold: f64,
    },
    RejectMad {
        #[serde(default = "unit_gains")]
        kp: Gains,
        #[serde(default = "unit_gains")]
        ki: Gains,
        #[serde(default = "default_mad_threshold")]
        threshold: f64,
    },
    Threshold {
        #[serde(default = "unit_gains")]
        kp: Gains,
        threshold_distance: f64,
        kp_above: f64,
        max_shift: f64,
    },
    Proportional {
        #[serde(default = "unit_gains")]
        kp: Gains,
    },
    Pid {
        #[serde(default = "unit_gains")]
        kp: Gains,
        #[serde(default = "unit_gains")]
        ki: Gains,
        #[serde(default = "unit_gains")]
        kd: Gains,
        #[serde(default = "default_deriv_points")]
        deriv_points: usize,
    },
}

fn unit_gains() -> Gains {
    Gains::Scalar(1.0)
}

fn default_sd_threshold() -> f64 {
    DEFAULT_SD_THRESHOLD
}

fn default_mad_threshold() -> f64 {
    DEFAULT_MAD_THRESHOLD
}

fn default_deriv_points() -> usize {
    DEFAULT_DERIV_POINTS
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig::Pi {
            kp: unit_gains(),
            ki: unit_gains(),
        }
    }
}

impl ControllerConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerConfig::Pi { .. } => "pi",
            ControllerConfig::RejectSd { .. } => "reject_sd",
            ControllerConfig::RejectMad { .. } => "reject_mad",
            ControllerConfig::Threshold { .. } => "threshold",
            ControllerConfig::Proportional { .. } => "proportional",
            ControllerConfig::Pid { .. } => "pid",
        }
    }

    pub fn build(&self) -> Result<Box<dyn Controller>, ControlError> {
        let controller: Box<dyn Controller> = match self {
            ControllerConfig::Pi { kp, ki } => Box::new(PiController::new(kp.clone(), ki.clone())?),
            ControllerConfig::RejectSd { kp, ki, threshold } => Box::new(
                RejectPiControllerSd::with_sd_rejection(kp.clone(), ki.clone(), *threshold)?,
            ),
            ControllerConfig::RejectMad { kp, ki, threshold } => Box::new(
                RejectPiControllerMad::with_mad_rejection(kp.clone(), ki.clone(), *threshold)?,
            ),
            ControllerConfig::Threshold {
                kp,
                threshold_distance,
                kp_above,
                max_shift,
            } => {
                let mut ctl = ThresholdController::new(*threshold_distance, *kp_above, *max_shift)?;
                ctl.set_kp(kp.clone())?;
                Box::new(ctl)
            }
            ControllerConfig::Proportional { kp } => Box::new(ProportionalController::new(kp.clone())?),
            ControllerConfig::Pid {
                kp,
                ki,
                kd,
                deriv_points,
            } => Box::new(PidController::new(kp.clone(), ki.clone(), kd.clone(), *deriv_points)?),
        };
        Ok(controller)
    }
}

// ============================================================================
// SIMULATION CONFIG - Mock measurement source and session length
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub markers: usize,
    pub cycles: usize,
    pub interval_s: f64,
    pub drift_amplitude_nm: f64,
    pub noise_nm: f64,
    pub outlier_probability: f64,
    pub outlier_magnitude_nm: f64,
    pub dropout_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            markers: 12,
            cycles: 600,
            interval_s: 0.1,
            drift_amplitude_nm: 3.0,
            noise_nm: 3.0,
            outlier_probability: 0.0,
            outlier_magnitude_nm: 50.0,
            dropout_probability: 0.0,
        }
    }
}

// ============================================================================
// CONFIG FILE LOADING
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub controller: ControllerConfig,
    pub simulation: SimulationConfig,
}

impl StabilizerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<StabilizerConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    StabilizerConfig::from_toml_str(&contents)
}
