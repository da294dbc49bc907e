//! Error taxonomy for the stabilization core.
//!
//! Noisy input never produces an error: NaN values and thin marker sets are
//! logged and substituted. Only caller misconfiguration surfaces here.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("invalid gain shape: expected a scalar or {expected} values, got {got}")]
    GainShape { expected: usize, got: usize },

    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid controller configuration: {0}")]
    Control(#[from] ControlError),
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to create histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}
