//! Partition configuration: quoting parameters plus simulator limits.
//!
//! Sources, later ones win: an optional config file (format picked from its
//! extension), then `QUOTEX_*` environment variables, e.g.
//! `QUOTEX_FEE_RATE=0.001` or `QUOTEX_PDF__LOG10_X=true`.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::engine::co1::{rate_precision, Co1Engine, MIN_TICK};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Histogram of market-order sizes fed to the engine as its tuning vectors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PdfConfig {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// `x` is stored as log10(size).
    #[serde(default)]
    pub log10_x: bool,
}

impl PdfConfig {
    pub fn sizes(&self) -> Vec<f64> {
        if self.log10_x {
            self.x.iter().map(|x| 10f64.powf(*x)).collect()
        } else {
            self.x.clone()
        }
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.y
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PartitionConfig {
    pub fee_rate: f64,
    /// Fee charged on simulated fills; defaults to `fee_rate`.
    #[serde(default)]
    pub actual_fee_rate: Option<f64>,
    pub quantity_limit: f64,
    #[serde(default = "unbounded")]
    pub inventory_limit: f64,
    pub tick: f64,
    #[serde(default = "default_min_notional")]
    pub min_notional: f64,
    #[serde(default)]
    pub allow_order_conflicts: bool,
    /// Trim each book side to this much notional before quoting; 0 keeps whole books.
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default = "unbounded")]
    pub initial_funds: f64,
    #[serde(default)]
    pub initial_inventory: f64,
    pub pdf: PdfConfig,
}

fn unbounded() -> f64 {
    f64::INFINITY
}

fn default_min_notional() -> f64 {
    0.0005
}

impl PartitionConfig {
    /// Load from `path` (if given) layered under `QUOTEX_*` environment variables.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("QUOTEX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: PartitionConfig = settings.try_deserialize()?;
        cfg.validate()?;
        debug!(?cfg, "Loaded partition config");
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let cfg: PartitionConfig = Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.tick.is_finite() && self.tick >= MIN_TICK) {
            return Err(ConfigError::Invalid(format!("tick must be finite and at least {MIN_TICK:e}, got {}", self.tick)));
        }
        if let Some(depth) = self.depth {
            if !(depth >= 0.0) {
                return Err(ConfigError::Invalid(format!("depth must be non-negative, got {depth}")));
            }
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(ConfigError::Invalid(format!("fee_rate must be in [0, 1), got {}", self.fee_rate)));
        }
        if let Some(actual) = self.actual_fee_rate {
            if !(0.0..1.0).contains(&actual) {
                return Err(ConfigError::Invalid(format!("actual_fee_rate must be in [0, 1), got {actual}")));
            }
        }
        if !(self.quantity_limit > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "quantity_limit must be positive, got {}",
                self.quantity_limit
            )));
        }
        if self.pdf.x.is_empty() || self.pdf.y.is_empty() {
            return Err(ConfigError::Invalid("pdf x and y must be non-empty".into()));
        }
        if self.pdf.x.len() != self.pdf.y.len() {
            return Err(ConfigError::Invalid(format!(
                "pdf x has {} points but y has {}",
                self.pdf.x.len(),
                self.pdf.y.len()
            )));
        }
        Ok(())
    }

    pub fn actual_fee_rate(&self) -> f64 {
        self.actual_fee_rate.unwrap_or(self.fee_rate)
    }

    /// Depth to trim books to, if trimming is on.
    pub fn trim_depth(&self) -> Option<f64> {
        self.depth.filter(|&depth| depth > 0.0)
    }

    pub fn rate_precision(&self) -> i32 {
        rate_precision(self.tick)
    }

    pub fn engine(&self) -> Co1Engine {
        Co1Engine::new(self.allow_order_conflicts)
    }
}
