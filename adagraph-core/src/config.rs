use crate::error::AnalyticsError;
use crate::types::{AnomalyMethod, ColorScheme};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

/// Minimum sample size for anomaly statistics. Below this the detector
/// refuses with `InsufficientData` rather than producing noise.
pub const MIN_ANOMALY_SAMPLE: usize = 10;

/// Allowed range for the clustering block window.
pub const CLUSTER_WINDOW_MIN: u32 = 20;
pub const CLUSTER_WINDOW_MAX: u32 = 50;

/// Allowed range for flow query depth and block window.
pub const FLOW_LIMIT_MIN: u32 = 1;
pub const FLOW_LIMIT_MAX: u32 = 10;

// Default value functions for serde
fn default_threshold() -> f64 {
    2.0
}

fn default_cluster_window() -> u32 {
    30
}

fn default_flow_limit() -> u32 {
    5
}

fn default_max_flow_paths() -> usize {
    256
}

/// Tunable analytics defaults. All fields have sensible defaults so an
/// empty config file (or none at all) yields a working engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Color scheme used when a query does not specify one.
    #[serde(default)]
    pub default_color_scheme: ColorScheme,
    /// Detection method used when a query does not specify one.
    #[serde(default)]
    pub default_method: AnomalyMethod,
    /// Multiplier for the zscore/threshold methods.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// Trailing block window for clustering.
    #[serde(default = "default_cluster_window")]
    pub default_cluster_window: u32,
    /// Maximum hops for flow queries.
    #[serde(default = "default_flow_limit")]
    pub default_flow_depth: u32,
    /// Trailing block window for flow queries.
    #[serde(default = "default_flow_limit")]
    pub default_flow_blocks: u32,
    /// Ceiling on paths explored per flow query. Once hit, only the
    /// highest-value paths found so far are returned.
    #[serde(default = "default_max_flow_paths")]
    pub max_flow_paths: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_color_scheme: ColorScheme::default(),
            default_method: AnomalyMethod::default(),
            default_threshold: default_threshold(),
            default_cluster_window: default_cluster_window(),
            default_flow_depth: default_flow_limit(),
            default_flow_blocks: default_flow_limit(),
            max_flow_paths: default_max_flow_paths(),
        }
    }
}

impl AnalyticsConfig {
    /// Load a config from a YAML file and validate it.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AnalyticsConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file if a path is given, falling back to defaults on
    /// any failure (missing file, parse error, out-of-range values).
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_default(),
            None => Self::default(),
        }
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !self.default_threshold.is_finite() || self.default_threshold <= 0.0 {
            return Err(AnalyticsError::invalid_parameter(
                "default_threshold",
                "must be a positive finite number",
            ));
        }
        if self.default_cluster_window < CLUSTER_WINDOW_MIN
            || self.default_cluster_window > CLUSTER_WINDOW_MAX
        {
            return Err(AnalyticsError::invalid_parameter(
                "default_cluster_window",
                format!("must be between {CLUSTER_WINDOW_MIN} and {CLUSTER_WINDOW_MAX}"),
            ));
        }
        for (name, value) in [
            ("default_flow_depth", self.default_flow_depth),
            ("default_flow_blocks", self.default_flow_blocks),
        ] {
            if !(FLOW_LIMIT_MIN..=FLOW_LIMIT_MAX).contains(&value) {
                return Err(AnalyticsError::invalid_parameter(
                    name,
                    format!("must be between {FLOW_LIMIT_MIN} and {FLOW_LIMIT_MAX}"),
                ));
            }
        }
        if self.max_flow_paths == 0 {
            return Err(AnalyticsError::invalid_parameter(
                "max_flow_paths",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AnalyticsConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_window() {
        let config = AnalyticsConfig {
            default_cluster_window: 51,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::InvalidParameter { name, .. }) if name == "default_cluster_window"
        ));
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: AnalyticsConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.default_threshold, 2.0);
        assert_eq!(config.default_cluster_window, 30);
        assert_eq!(config.max_flow_paths, 256);
    }
}
