use thiserror::Error;

/// Typed failures surfaced by the graph store and analytics engine.
/// Structural and statistical problems are always explicit: a query
/// never silently approximates.
#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    /// An edge referenced a node that does not exist. Fatal to that
    /// single mutation, not to the process.
    #[error("graph integrity violation: edge {src} -> {target} references missing node {missing}")]
    GraphIntegrity {
        src: String,
        target: String,
        missing: String,
    },

    /// An anomaly sample was too small to produce meaningful statistics.
    #[error("insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// An out-of-range or unknown query parameter.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// An unknown seed node or id.
    #[error("node not found: {0}")]
    NotFound(String),
}

impl AnalyticsError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
