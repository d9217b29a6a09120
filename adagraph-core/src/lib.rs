// Adagraph Core Library
//
// In-memory blockchain activity graph with an analytics engine on top:
// degree metrics, normalized activity coloring, statistical anomaly
// detection, community clustering and bounded value-flow tracing.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod graphs;
pub mod types;

// Re-export main types and functions for easy use
pub use analytics::AnalyticsEngine;
pub use cache::MetricsCache;
pub use config::AnalyticsConfig;
pub use error::AnalyticsError;
pub use graphs::{GraphBuilder, GraphListener, GraphStore};
pub use types::*;
