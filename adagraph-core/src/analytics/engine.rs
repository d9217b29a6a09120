use crate::cache::{AnomalyKey, MetricsCache};
use crate::config::{
    AnalyticsConfig, CLUSTER_WINDOW_MAX, CLUSTER_WINDOW_MIN, FLOW_LIMIT_MAX, FLOW_LIMIT_MIN,
};
use crate::error::AnalyticsError;
use crate::graphs::store::GraphStore;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::activity::ActivityColorMapper;
use super::anomaly::AnomalyDetector;
use super::cluster::ClusterDetector;
use super::degree::DegreeAnalyzer;
use super::flow::FlowPathFinder;

/// Facade over the analyzers. Queries route through the metrics cache:
/// a clean family returns its cached response, a dirty one blocks while
/// the analyzer recomputes. Query results only ever write derived
/// attributes; block/transaction/address payload data is read-only
/// here.
pub struct AnalyticsEngine {
    store: Arc<GraphStore>,
    cache: Arc<MetricsCache>,
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self::with_config(store, AnalyticsConfig::default())
    }

    pub fn with_config(store: Arc<GraphStore>, config: AnalyticsConfig) -> Self {
        let cache = Arc::new(MetricsCache::new());
        store.register_listener(cache.clone());
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// How many times a family's analyzer has run. Stable across
    /// cache hits, so callers can verify caching behavior.
    pub fn recompute_count(&self, family: MetricFamily) -> u64 {
        self.cache.recompute_count(family)
    }

    // ===== DEGREE =====

    pub fn degree_metrics(&self, filter: &NodeFilter) -> Result<Vec<DegreeEntry>, AnalyticsError> {
        let entries = self.ensure_degrees();
        Ok(Self::apply_filter(entries, filter, |e| (&e.node_id, e.node_type)))
    }

    /// Cached degree data, recomputing only when the family is dirty.
    /// The full result set is built first and swapped into the store in
    /// one step, so concurrent readers never see a partial update.
    fn ensure_degrees(&self) -> Vec<DegreeEntry> {
        if let Some(hit) = self.cache.lookup_degree() {
            return hit;
        }
        let entries = DegreeAnalyzer::compute(&self.store);
        self.store.apply_degrees(&entries);
        self.cache.store_degree(entries.clone());
        entries
    }

    // ===== ACTIVITY =====

    pub fn activity_metrics(
        &self,
        filter: &NodeFilter,
        scheme: Option<ColorScheme>,
    ) -> Result<ActivityReport, AnalyticsError> {
        let scheme = scheme.unwrap_or(self.config.default_color_scheme);
        let entries = match self.cache.lookup_activity(scheme) {
            Some(hit) => hit,
            None => self.recompute_activity(scheme),
        };
        Ok(ActivityReport {
            metrics: Self::apply_filter(entries, filter, |e| (&e.node_id, e.node_type)),
            color_scheme: scheme,
        })
    }

    fn recompute_activity(&self, scheme: ColorScheme) -> Vec<ActivityEntry> {
        let degrees = self.ensure_degrees();
        let entries = ActivityColorMapper::compute(&degrees, scheme);
        self.store.apply_activity(&entries, scheme);
        self.cache.store_activity(scheme, entries.clone());
        entries
    }

    // ===== ANOMALY =====

    pub fn anomalies(
        &self,
        filter: &NodeFilter,
        method: Option<AnomalyMethod>,
        threshold: Option<f64>,
    ) -> Result<AnomalyReport, AnalyticsError> {
        let method = method.unwrap_or(self.config.default_method);
        let threshold = threshold.unwrap_or(self.config.default_threshold);
        let key = AnomalyKey {
            filter: filter.clone(),
            method,
            threshold,
        };
        if let Some(hit) = self.cache.lookup_anomaly(&key) {
            return Ok(hit);
        }
        let degrees = self.ensure_degrees();
        // A failed detection stores nothing: the family stays dirty and
        // previously cached attributes are left untouched.
        let report = AnomalyDetector::detect(&self.store, &degrees, filter, method, threshold)?;
        self.store.apply_anomalies(&report.anomalies);
        self.cache.store_anomaly(key, report.clone());
        Ok(report)
    }

    // ===== CLUSTER =====

    pub fn clusters(
        &self,
        kind: ClusterKind,
        window: Option<u32>,
    ) -> Result<ClusterReport, AnalyticsError> {
        let window = window.unwrap_or(self.config.default_cluster_window);
        if !(CLUSTER_WINDOW_MIN..=CLUSTER_WINDOW_MAX).contains(&window) {
            return Err(AnalyticsError::invalid_parameter(
                "time_window_blocks",
                format!("must be between {CLUSTER_WINDOW_MIN} and {CLUSTER_WINDOW_MAX}"),
            ));
        }
        if let Some(hit) = self.cache.lookup_cluster(kind, window) {
            return Ok(hit);
        }
        let report = ClusterDetector::detect(&self.store, kind, window);
        self.apply_cluster_attributes(&report);
        self.cache.store_cluster(kind, window, report.clone());
        Ok(report)
    }

    fn apply_cluster_attributes(&self, report: &ClusterReport) {
        let mut assignments: HashMap<NodeId, (i64, Option<String>)> = HashMap::new();
        for cluster in &report.clusters {
            for id in &cluster.node_ids {
                assignments.insert(id.clone(), (cluster.cluster_id, Some(cluster.color_hex.clone())));
            }
        }
        for id in &report.unclustered {
            assignments.insert(id.clone(), (-1, None));
        }
        self.store.apply_clusters(&assignments);
    }

    // ===== FLOW =====

    pub fn flow_paths(&self, query: &FlowQuery) -> Result<FlowReport, AnalyticsError> {
        match (&query.start_address, &query.transaction_id) {
            (None, None) => {
                return Err(AnalyticsError::invalid_parameter(
                    "seed",
                    "either start_address or transaction_id is required",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(AnalyticsError::invalid_parameter(
                    "seed",
                    "start_address and transaction_id are mutually exclusive",
                ));
            }
            _ => {}
        }
        for (name, value) in [("max_depth", query.max_depth), ("max_blocks", query.max_blocks)] {
            if !(FLOW_LIMIT_MIN..=FLOW_LIMIT_MAX).contains(&value) {
                return Err(AnalyticsError::invalid_parameter(
                    name,
                    format!("must be between {FLOW_LIMIT_MIN} and {FLOW_LIMIT_MAX}"),
                ));
            }
        }
        if let Some(hit) = self.cache.lookup_flow(query) {
            return Ok(hit);
        }
        let report = FlowPathFinder::find(&self.store, query, self.config.max_flow_paths)?;
        self.cache.store_flow(query.clone(), report.clone());
        Ok(report)
    }

    // ===== RECALCULATE =====

    /// Force every family dirty, then synchronously recompute each one
    /// that is computable without query-specific input. A family whose
    /// recompute fails (e.g. an anomaly sample below the minimum) is
    /// recorded as skipped and stays dirty; it never corrupts the
    /// others.
    pub fn recalculate_all(&self) -> RecalculationSummary {
        info!("recalculating all metric families");
        self.cache.invalidate_all();
        let mut outcomes = Vec::new();

        let degrees = self.ensure_degrees();
        outcomes.push((MetricFamily::Degree, RecomputeOutcome::Recomputed));

        self.recompute_activity(self.config.default_color_scheme);
        outcomes.push((MetricFamily::Activity, RecomputeOutcome::Recomputed));

        let anomaly_key = AnomalyKey {
            filter: NodeFilter::default(),
            method: self.config.default_method,
            threshold: self.config.default_threshold,
        };
        let outcome = match AnomalyDetector::detect(
            &self.store,
            &degrees,
            &anomaly_key.filter,
            anomaly_key.method,
            anomaly_key.threshold,
        ) {
            Ok(report) => {
                self.store.apply_anomalies(&report.anomalies);
                self.cache.store_anomaly(anomaly_key, report);
                RecomputeOutcome::Recomputed
            }
            Err(err) => RecomputeOutcome::Skipped {
                reason: err.to_string(),
            },
        };
        outcomes.push((MetricFamily::Anomaly, outcome));

        let window = self.config.default_cluster_window;
        let report = ClusterDetector::detect(&self.store, ClusterKind::Address, window);
        self.apply_cluster_attributes(&report);
        self.cache.store_cluster(ClusterKind::Address, window, report);
        outcomes.push((MetricFamily::Cluster, RecomputeOutcome::Recomputed));

        // Flow has no default seed; the stale response is dropped and
        // the next query recomputes.
        self.cache.clear_flow();
        outcomes.push((
            MetricFamily::Flow,
            RecomputeOutcome::Skipped {
                reason: "flow queries require a seed".to_string(),
            },
        ));

        RecalculationSummary { outcomes }
    }

    fn apply_filter<T>(
        entries: Vec<T>,
        filter: &NodeFilter,
        key: impl Fn(&T) -> (&NodeId, NodeKind),
    ) -> Vec<T> {
        entries
            .into_iter()
            .filter(|e| {
                let (id, kind) = key(e);
                filter.node_type.map_or(true, |t| t == kind)
                    && filter.node_id.as_ref().map_or(true, |want| want == id)
            })
            .collect()
    }
}
