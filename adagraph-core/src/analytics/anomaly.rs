use crate::config::MIN_ANOMALY_SAMPLE;
use crate::error::AnalyticsError;
use crate::graphs::store::GraphStore;
use crate::types::*;
use tracing::debug;

/// Statistical outlier detection over one or both anomaly target groups:
/// blocks by transaction count, transactions by total output value.
pub struct AnomalyDetector;

#[derive(Debug, Clone, Copy)]
struct SampleStats {
    mean: f64,
    std_dev: f64,
    percentile_5: f64,
    percentile_95: f64,
    min: f64,
    max: f64,
}

impl AnomalyDetector {
    pub fn detect(
        store: &GraphStore,
        degrees: &[DegreeEntry],
        filter: &NodeFilter,
        method: AnomalyMethod,
        threshold: f64,
    ) -> Result<AnomalyReport, AnalyticsError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AnalyticsError::invalid_parameter(
                "threshold",
                "must be a positive finite number",
            ));
        }
        let groups: Vec<NodeKind> = match filter.node_type {
            Some(NodeKind::Address) => {
                return Err(AnalyticsError::invalid_parameter(
                    "node_type",
                    "anomaly detection targets blocks and transactions only",
                ));
            }
            Some(kind) => vec![kind],
            None => vec![NodeKind::Block, NodeKind::Transaction],
        };

        let mut anomalies = Vec::new();
        let mut statistics = Vec::new();

        for kind in groups {
            let sample = Self::extract_sample(store, degrees, kind);
            if sample.len() < MIN_ANOMALY_SAMPLE {
                return Err(AnalyticsError::InsufficientData {
                    required: MIN_ANOMALY_SAMPLE,
                    actual: sample.len(),
                });
            }
            let stats = Self::compute_stats(&sample);
            statistics.push(GroupStatistics {
                node_type: kind,
                mean: stats.mean,
                std_dev: stats.std_dev,
                percentile_5: stats.percentile_5,
                percentile_95: stats.percentile_95,
                sample_size: sample.len(),
            });

            for (node_id, value) in &sample {
                let flagged = match method {
                    AnomalyMethod::ZScore => Self::judge_zscore(*value, &stats, threshold),
                    AnomalyMethod::Percentile => Self::judge_percentile(*value, &stats),
                    AnomalyMethod::Threshold => Self::judge_threshold(*value, &stats, threshold),
                };
                if let Some((score, high_side)) = flagged {
                    anomalies.push(AnomalyEntry {
                        node_id: node_id.clone(),
                        node_type: kind,
                        is_anomaly: true,
                        anomaly_score: score,
                        anomaly_type: Self::anomaly_kind(kind, high_side),
                        actual_value: *value,
                    });
                }
            }
        }

        // Exact-id filters narrow the report, not the statistics.
        if let Some(id) = &filter.node_id {
            anomalies.retain(|a| &a.node_id == id);
        }
        anomalies.sort_by(|a, b| {
            b.anomaly_score
                .partial_cmp(&a.anomaly_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });

        debug!(
            flagged = anomalies.len(),
            method = method.as_str(),
            "anomaly detection finished"
        );
        Ok(AnomalyReport {
            anomalies,
            statistics,
            method,
            threshold,
        })
    }

    /// The sample for blocks reuses the cached degree data (tx count is
    /// the block's type degree); transaction values come from summing the
    /// outgoing output-edge weights, same as the flow tracer sees them.
    fn extract_sample(
        store: &GraphStore,
        degrees: &[DegreeEntry],
        kind: NodeKind,
    ) -> Vec<(NodeId, f64)> {
        match kind {
            NodeKind::Block => degrees
                .iter()
                .filter(|e| e.node_type == NodeKind::Block)
                .map(|e| (e.node_id.clone(), e.type_degree as f64))
                .collect(),
            NodeKind::Transaction => store.read(|inner| {
                let mut sample: Vec<(NodeId, f64)> = inner
                    .nodes
                    .values()
                    .filter(|n| n.kind() == NodeKind::Transaction)
                    .map(|n| {
                        let total: u64 = inner
                            .out_edges(&n.id)
                            .filter(|e| e.kind == EdgeKind::TxOutputsAddress)
                            .map(|e| e.weight.unwrap_or(0))
                            .sum();
                        (n.id.clone(), total as f64)
                    })
                    .collect();
                sample.sort_by(|a, b| a.0.cmp(&b.0));
                sample
            }),
            NodeKind::Address => Vec::new(),
        }
    }

    fn compute_stats(sample: &[(NodeId, f64)]) -> SampleStats {
        let n = sample.len();
        let values: Vec<f64> = sample.iter().map(|(_, v)| *v).collect();
        let mean = values.iter().sum::<f64>() / n as f64;
        // Population standard deviation: the sample IS the population
        // (every node currently in the graph).
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std_dev = variance.sqrt();

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        // Symmetric tail index: k values at each end are beyond the
        // percentile boundary.
        let k = (0.05 * n as f64).floor() as usize;
        let percentile_5 = sorted[k];
        let percentile_95 = sorted[n - 1 - k];

        SampleStats {
            mean,
            std_dev,
            percentile_5,
            percentile_95,
            min: sorted[0],
            max: sorted[n - 1],
        }
    }

    /// Flag |v - mean| > threshold * sigma. Returns (score, high_side).
    fn judge_zscore(value: f64, stats: &SampleStats, threshold: f64) -> Option<(f64, bool)> {
        if stats.std_dev == 0.0 {
            return None;
        }
        let deviation = (value - stats.mean).abs();
        let cut = threshold * stats.std_dev;
        if deviation > cut {
            let score = (100.0 * deviation / cut).min(100.0);
            Some((score, value > stats.mean))
        } else {
            None
        }
    }

    /// Flag v >= p95 or v <= p5; score scales linearly from the boundary
    /// to the sample extreme.
    fn judge_percentile(value: f64, stats: &SampleStats) -> Option<(f64, bool)> {
        if value >= stats.percentile_95 {
            let span = stats.max - stats.percentile_95;
            let score = if span > 0.0 {
                (100.0 * (value - stats.percentile_95) / span).clamp(0.0, 100.0)
            } else {
                100.0
            };
            Some((score, true))
        } else if value <= stats.percentile_5 {
            let span = stats.percentile_5 - stats.min;
            let score = if span > 0.0 {
                (100.0 * (stats.percentile_5 - value) / span).clamp(0.0, 100.0)
            } else {
                100.0
            };
            Some((score, false))
        } else {
            None
        }
    }

    /// Flag v > threshold * mean; score scales linearly from the cut to
    /// the sample max.
    fn judge_threshold(value: f64, stats: &SampleStats, threshold: f64) -> Option<(f64, bool)> {
        let cut = threshold * stats.mean;
        if value > cut {
            let span = stats.max - cut;
            let score = if span > 0.0 {
                (100.0 * (value - cut) / span).clamp(0.0, 100.0)
            } else {
                100.0
            };
            Some((score, true))
        } else {
            None
        }
    }

    fn anomaly_kind(kind: NodeKind, high_side: bool) -> String {
        let metric = match kind {
            NodeKind::Block => "transaction_count",
            _ => "transaction_value",
        };
        let direction = if high_side { "high" } else { "low" };
        format!("{direction}_{metric}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(values: &[f64]) -> Vec<(NodeId, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("block_{i}"), *v))
            .collect()
    }

    #[test]
    fn population_std_and_symmetric_percentiles() {
        let stats = AnomalyDetector::compute_stats(&sample(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]));
        assert_relative_eq!(stats.mean, 5.0);
        assert_relative_eq!(stats.std_dev, 2.0);

        let stats = AnomalyDetector::compute_stats(&sample(
            &(1..=20).map(|v| v as f64).collect::<Vec<_>>(),
        ));
        assert_relative_eq!(stats.percentile_5, 2.0);
        assert_relative_eq!(stats.percentile_95, 19.0);
    }

    #[test]
    fn zscore_flags_the_spike_only() {
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 100.0];
        let stats = AnomalyDetector::compute_stats(&sample(&values));
        assert!(AnomalyDetector::judge_zscore(100.0, &stats, 2.0).is_some());
        assert!(AnomalyDetector::judge_zscore(1.0, &stats, 2.0).is_none());
    }

    #[test]
    fn zscore_with_zero_variance_flags_nothing() {
        let stats = AnomalyDetector::compute_stats(&sample(&[3.0; 12]));
        assert!(AnomalyDetector::judge_zscore(3.0, &stats, 2.0).is_none());
    }

    #[test]
    fn percentile_flags_both_tails() {
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let stats = AnomalyDetector::compute_stats(&sample(&values));
        for v in values {
            let flagged = AnomalyDetector::judge_percentile(v, &stats);
            if v >= 19.0 || v <= 2.0 {
                assert!(flagged.is_some(), "{v} should be flagged");
            } else {
                assert!(flagged.is_none(), "{v} should not be flagged");
            }
        }
        let (max_score, high) = AnomalyDetector::judge_percentile(20.0, &stats).unwrap();
        assert_relative_eq!(max_score, 100.0);
        assert!(high);
        let (_, high) = AnomalyDetector::judge_percentile(1.0, &stats).unwrap();
        assert!(!high);
    }

    #[test]
    fn threshold_scales_from_cut_to_max() {
        let values = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 90.0];
        let stats = AnomalyDetector::compute_stats(&sample(&values));
        // mean = 18, cut = 36
        assert!(AnomalyDetector::judge_threshold(10.0, &stats, 2.0).is_none());
        let (score, _) = AnomalyDetector::judge_threshold(90.0, &stats, 2.0).unwrap();
        assert_relative_eq!(score, 100.0);
    }
}
