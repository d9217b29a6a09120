use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AnalyticsError;

/// Node identifiers are content-derived strings: `block_<hash>`,
/// `tx_<hash>`, `addr_<bech32>`. Prefixes keep the three id spaces
/// disjoint even when upstream hashes collide across kinds.
pub type NodeId = String;

/// The schema version stamped on every snapshot output.
/// Bump this when the output shape changes.
pub const SCHEMA_VERSION: &str = "0.1.0";

// ===== DOMAIN MODELS =====
// These mirror what the ingestion collaborator hands us. Payload data is
// authoritative and never touched by the analytics engine.

/// A block on the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub block_hash: String,
    pub block_height: u64,
    pub timestamp: DateTime<Utc>,
    pub slot: Option<u64>,
    pub tx_count: Option<u32>,
}

/// A transaction input (UTxO reference). The referenced output's address
/// is carried along for graph wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_hash: String,
    pub index: u32,
    pub address: Option<String>,
}

/// A transaction output: recipient address and amount in lovelace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

/// A full transaction as delivered by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_hash: String,
    pub block_hash: String,
    pub block_height: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Sum of all output amounts in lovelace.
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}

/// An address that can send or receive value. Statistics aggregate as the
/// same address is seen again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub address: String,
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_received: u64,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub transaction_count: u32,
}

impl Address {
    pub fn new(address: impl Into<String>, first_seen: Option<DateTime<Utc>>) -> Self {
        Self {
            address: address.into(),
            first_seen,
            total_received: 0,
            total_sent: 0,
            transaction_count: 0,
        }
    }
}

// ===== GRAPH NODE / EDGE TYPES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Block,
    Transaction,
    Address,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Block => "block",
            NodeKind::Transaction => "transaction",
            NodeKind::Address => "address",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AnalyticsError> {
        match s {
            "block" => Ok(NodeKind::Block),
            "transaction" => Ok(NodeKind::Transaction),
            "address" => Ok(NodeKind::Address),
            other => Err(AnalyticsError::invalid_parameter(
                "node_type",
                format!("unknown node type '{other}'"),
            )),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge kinds serialize as the wire names (`block_tx`, `tx_input`,
/// `tx_output`) the rendering frontend consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    #[serde(rename = "block_tx")]
    BlockContainsTx,
    #[serde(rename = "tx_input")]
    AddressInputsTx,
    #[serde(rename = "tx_output")]
    TxOutputsAddress,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::BlockContainsTx => "block_tx",
            EdgeKind::AddressInputsTx => "tx_input",
            EdgeKind::TxOutputsAddress => "tx_output",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-node-type attribute payload. Block and Address carry their domain
/// models directly; Transaction is condensed to the fields analytics
/// needs (the full input/output lists live on the edges).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodePayload {
    Block(Block),
    Transaction(TxAttrs),
    Address(Address),
}

/// Condensed transaction attributes stored on the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxAttrs {
    pub tx_hash: String,
    pub block_hash: String,
    pub block_height: u64,
    pub fee: Option<u64>,
    pub total_output: u64,
    pub input_count: u32,
    pub output_count: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Block(_) => NodeKind::Block,
            NodePayload::Transaction(_) => NodeKind::Transaction,
            NodePayload::Address(_) => NodeKind::Address,
        }
    }

    /// Human-readable label for rendering.
    pub fn display_label(&self) -> String {
        match self {
            NodePayload::Block(b) => format!("Block {}", b.block_height),
            NodePayload::Transaction(t) => {
                let prefix: String = t.tx_hash.chars().take(16).collect();
                format!("Tx {prefix}...")
            }
            NodePayload::Address(a) => {
                let prefix: String = a.address.chars().take(16).collect();
                let shortened = if a.address.chars().count() > 16 {
                    format!("{prefix}...")
                } else {
                    a.address.clone()
                };
                if a.transaction_count > 0 {
                    format!("{shortened} (tx: {})", a.transaction_count)
                } else {
                    shortened
                }
            }
        }
    }
}

/// Derived analytics attributes. Created and overwritten only by the
/// analytics engine; payload data stays untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_degree: usize,
    pub type_degree: usize,
    pub activity_score: Option<f64>,
    pub color: Option<String>,
    pub color_scheme: Option<ColorScheme>,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub anomaly_kind: Option<String>,
    pub cluster_id: Option<i64>,
    pub cluster_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    #[serde(flatten)]
    pub payload: NodePayload,
    #[serde(default)]
    pub derived: DerivedMetrics,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, payload: NodePayload) -> Self {
        let label = payload.display_label();
        Self {
            id: id.into(),
            label,
            payload,
            derived: DerivedMetrics::default(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Lovelace moved, present on `tx_output` edges only.
    pub weight: Option<u64>,
}

/// Traversal direction for neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

// ===== METRIC FAMILIES & QUERY PARAMETERS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFamily {
    Degree,
    Activity,
    Anomaly,
    Cluster,
    Flow,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 5] = [
        MetricFamily::Degree,
        MetricFamily::Activity,
        MetricFamily::Anomaly,
        MetricFamily::Cluster,
        MetricFamily::Flow,
    ];
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricFamily::Degree => "degree",
            MetricFamily::Activity => "activity",
            MetricFamily::Anomaly => "anomaly",
            MetricFamily::Cluster => "cluster",
            MetricFamily::Flow => "flow",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Heatmap,
    Activity,
    Grayscale,
}

impl ColorScheme {
    pub fn parse(s: &str) -> Result<Self, AnalyticsError> {
        match s {
            "heatmap" => Ok(ColorScheme::Heatmap),
            "activity" => Ok(ColorScheme::Activity),
            "grayscale" => Ok(ColorScheme::Grayscale),
            other => Err(AnalyticsError::invalid_parameter(
                "color_scheme",
                format!("unknown color scheme '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyMethod {
    ZScore,
    #[default]
    Percentile,
    Threshold,
}

impl AnomalyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyMethod::ZScore => "zscore",
            AnomalyMethod::Percentile => "percentile",
            AnomalyMethod::Threshold => "threshold",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AnalyticsError> {
        match s {
            "zscore" => Ok(AnomalyMethod::ZScore),
            "percentile" => Ok(AnomalyMethod::Percentile),
            "threshold" => Ok(AnomalyMethod::Threshold),
            other => Err(AnalyticsError::invalid_parameter(
                "method",
                format!("unknown detection method '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterKind {
    Address,
    Transaction,
}

impl ClusterKind {
    pub fn parse(s: &str) -> Result<Self, AnalyticsError> {
        match s {
            "address" => Ok(ClusterKind::Address),
            "transaction" => Ok(ClusterKind::Transaction),
            other => Err(AnalyticsError::invalid_parameter(
                "cluster_type",
                format!("unknown cluster type '{other}'"),
            )),
        }
    }
}

/// Common query filter: by node type, by exact id, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub node_type: Option<NodeKind>,
    pub node_id: Option<NodeId>,
}

impl NodeFilter {
    pub fn by_type(kind: NodeKind) -> Self {
        Self {
            node_type: Some(kind),
            node_id: None,
        }
    }

    pub fn by_id(id: impl Into<NodeId>) -> Self {
        Self {
            node_type: None,
            node_id: Some(id.into()),
        }
    }

    pub fn matches(&self, node: &GraphNode) -> bool {
        if let Some(kind) = self.node_type {
            if node.kind() != kind {
                return false;
            }
        }
        if let Some(id) = &self.node_id {
            if &node.id != id {
                return false;
            }
        }
        true
    }
}

/// Flow query parameters. Exactly one of `start_address` /
/// `transaction_id` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowQuery {
    pub start_address: Option<NodeId>,
    pub transaction_id: Option<NodeId>,
    pub max_depth: u32,
    pub max_blocks: u32,
}

impl FlowQuery {
    pub fn from_address(id: impl Into<NodeId>) -> Self {
        Self {
            start_address: Some(id.into()),
            transaction_id: None,
            max_depth: 5,
            max_blocks: 5,
        }
    }

    pub fn from_transaction(id: impl Into<NodeId>) -> Self {
        Self {
            start_address: None,
            transaction_id: Some(id.into()),
            max_depth: 5,
            max_blocks: 5,
        }
    }
}

// ===== QUERY RESPONSE SHAPES =====
// Field-level contract consumed by the transport layer.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegreeEntry {
    pub node_id: NodeId,
    pub node_type: NodeKind,
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_degree: usize,
    pub type_degree: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub node_id: NodeId,
    pub node_type: NodeKind,
    pub raw_value: f64,
    pub normalized_value: f64,
    pub color_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityReport {
    pub metrics: Vec<ActivityEntry>,
    pub color_scheme: ColorScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEntry {
    pub node_id: NodeId,
    pub node_type: NodeKind,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub anomaly_type: String,
    pub actual_value: f64,
}

/// Statistics for one node-type sample, echoed with anomaly responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub node_type: NodeKind,
    pub mean: f64,
    pub std_dev: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<AnomalyEntry>,
    pub statistics: Vec<GroupStatistics>,
    pub method: AnomalyMethod,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub cluster_id: i64,
    pub node_ids: Vec<NodeId>,
    pub size: usize,
    pub color_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterReport {
    pub clusters: Vec<ClusterEntry>,
    pub cluster_type: ClusterKind,
    pub time_window_blocks: u32,
    pub total_clusters: usize,
    pub nodes_clustered: usize,
    /// Singleton communities: present in the window but without repeated
    /// interaction. Reported here instead of as clusters of size one.
    pub unclustered: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPath {
    pub path_nodes: Vec<NodeId>,
    pub path_edges: Vec<FlowEdge>,
    pub total_value: u64,
    pub path_length: usize,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub paths: Vec<FlowPath>,
    pub max_depth: u32,
    pub max_blocks: u32,
    /// True when the exploration cap was hit and only the
    /// highest-value paths are returned.
    pub truncated: bool,
}

// ===== RECALCULATION =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecomputeOutcome {
    Recomputed,
    /// The family could not be recomputed (e.g. insufficient sample, no
    /// default seed). It stays dirty and will be retried on next query.
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculationSummary {
    pub outcomes: Vec<(MetricFamily, RecomputeOutcome)>,
}

impl RecalculationSummary {
    pub fn outcome(&self, family: MetricFamily) -> Option<&RecomputeOutcome> {
        self.outcomes
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, o)| o)
    }
}

// ===== SNAPSHOT FORMAT =====
// The serialization-ready output. Carries a schema version so consumers
// can detect and handle shape changes.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub schema_version: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<SnapshotEdge>,
    pub metadata: SnapshotMetadata,
}

/// Edge with the display label materialized for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub label: String,
    pub weight: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub node_count: usize,
    pub edge_count: usize,
    pub latest_block_height: Option<u64>,
    pub last_update: Option<DateTime<Utc>>,
}
