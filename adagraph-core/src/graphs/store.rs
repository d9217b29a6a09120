use crate::error::AnalyticsError;
use crate::types::*;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Observer contract for graph mutations. Invoked synchronously, after
/// the store's write lock is released but before the mutation call
/// returns, so the caller never observes a half-updated graph with
/// stale-but-clean metrics.
pub trait GraphListener: Send + Sync {
    fn on_mutation(&self, changed: &[NodeId], families: &[MetricFamily]);
}

/// Adjacency-indexed storage. Edges live in one arena; the per-node
/// incoming/outgoing maps hold indices into it, so address↔transaction
/// back-references never form owning cycles.
#[derive(Default)]
pub(crate) struct GraphInner {
    pub nodes: HashMap<NodeId, GraphNode>,
    pub edges: Vec<GraphEdge>,
    edge_index: HashMap<(NodeId, NodeId, EdgeKind), usize>,
    outgoing: HashMap<NodeId, Vec<usize>>,
    incoming: HashMap<NodeId, Vec<usize>>,
}

impl GraphInner {
    pub fn out_edges(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    pub fn in_edges(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    pub fn latest_block_height(&self) -> Option<u64> {
        self.nodes
            .values()
            .filter_map(|n| match &n.payload {
                NodePayload::Block(b) => Some(b.block_height),
                _ => None,
            })
            .max()
    }
}

/// The single source of truth for graph topology. Mutation is
/// single-writer (the ingestion collaborator); queries are read-mostly
/// and may run concurrently. Derived attributes are written back through
/// the `apply_*` methods, which take a fully built result set and swap
/// it in under one write lock.
pub struct GraphStore {
    inner: RwLock<GraphInner>,
    listeners: RwLock<Vec<Arc<dyn GraphListener>>>,
    last_update: RwLock<Option<chrono::DateTime<Utc>>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            listeners: RwLock::new(Vec::new()),
            last_update: RwLock::new(None),
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn GraphListener>) {
        self.listeners.write().push(listener);
    }

    fn notify(&self, changed: &[NodeId]) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_mutation(changed, &MetricFamily::ALL);
        }
    }

    fn touch(&self) {
        *self.last_update.write() = Some(Utc::now());
    }

    // ===== MUTATION API (ingestion collaborator only) =====

    /// Add a node, or update its payload if the id already exists.
    /// Re-adding never duplicates and never resets derived metrics.
    pub fn add_node(&self, id: impl Into<NodeId>, payload: NodePayload) {
        let id = id.into();
        {
            let mut inner = self.inner.write();
            match inner.nodes.get_mut(&id) {
                Some(existing) => {
                    existing.label = payload.display_label();
                    existing.payload = payload;
                }
                None => {
                    let node = GraphNode::new(id.clone(), payload);
                    inner.nodes.insert(id.clone(), node);
                }
            }
        }
        self.touch();
        self.notify(std::slice::from_ref(&id));
    }

    /// Add an edge. Both endpoints must already exist; the tuple
    /// (source, target, kind) is unique and re-adding it is a no-op.
    pub fn add_edge(
        &self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        kind: EdgeKind,
        weight: Option<u64>,
    ) -> Result<(), AnalyticsError> {
        let source = source.into();
        let target = target.into();
        let inserted = {
            let mut inner = self.inner.write();
            for endpoint in [&source, &target] {
                if !inner.nodes.contains_key(endpoint.as_str()) {
                    return Err(AnalyticsError::GraphIntegrity {
                        src: source.clone(),
                        target: target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            let key = (source.clone(), target.clone(), kind);
            if inner.edge_index.contains_key(&key) {
                false
            } else {
                let index = inner.edges.len();
                inner.edges.push(GraphEdge {
                    source: source.clone(),
                    target: target.clone(),
                    kind,
                    weight,
                });
                inner.edge_index.insert(key, index);
                inner.outgoing.entry(source.clone()).or_default().push(index);
                inner.incoming.entry(target.clone()).or_default().push(index);
                true
            }
        };
        if inserted {
            debug!(%source, %target, kind = %kind, "edge added");
            self.touch();
            self.notify(&[source, target]);
        }
        Ok(())
    }

    // ===== QUERY API =====

    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        self.inner.read().nodes.get(id).cloned()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.inner.read().nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// Neighbor ids in the given direction, optionally restricted to one
    /// edge kind. Deduplicated, order of first encounter.
    pub fn neighbors(
        &self,
        id: &str,
        direction: Direction,
        kind_filter: Option<EdgeKind>,
    ) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut visit = |other: &NodeId| {
            if seen.insert(other.clone()) {
                result.push(other.clone());
            }
        };
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            for edge in inner.out_edges(id) {
                if kind_filter.map_or(true, |k| k == edge.kind) {
                    visit(&edge.target);
                }
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            for edge in inner.in_edges(id) {
                if kind_filter.map_or(true, |k| k == edge.kind) {
                    visit(&edge.source);
                }
            }
        }
        result
    }

    pub fn all_nodes(&self, kind_filter: Option<NodeKind>) -> Vec<GraphNode> {
        self.inner
            .read()
            .nodes
            .values()
            .filter(|n| kind_filter.map_or(true, |k| n.kind() == k))
            .cloned()
            .collect()
    }

    pub fn all_edges(&self, kind_filter: Option<EdgeKind>) -> Vec<GraphEdge> {
        self.inner
            .read()
            .edges
            .iter()
            .filter(|e| kind_filter.map_or(true, |k| e.kind == k))
            .cloned()
            .collect()
    }

    pub fn subgraph_where(&self, predicate: impl Fn(&GraphNode) -> bool) -> Vec<GraphNode> {
        self.inner
            .read()
            .nodes
            .values()
            .filter(|n| predicate(n))
            .cloned()
            .collect()
    }

    pub fn latest_block_height(&self) -> Option<u64> {
        self.inner.read().latest_block_height()
    }

    pub fn last_update(&self) -> Option<chrono::DateTime<Utc>> {
        *self.last_update.read()
    }

    /// Run a closure against the raw adjacency structure under a read
    /// lock. Used by the analyzers to avoid cloning the whole graph.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&GraphInner) -> R) -> R {
        f(&self.inner.read())
    }

    // ===== DERIVED ATTRIBUTE WRITERS (analytics engine only) =====
    // Each takes a complete result set and applies it under a single
    // write lock, so readers see either the old metrics or the new ones,
    // never a partial mix. None of these notify listeners: derived
    // writes do not invalidate metrics.

    pub fn apply_degrees(&self, entries: &[DegreeEntry]) {
        let mut inner = self.inner.write();
        for entry in entries {
            if let Some(node) = inner.nodes.get_mut(&entry.node_id) {
                node.derived.in_degree = entry.in_degree;
                node.derived.out_degree = entry.out_degree;
                node.derived.total_degree = entry.total_degree;
                node.derived.type_degree = entry.type_degree;
            }
        }
    }

    pub fn apply_activity(&self, entries: &[ActivityEntry], scheme: ColorScheme) {
        let mut inner = self.inner.write();
        for entry in entries {
            if let Some(node) = inner.nodes.get_mut(&entry.node_id) {
                node.derived.activity_score = Some(entry.normalized_value);
                node.derived.color = Some(entry.color_hex.clone());
                node.derived.color_scheme = Some(scheme);
            }
        }
    }

    pub fn apply_anomalies(&self, entries: &[AnomalyEntry]) {
        let mut inner = self.inner.write();
        for node in inner.nodes.values_mut() {
            node.derived.is_anomaly = false;
            node.derived.anomaly_score = 0.0;
            node.derived.anomaly_kind = None;
        }
        for entry in entries {
            if let Some(node) = inner.nodes.get_mut(&entry.node_id) {
                node.derived.is_anomaly = entry.is_anomaly;
                node.derived.anomaly_score = entry.anomaly_score;
                node.derived.anomaly_kind = Some(entry.anomaly_type.clone());
            }
        }
    }

    pub fn apply_clusters(&self, assignments: &HashMap<NodeId, (i64, Option<String>)>) {
        let mut inner = self.inner.write();
        for node in inner.nodes.values_mut() {
            node.derived.cluster_id = None;
            node.derived.cluster_color = None;
        }
        for (id, (cluster_id, color)) in assignments {
            if let Some(node) = inner.nodes.get_mut(id) {
                node.derived.cluster_id = Some(*cluster_id);
                node.derived.cluster_color = color.clone();
            }
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
