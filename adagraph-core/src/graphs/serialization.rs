use crate::graphs::store::GraphStore;
use crate::types::*;
use anyhow::Result;

/// Format a lovelace amount for display: whole-ADA amounts are shown in
/// ADA, smaller ones in raw lovelace.
pub fn format_lovelace(amount: u64) -> String {
    if amount >= 1_000_000 {
        format!("{:.2} ADA", amount as f64 / 1_000_000.0)
    } else {
        format!("{amount} L")
    }
}

fn edge_label(edge: &GraphEdge) -> String {
    match edge.kind {
        EdgeKind::BlockContainsTx => "contains".to_string(),
        EdgeKind::AddressInputsTx => "input".to_string(),
        EdgeKind::TxOutputsAddress => format_lovelace(edge.weight.unwrap_or(0)),
    }
}

/// Sort key for snapshot output: blocks by height first, then
/// transactions, then addresses, each ordered by id so snapshots diff
/// cleanly.
fn node_sort_key(node: &GraphNode) -> (u8, u64, &str) {
    match &node.payload {
        NodePayload::Block(b) => (0, b.block_height, node.id.as_str()),
        NodePayload::Transaction(t) => (1, t.block_height, node.id.as_str()),
        NodePayload::Address(_) => (2, 0, node.id.as_str()),
    }
}

impl GraphStore {
    /// Build the serialization-ready snapshot: sorted nodes, labelled
    /// edges, and graph-level metadata.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut nodes = self.all_nodes(None);
        nodes.sort_by(|a, b| node_sort_key(a).cmp(&node_sort_key(b)));

        let mut edges: Vec<SnapshotEdge> = self
            .all_edges(None)
            .iter()
            .map(|e| SnapshotEdge {
                from: e.source.clone(),
                to: e.target.clone(),
                kind: e.kind,
                label: edge_label(e),
                weight: e.weight,
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));

        GraphSnapshot {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: SnapshotMetadata {
                node_count: nodes.len(),
                edge_count: edges.len(),
                latest_block_height: self.latest_block_height(),
                last_update: self.last_update(),
            },
            nodes,
            edges,
        }
    }

    pub fn save_to_json(&self, path: &str) -> Result<()> {
        let snapshot = self.to_snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Rebuild a store from a snapshot. Derived metrics present in the
    /// snapshot are discarded; analytics recomputes them from topology.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let store = GraphStore::new();
        for node in snapshot.nodes {
            store.add_node(node.id, node.payload);
        }
        for edge in snapshot.edges {
            store.add_edge(edge.from, edge.to, edge.kind, edge.weight)?;
        }
        Ok(store)
    }

    pub fn load_from_json(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: GraphSnapshot = serde_json::from_str(&contents)?;
        Ok(Self::from_snapshot(snapshot)?)
    }
}
