use crate::graphs::store::GraphStore;
use crate::types::*;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Community palette, cycled by cluster id.
const CLUSTER_PALETTE: [&str; 10] = [
    "#FF5733", "#33FF57", "#3357FF", "#FF33F5", "#F5FF33", "#33FFF5", "#FF8C33", "#8C33FF",
    "#33FF8C", "#FF338C",
];

pub fn cluster_color(cluster_id: i64) -> String {
    CLUSTER_PALETTE[cluster_id as usize % CLUSTER_PALETTE.len()].to_string()
}

/// Community detection over a windowed, undirected projection of the
/// blockchain graph.
pub struct ClusterDetector;

impl ClusterDetector {
    pub fn detect(store: &GraphStore, kind: ClusterKind, window: u32) -> ClusterReport {
        info!(?kind, window, "clustering windowed subgraph");
        let projection = store.read(|inner| match kind {
            ClusterKind::Address => Self::project_addresses(inner, window),
            ClusterKind::Transaction => Self::project_transactions(inner, window),
        });

        let communities = greedy_modularity_communities(&projection);

        // Singletons are reported as unclustered, not as clusters of
        // size one.
        let mut unclustered: Vec<NodeId> = Vec::new();
        let mut real: Vec<Vec<NodeId>> = Vec::new();
        for community in communities {
            let mut ids: Vec<NodeId> = community
                .into_iter()
                .map(|idx| projection[idx].clone())
                .collect();
            ids.sort();
            if ids.len() == 1 {
                unclustered.extend(ids);
            } else {
                real.push(ids);
            }
        }
        unclustered.sort();

        // Number communities in descending size order; ties break on the
        // smallest member id so the numbering is stable.
        real.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

        let clusters: Vec<ClusterEntry> = real
            .into_iter()
            .enumerate()
            .map(|(i, node_ids)| ClusterEntry {
                cluster_id: i as i64,
                size: node_ids.len(),
                color_hex: cluster_color(i as i64),
                node_ids,
            })
            .collect();

        let nodes_clustered = clusters.iter().map(|c| c.size).sum();
        debug!(
            clusters = clusters.len(),
            nodes_clustered,
            unclustered = unclustered.len(),
            "clustering finished"
        );
        ClusterReport {
            total_clusters: clusters.len(),
            nodes_clustered,
            clusters,
            cluster_type: kind,
            time_window_blocks: window,
            unclustered,
        }
    }

    /// Transactions whose containing block height falls in the trailing
    /// window `[latest - window + 1, latest]`.
    fn window_transactions<'a>(
        inner: &'a crate::graphs::store::GraphInner,
        window: u32,
    ) -> Vec<&'a GraphNode> {
        let Some(latest) = inner.latest_block_height() else {
            return Vec::new();
        };
        let min_height = (latest + 1).saturating_sub(window as u64);
        let mut txs: Vec<&GraphNode> = inner
            .nodes
            .values()
            .filter(|n| match &n.payload {
                NodePayload::Transaction(t) => {
                    t.block_height >= min_height && t.block_height <= latest
                }
                _ => false,
            })
            .collect();
        txs.sort_by(|a, b| a.id.cmp(&b.id));
        txs
    }

    /// Undirected projection linking two addresses that co-occur on one
    /// transaction: input with input, or input with output. Two outputs
    /// of the same transaction are NOT linked: receiving from the same
    /// payer is not evidence the recipients are related.
    fn project_addresses(
        inner: &crate::graphs::store::GraphInner,
        window: u32,
    ) -> UnGraph<NodeId, ()> {
        let mut graph = UnGraph::new_undirected();
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut linked: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();

        for tx in Self::window_transactions(inner, window) {
            let inputs: Vec<&NodeId> = inner
                .in_edges(&tx.id)
                .filter(|e| e.kind == EdgeKind::AddressInputsTx)
                .map(|e| &e.source)
                .collect();
            let outputs: Vec<&NodeId> = inner
                .out_edges(&tx.id)
                .filter(|e| e.kind == EdgeKind::TxOutputsAddress)
                .map(|e| &e.target)
                .collect();

            let mut index_of = |graph: &mut UnGraph<NodeId, ()>, id: &NodeId| {
                *indices
                    .entry(id.clone())
                    .or_insert_with(|| graph.add_node(id.clone()))
            };
            for &id in inputs.iter().chain(outputs.iter()) {
                index_of(&mut graph, id);
            }

            let mut link = |graph: &mut UnGraph<NodeId, ()>, a: NodeIndex, b: NodeIndex| {
                if a == b {
                    return;
                }
                let key = (a.min(b), a.max(b));
                if linked.insert(key) {
                    graph.add_edge(a, b, ());
                }
            };
            for (i, a) in inputs.iter().enumerate() {
                let ia = indices[*a];
                for b in inputs.iter().skip(i + 1) {
                    link(&mut graph, ia, indices[*b]);
                }
                for b in &outputs {
                    link(&mut graph, ia, indices[*b]);
                }
            }
        }
        graph
    }

    /// Undirected projection linking two transactions that share at
    /// least one address (as input or output on either side).
    fn project_transactions(
        inner: &crate::graphs::store::GraphInner,
        window: u32,
    ) -> UnGraph<NodeId, ()> {
        let mut graph = UnGraph::new_undirected();
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut address_to_txs: HashMap<&NodeId, Vec<NodeIndex>> = HashMap::new();

        for tx in Self::window_transactions(inner, window) {
            let idx = *indices
                .entry(tx.id.clone())
                .or_insert_with(|| graph.add_node(tx.id.clone()));
            let inputs = inner
                .in_edges(&tx.id)
                .filter(|e| e.kind == EdgeKind::AddressInputsTx)
                .map(|e| &e.source);
            let outputs = inner
                .out_edges(&tx.id)
                .filter(|e| e.kind == EdgeKind::TxOutputsAddress)
                .map(|e| &e.target);
            for addr in inputs.chain(outputs) {
                let txs = address_to_txs.entry(addr).or_default();
                if !txs.contains(&idx) {
                    txs.push(idx);
                }
            }
        }

        let mut linked: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
        for txs in address_to_txs.values() {
            for (i, &a) in txs.iter().enumerate() {
                for &b in txs.iter().skip(i + 1) {
                    let key = (a.min(b), a.max(b));
                    if linked.insert(key) {
                        graph.add_edge(a, b, ());
                    }
                }
            }
        }
        graph
    }
}

/// Greedy modularity maximization (CNM-style agglomeration): start with
/// every node in its own community and repeatedly merge the pair with
/// the largest positive modularity gain
/// `dQ = e12/m - d1*d2/(2*m^2)` until no merge improves modularity.
/// Tie-breaks prefer the lexicographically smallest community pair so
/// the result is deterministic.
fn greedy_modularity_communities(graph: &UnGraph<NodeId, ()>) -> Vec<Vec<NodeIndex>> {
    let node_count = graph.node_count();
    let m = graph.edge_count() as f64;
    if node_count == 0 {
        return Vec::new();
    }
    if m == 0.0 {
        return graph.node_indices().map(|i| vec![i]).collect();
    }

    let mut members: HashMap<usize, Vec<NodeIndex>> = graph
        .node_indices()
        .map(|i| (i.index(), vec![i]))
        .collect();
    let mut degree: HashMap<usize, f64> = graph
        .node_indices()
        .map(|i| (i.index(), graph.edges(i).count() as f64))
        .collect();
    let mut between: HashMap<(usize, usize), f64> = HashMap::new();
    for edge in graph.edge_indices() {
        let (a, b) = graph.edge_endpoints(edge).expect("edge endpoints");
        let (a, b) = (a.index(), b.index());
        if a != b {
            *between.entry((a.min(b), a.max(b))).or_default() += 1.0;
        }
    }

    loop {
        let mut best: Option<((usize, usize), f64)> = None;
        for (&pair, &e12) in &between {
            let dq = e12 / m - degree[&pair.0] * degree[&pair.1] / (2.0 * m * m);
            let better = match best {
                None => true,
                Some((best_pair, best_dq)) => {
                    dq > best_dq || (dq == best_dq && pair < best_pair)
                }
            };
            if better {
                best = Some((pair, dq));
            }
        }
        let Some(((keep, fold), dq)) = best else { break };
        if dq <= 0.0 {
            break;
        }

        let moved = members.remove(&fold).expect("community members");
        members.get_mut(&keep).expect("community members").extend(moved);
        let folded_degree = degree.remove(&fold).expect("community degree");
        *degree.get_mut(&keep).expect("community degree") += folded_degree;

        let affected: Vec<((usize, usize), f64)> = between
            .iter()
            .filter(|((a, b), _)| *a == fold || *b == fold)
            .map(|(k, v)| (*k, *v))
            .collect();
        for (key, weight) in affected {
            between.remove(&key);
            let other = if key.0 == fold { key.1 } else { key.0 };
            if other == keep {
                continue; // now internal to the merged community
            }
            *between
                .entry((keep.min(other), keep.max(other)))
                .or_default() += weight;
        }
    }

    let mut communities: Vec<Vec<NodeIndex>> = members.into_values().collect();
    for community in &mut communities {
        community.sort();
    }
    communities.sort_by_key(|c| c[0]);
    communities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_disjoint_triangles_form_two_communities() {
        let mut graph: UnGraph<NodeId, ()> = UnGraph::new_undirected();
        let nodes: Vec<NodeIndex> = (0..6).map(|i| graph.add_node(format!("addr_{i}"))).collect();
        for (a, b) in [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)] {
            graph.add_edge(nodes[a], nodes[b], ());
        }
        let mut communities = greedy_modularity_communities(&graph);
        communities.retain(|c| c.len() > 1);
        assert_eq!(communities.len(), 2);
        assert!(communities.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn edgeless_projection_is_all_singletons() {
        let mut graph: UnGraph<NodeId, ()> = UnGraph::new_undirected();
        for i in 0..4 {
            graph.add_node(format!("addr_{i}"));
        }
        let communities = greedy_modularity_communities(&graph);
        assert_eq!(communities.len(), 4);
        assert!(communities.iter().all(|c| c.len() == 1));
    }
}
