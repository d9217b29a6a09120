use crate::graphs::store::GraphStore;
use crate::types::*;
use std::collections::HashMap;
use tracing::debug;

/// Structural degree metrics, computed in one pass over nodes and edges.
pub struct DegreeAnalyzer;

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    incoming: usize,
    outgoing: usize,
    block_contains: usize,
    tx_inputs: usize,
    tx_outputs: usize,
}

impl DegreeAnalyzer {
    /// Compute in/out/total degree plus the per-kind `type_degree` for
    /// every node. No node is skipped; isolated nodes report zeros.
    ///
    /// `type_degree` per node kind:
    /// - Block: outgoing `block_tx` edges (transactions it contains)
    /// - Transaction: incoming `tx_input` + outgoing `tx_output` edges
    /// - Address: all incident edges (its UTxO activity count)
    pub fn compute(store: &GraphStore) -> Vec<DegreeEntry> {
        store.read(|inner| {
            let mut tallies: HashMap<&str, Tally> = HashMap::with_capacity(inner.nodes.len());

            for edge in &inner.edges {
                let source = tallies.entry(edge.source.as_str()).or_default();
                source.outgoing += 1;
                match edge.kind {
                    EdgeKind::BlockContainsTx => source.block_contains += 1,
                    EdgeKind::TxOutputsAddress => source.tx_outputs += 1,
                    EdgeKind::AddressInputsTx => {}
                }
                let target = tallies.entry(edge.target.as_str()).or_default();
                target.incoming += 1;
                if edge.kind == EdgeKind::AddressInputsTx {
                    target.tx_inputs += 1;
                }
            }

            let mut entries: Vec<DegreeEntry> = inner
                .nodes
                .values()
                .map(|node| {
                    let tally = tallies.get(node.id.as_str()).copied().unwrap_or_default();
                    let type_degree = match node.kind() {
                        NodeKind::Block => tally.block_contains,
                        NodeKind::Transaction => tally.tx_inputs + tally.tx_outputs,
                        NodeKind::Address => tally.incoming + tally.outgoing,
                    };
                    DegreeEntry {
                        node_id: node.id.clone(),
                        node_type: node.kind(),
                        in_degree: tally.incoming,
                        out_degree: tally.outgoing,
                        total_degree: tally.incoming + tally.outgoing,
                        type_degree,
                    }
                })
                .collect();
            entries.sort_by(|a, b| a.node_id.cmp(&b.node_id));

            debug!(nodes = entries.len(), "degree metrics computed");
            entries
        })
    }
}
