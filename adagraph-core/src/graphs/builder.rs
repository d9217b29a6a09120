use crate::error::AnalyticsError;
use crate::graphs::store::GraphStore;
use crate::types::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ingestion-facing wrapper over the store. Translates blockchain
/// entities into prefixed node ids and typed edges, auto-creating
/// address nodes as they are first seen. The ingestion collaborator is
/// expected to hand us referentially valid data; anything else surfaces
/// as a `GraphIntegrityError` for that entity alone.
pub struct GraphBuilder {
    store: Arc<GraphStore>,
}

pub fn block_node_id(block_hash: &str) -> NodeId {
    format!("block_{block_hash}")
}

pub fn tx_node_id(tx_hash: &str) -> NodeId {
    format!("tx_{tx_hash}")
}

pub fn address_node_id(address: &str) -> NodeId {
    format!("addr_{address}")
}

impl GraphBuilder {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Add a block node.
    pub fn add_block(&self, block: Block) {
        let id = block_node_id(&block.block_hash);
        debug!(%id, height = block.block_height, "adding block");
        self.store.add_node(id, NodePayload::Block(block));
    }

    /// Add a transaction node and wire it to its block, input addresses
    /// and output addresses. Missing address nodes are created on the
    /// fly; a missing block node is tolerated (the containment edge is
    /// simply skipped until the block arrives).
    pub fn add_transaction(&self, transaction: Transaction) -> Result<(), AnalyticsError> {
        let tx_id = tx_node_id(&transaction.tx_hash);
        let attrs = TxAttrs {
            tx_hash: transaction.tx_hash.clone(),
            block_hash: transaction.block_hash.clone(),
            block_height: transaction.block_height,
            fee: transaction.fee,
            total_output: transaction.total_output(),
            input_count: transaction.inputs.len() as u32,
            output_count: transaction.outputs.len() as u32,
            timestamp: transaction.timestamp,
        };
        self.store
            .add_node(tx_id.clone(), NodePayload::Transaction(attrs));

        let block_id = block_node_id(&transaction.block_hash);
        if self.store.contains_node(&block_id) {
            self.store
                .add_edge(block_id, tx_id.clone(), EdgeKind::BlockContainsTx, None)?;
        } else {
            warn!(%tx_id, block = %transaction.block_hash, "containing block not in graph yet");
        }

        for input in &transaction.inputs {
            let Some(address) = &input.address else {
                continue;
            };
            let addr_id = address_node_id(address);
            if !self.store.contains_node(&addr_id) {
                self.add_address(Address::new(address.clone(), transaction.timestamp));
            }
            self.store
                .add_edge(addr_id, tx_id.clone(), EdgeKind::AddressInputsTx, None)?;
        }

        for output in &transaction.outputs {
            let addr_id = address_node_id(&output.address);
            if !self.store.contains_node(&addr_id) {
                let mut addr = Address::new(output.address.clone(), transaction.timestamp);
                addr.total_received = output.amount;
                addr.transaction_count = 1;
                self.add_address(addr);
            }
            self.store.add_edge(
                tx_id.clone(),
                addr_id,
                EdgeKind::TxOutputsAddress,
                Some(output.amount),
            )?;
        }

        Ok(())
    }

    /// Add an address node, aggregating statistics if it already exists.
    pub fn add_address(&self, address: Address) {
        let id = address_node_id(&address.address);
        let payload = match self.store.get_node(&id) {
            Some(existing) => {
                let NodePayload::Address(prev) = existing.payload else {
                    // Id prefixes keep kinds disjoint, so this cannot
                    // happen with well-formed input.
                    warn!(%id, "address id collides with non-address node");
                    return;
                };
                NodePayload::Address(Address {
                    address: address.address,
                    first_seen: prev.first_seen.or(address.first_seen),
                    total_received: prev.total_received + address.total_received,
                    total_sent: prev.total_sent + address.total_sent,
                    transaction_count: prev.transaction_count + address.transaction_count,
                })
            }
            None => NodePayload::Address(address),
        };
        self.store.add_node(id, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(hash: &str, block: &str, height: u64, inputs: &[&str], outputs: &[(&str, u64)]) -> Transaction {
        Transaction {
            tx_hash: hash.to_string(),
            block_hash: block.to_string(),
            block_height: height,
            inputs: inputs
                .iter()
                .map(|a| TxInput {
                    tx_hash: "prev".into(),
                    index: 0,
                    address: Some(a.to_string()),
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|(a, v)| TxOutput {
                    address: a.to_string(),
                    amount: *v,
                })
                .collect(),
            fee: Some(170_000),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn transaction_wires_block_inputs_and_outputs() {
        let store = Arc::new(GraphStore::new());
        let builder = GraphBuilder::new(store.clone());
        builder.add_block(Block {
            block_hash: "b1".into(),
            block_height: 100,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            slot: None,
            tx_count: Some(1),
        });
        builder
            .add_transaction(tx("t1", "b1", 100, &["alice"], &[("bob", 500), ("carol", 300)]))
            .unwrap();

        assert_eq!(store.node_count(), 5);
        assert_eq!(store.edge_count(), 4);
        assert_eq!(
            store.neighbors("tx_t1", Direction::Outgoing, Some(EdgeKind::TxOutputsAddress)),
            vec!["addr_bob".to_string(), "addr_carol".to_string()]
        );
        let output = store
            .all_edges(Some(EdgeKind::TxOutputsAddress))
            .into_iter()
            .find(|e| e.target == "addr_bob")
            .unwrap();
        assert_eq!(output.weight, Some(500));
    }

    #[test]
    fn re_added_address_aggregates_statistics() {
        let store = Arc::new(GraphStore::new());
        let builder = GraphBuilder::new(store.clone());
        let mut first = Address::new("alice", None);
        first.total_received = 100;
        first.transaction_count = 1;
        builder.add_address(first);
        let mut second = Address::new("alice", None);
        second.total_received = 50;
        second.total_sent = 20;
        second.transaction_count = 2;
        builder.add_address(second);

        let node = store.get_node("addr_alice").unwrap();
        let NodePayload::Address(addr) = node.payload else {
            panic!("expected address payload");
        };
        assert_eq!(addr.total_received, 150);
        assert_eq!(addr.total_sent, 20);
        assert_eq!(addr.transaction_count, 3);
        assert!(node.label.contains("(tx: 3)"));
    }
}
