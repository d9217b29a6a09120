use crate::error::AnalyticsError;
use crate::graphs::store::{GraphInner, GraphStore};
use crate::types::*;
use std::collections::HashSet;
use tracing::debug;

/// Bounded-depth enumeration of value-flow paths, alternating
/// address -> transaction -> address hops through recent blocks.
pub struct FlowPathFinder;

struct SearchContext<'a> {
    inner: &'a GraphInner,
    window_txs: HashSet<&'a str>,
    max_depth: usize,
    cap: usize,
}

#[derive(Default)]
struct PathState {
    nodes: Vec<NodeId>,
    edges: Vec<FlowEdge>,
    visited: HashSet<NodeId>,
    total_value: u64,
}

impl PathState {
    fn hops(&self) -> usize {
        self.edges.len()
    }

    fn push(&mut self, to: NodeId, value: u64) {
        let from = self.nodes.last().expect("path has a seed").clone();
        self.edges.push(FlowEdge {
            from,
            to: to.clone(),
            value,
        });
        self.total_value += value;
        self.visited.insert(to.clone());
        self.nodes.push(to);
    }

    fn pop(&mut self) {
        let node = self.nodes.pop().expect("pop below seed");
        self.visited.remove(&node);
        let edge = self.edges.pop().expect("pop below seed");
        self.total_value -= edge.value;
    }
}

#[derive(Default)]
struct SearchResults {
    paths: Vec<FlowPath>,
    truncated: bool,
}

impl SearchResults {
    fn full(&self, cap: usize) -> bool {
        self.paths.len() >= cap
    }

    fn emit(&mut self, path: &PathState, is_complete: bool, cap: usize) {
        if self.full(cap) {
            self.truncated = true;
            return;
        }
        self.paths.push(FlowPath {
            path_nodes: path.nodes.clone(),
            path_edges: path.edges.clone(),
            total_value: path.total_value,
            path_length: path.hops(),
            is_complete,
        });
        if self.full(cap) {
            self.truncated = true;
        }
    }
}

impl FlowPathFinder {
    /// Enumerate flow paths for a validated query. The caller (engine)
    /// has already checked parameter ranges and seed exclusivity.
    pub fn find(
        store: &GraphStore,
        query: &FlowQuery,
        cap: usize,
    ) -> Result<FlowReport, AnalyticsError> {
        store.read(|inner| {
            let window_txs = Self::window_transactions(inner, query.max_blocks);
            let ctx = SearchContext {
                inner,
                window_txs,
                max_depth: query.max_depth as usize,
                cap,
            };
            let mut results = SearchResults::default();

            if let Some(seed) = &query.start_address {
                let node = inner
                    .nodes
                    .get(seed)
                    .ok_or_else(|| AnalyticsError::NotFound(seed.clone()))?;
                if node.kind() != NodeKind::Address {
                    return Err(AnalyticsError::invalid_parameter(
                        "start_address",
                        format!("'{seed}' is not an address node"),
                    ));
                }
                let mut path = PathState::default();
                path.visited.insert(seed.clone());
                path.nodes.push(seed.clone());
                Self::extend_from_address(&ctx, seed, &mut path, &mut results);
            } else if let Some(seed) = &query.transaction_id {
                let node = inner
                    .nodes
                    .get(seed)
                    .ok_or_else(|| AnalyticsError::NotFound(seed.clone()))?;
                if node.kind() != NodeKind::Transaction {
                    return Err(AnalyticsError::invalid_parameter(
                        "transaction_id",
                        format!("'{seed}' is not a transaction node"),
                    ));
                }
                Self::paths_through_transaction(&ctx, seed, &mut results);
            }

            // Highest-value paths first; on cap truncation this is what
            // makes the kept subset meaningful rather than arbitrary.
            results.paths.sort_by(|a, b| {
                b.total_value
                    .cmp(&a.total_value)
                    .then_with(|| a.path_nodes.cmp(&b.path_nodes))
            });

            debug!(
                paths = results.paths.len(),
                truncated = results.truncated,
                "flow search finished"
            );
            Ok(FlowReport {
                paths: results.paths,
                max_depth: query.max_depth,
                max_blocks: query.max_blocks,
                truncated: results.truncated,
            })
        })
    }

    /// Ids of transactions whose containing block height falls in the
    /// trailing `max_blocks` window.
    fn window_transactions(inner: &GraphInner, max_blocks: u32) -> HashSet<&str> {
        let Some(latest) = inner.latest_block_height() else {
            return HashSet::new();
        };
        let min_height = (latest + 1).saturating_sub(max_blocks as u64);
        inner
            .nodes
            .values()
            .filter(|n| match &n.payload {
                NodePayload::Transaction(t) => {
                    t.block_height >= min_height && t.block_height <= latest
                }
                _ => false,
            })
            .map(|n| n.id.as_str())
            .collect()
    }

    /// DFS step at an address node. Tries every
    /// address -> transaction -> address extension; when none applies
    /// the accumulated path is emitted (dead end: complete; depth
    /// ceiling: incomplete).
    fn extend_from_address(
        ctx: &SearchContext<'_>,
        address: &str,
        path: &mut PathState,
        results: &mut SearchResults,
    ) {
        if results.full(ctx.cap) {
            return;
        }
        let mut extended = false;
        let mut depth_blocked = false;

        let mut spend_edges: Vec<&GraphEdge> = ctx
            .inner
            .out_edges(address)
            .filter(|e| e.kind == EdgeKind::AddressInputsTx)
            .collect();
        spend_edges.sort_by(|a, b| a.target.cmp(&b.target));

        for spend in spend_edges {
            let tx_id = &spend.target;
            if !ctx.window_txs.contains(tx_id.as_str()) || path.visited.contains(tx_id) {
                continue;
            }
            let mut output_edges: Vec<&GraphEdge> = ctx
                .inner
                .out_edges(tx_id)
                .filter(|e| e.kind == EdgeKind::TxOutputsAddress)
                .collect();
            output_edges.sort_by(|a, b| a.target.cmp(&b.target));

            for output in output_edges {
                if path.visited.contains(&output.target) {
                    continue;
                }
                if path.hops() + 2 > ctx.max_depth {
                    depth_blocked = true;
                    continue;
                }
                extended = true;
                let next = output.target.clone();
                path.push(tx_id.clone(), 0);
                path.push(next.clone(), output.weight.unwrap_or(0));
                Self::extend_from_address(ctx, &next, path, results);
                path.pop();
                path.pop();
                if results.full(ctx.cap) {
                    return;
                }
            }
        }

        if !extended && path.hops() >= 2 {
            results.emit(path, !depth_blocked, ctx.cap);
        }
    }

    /// Transaction seeds enumerate `input_addr -> tx -> output_addr...`
    /// paths with the seed transaction fixed as the first hop, one path
    /// family per input address.
    fn paths_through_transaction(
        ctx: &SearchContext<'_>,
        tx_id: &str,
        results: &mut SearchResults,
    ) {
        if !ctx.window_txs.contains(tx_id) {
            return;
        }
        let mut input_addrs: Vec<&NodeId> = ctx
            .inner
            .in_edges(tx_id)
            .filter(|e| e.kind == EdgeKind::AddressInputsTx)
            .map(|e| &e.source)
            .collect();
        input_addrs.sort();
        input_addrs.dedup();

        for input in input_addrs {
            let mut path = PathState::default();
            path.visited.insert(input.clone());
            path.nodes.push(input.clone());
            path.push(tx_id.to_string(), 0);

            let mut output_edges: Vec<&GraphEdge> = ctx
                .inner
                .out_edges(tx_id)
                .filter(|e| e.kind == EdgeKind::TxOutputsAddress)
                .collect();
            output_edges.sort_by(|a, b| a.target.cmp(&b.target));

            for output in output_edges {
                if path.visited.contains(&output.target) || path.hops() + 1 > ctx.max_depth {
                    continue;
                }
                let next = output.target.clone();
                path.push(next.clone(), output.weight.unwrap_or(0));
                Self::extend_from_address(ctx, &next, &mut path, results);
                path.pop();
                if results.full(ctx.cap) {
                    return;
                }
            }
        }
    }
}
