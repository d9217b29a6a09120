use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use adagraph_core::{
    AnalyticsConfig, AnalyticsEngine, AnomalyMethod, ClusterKind, ColorScheme, FlowQuery,
    GraphStore, NodeFilter, NodeKind,
};

#[derive(Parser)]
#[command(name = "adagraph")]
#[command(about = "Blockchain activity graph analytics over a saved graph snapshot")]
struct Args {
    /// Path to the graph snapshot (JSON) to analyze
    #[arg(short, long)]
    input: String,

    /// Path to custom analytics config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print node/edge counts and the latest block height
    Summary,
    /// Structural degree metrics per node
    Degrees {
        /// Filter by node type: block, transaction or address
        #[arg(long)]
        node_type: Option<String>,
        /// Filter by exact node id
        #[arg(long)]
        node_id: Option<String>,
    },
    /// Normalized activity scores with color mapping
    Activity {
        #[arg(long)]
        node_type: Option<String>,
        /// heatmap, activity or grayscale
        #[arg(long)]
        color_scheme: Option<String>,
    },
    /// Statistically unusual blocks/transactions
    Anomalies {
        #[arg(long)]
        node_type: Option<String>,
        /// zscore, percentile or threshold
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Community clusters over the recent block window
    Clusters {
        /// address or transaction
        #[arg(long)]
        cluster_type: String,
        /// Trailing block window (20-50)
        #[arg(long)]
        time_window_blocks: Option<u32>,
    },
    /// Value-flow paths from a seed address or transaction
    Flow {
        #[arg(long)]
        start_address: Option<String>,
        #[arg(long)]
        transaction_id: Option<String>,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long)]
        max_blocks: Option<u32>,
    },
    /// Force every metric family to recompute
    Recalculate,
}

fn parse_filter(node_type: Option<&str>, node_id: Option<String>) -> Result<NodeFilter> {
    let node_type = node_type.map(NodeKind::parse).transpose()?;
    Ok(NodeFilter { node_type, node_id })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if !Path::new(&args.input).exists() {
        eprintln!("⚠️  Snapshot not found at: {}", args.input);
        eprintln!("   Please check the file path.");
        std::process::exit(1);
    }

    let config = AnalyticsConfig::load_with_fallback(args.config.as_deref());
    let store = Arc::new(
        GraphStore::load_from_json(&args.input)
            .with_context(|| format!("failed to load snapshot from {}", args.input))?,
    );
    let engine = AnalyticsEngine::with_config(store.clone(), config);

    match args.command {
        Command::Summary => {
            println!("📊 Graph summary for {}", args.input);
            println!("   - Nodes: {}", store.node_count());
            println!("   - Edges: {}", store.edge_count());
            match store.latest_block_height() {
                Some(height) => println!("   - Latest block height: {height}"),
                None => println!("   - Latest block height: none (no blocks loaded)"),
            }
        }
        Command::Degrees { node_type, node_id } => {
            let filter = parse_filter(node_type.as_deref(), node_id)?;
            print_json(&engine.degree_metrics(&filter)?)?;
        }
        Command::Activity {
            node_type,
            color_scheme,
        } => {
            let filter = parse_filter(node_type.as_deref(), None)?;
            let scheme = color_scheme
                .as_deref()
                .map(ColorScheme::parse)
                .transpose()?;
            print_json(&engine.activity_metrics(&filter, scheme)?)?;
        }
        Command::Anomalies {
            node_type,
            method,
            threshold,
        } => {
            let filter = parse_filter(node_type.as_deref(), None)?;
            let method = method.as_deref().map(AnomalyMethod::parse).transpose()?;
            print_json(&engine.anomalies(&filter, method, threshold)?)?;
        }
        Command::Clusters {
            cluster_type,
            time_window_blocks,
        } => {
            let kind = ClusterKind::parse(&cluster_type)?;
            print_json(&engine.clusters(kind, time_window_blocks)?)?;
        }
        Command::Flow {
            start_address,
            transaction_id,
            max_depth,
            max_blocks,
        } => {
            let query = FlowQuery {
                start_address,
                transaction_id,
                max_depth: max_depth.unwrap_or(engine.config().default_flow_depth),
                max_blocks: max_blocks.unwrap_or(engine.config().default_flow_blocks),
            };
            print_json(&engine.flow_paths(&query)?)?;
        }
        Command::Recalculate => {
            let summary = engine.recalculate_all();
            println!("✅ Recalculation finished");
            print_json(&summary)?;
        }
    }

    Ok(())
}
