use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use equitx::prelude::*;

/// Comparable-parcel discovery over a parcel fixture file
#[derive(Parser, Debug)]
#[command(name = "equitx")]
#[command(about = "Find equity comparables for a subject parcel", long_about = None)]
struct Args {
    /// Path to a JSON array of parcels
    #[arg(short, long, default_value = "./data/parcels.json")]
    parcels: PathBuf,

    /// Account number of the subject parcel
    #[arg(short, long)]
    subject: String,

    /// Optional engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relax the similarity bar for sparse neighborhoods
    #[arg(long)]
    min_similarity: Option<f32>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting equitx v{}", env!("CARGO_PKG_VERSION"));

    let raw = std::fs::read_to_string(&args.parcels)?;
    let parcels: Vec<Parcel> = serde_json::from_str(&raw)?;
    info!("Loaded {} parcels from {:?}", parcels.len(), args.parcels);

    let subject_id = ParcelId::new(args.subject.clone());
    let subject = parcels
        .iter()
        .find(|p| p.id == subject_id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("subject parcel {} not in fixture", args.subject))?;

    // Normalize and index. Parcels that cannot be normalized are excluded
    // rather than indexed with fabricated values.
    let scheme = FeatureScheme::v1();
    let mut records = Vec::with_capacity(parcels.len());
    let mut excluded = 0usize;
    for parcel in &parcels {
        match scheme.normalize(parcel) {
            Ok(vector) => records.push(IndexRecord::from_parcel(parcel, vector)),
            Err(err) => {
                warn!(parcel = %parcel.id, %err, "excluding parcel from index");
                excluded += 1;
            }
        }
    }
    info!("Indexing {} parcels ({} excluded)", records.len(), excluded);

    let index = Arc::new(ParcelIndex::build(IndexConfig::default(), records)?);

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    // Without real credentials the demo runs against fixture providers; a
    // deployment registers its own adapters per capability.
    let mut engine = DiscoveryEngine::new(index, config);
    for capability in Capability::ALL {
        engine = engine.with_chain(ProviderChain::new(
            capability,
            vec![(
                ProviderConfig::new("fixture", 10),
                Arc::new(FixtureProvider::demo("fixture")) as Arc<dyn Provider>,
            )],
        ));
    }

    let options = DiscoveryOptions {
        min_similarity: args.min_similarity,
        ..DiscoveryOptions::default()
    };
    let result = engine.discover_with(&subject, options).await?;

    if !result.comparables.is_sufficient() {
        warn!(
            "comparable set is insufficient ({} found); retry with --min-similarity",
            result.comparables.comparables.len()
        );
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
