//! BundleForge CLI: recommend bundles, export pair features, train the success model

use anyhow::{Context, Result};
use bundleforge::cli::{Command, FeaturesArgs, OutputFormat, RecommendArgs, TrainArgs};
use bundleforge::data::{candidates_to_frame, write_csv};
use bundleforge::model::describe_store;
use bundleforge::{
    create_bundle_score_chart, extract_candidates, load_csv, print_bundle_table,
    recommend_bundles, train_bundle_model, Args, EngineConfig, ModelStore,
};
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter(rust_log.as_deref()))
        .init();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Cannot load config from '{}'", path.display()))?,
        None => EngineConfig::default(),
    };

    match &args.command {
        Command::Recommend(recommend) => run_recommend(recommend, config),
        Command::Features(features) => run_features(features, &config),
        Command::Train(train) => run_train(train, &config),
    }
}

/// Rank bundles for a transaction file and print or plot them
fn run_recommend(args: &RecommendArgs, mut config: EngineConfig) -> Result<()> {
    let start_time = Instant::now();
    if let Some(policy) = args.confidence_policy {
        config.confidence_policy = policy;
    }
    let request = args.to_request()?;

    let transactions = load_csv(&args.transactions.input)
        .with_context(|| format!("Cannot read transactions from '{}'", args.transactions.input.display()))?;
    tracing::info!(rows = transactions.height(), "loaded transactions");

    let store = ModelStore::new(&args.model_dir);
    let store = if args.heuristic_only {
        None
    } else {
        tracing::debug!(model = %describe_store(&store), "model location");
        Some(&store)
    };

    let recommendations = recommend_bundles(&transactions, &request, store, &config)?;

    match args.format {
        OutputFormat::Table => print_bundle_table(&recommendations),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&recommendations)?),
    }

    if let Some(plot_path) = &args.plot {
        if recommendations.is_empty() {
            tracing::warn!("no bundles to plot, skipping chart");
        } else {
            create_bundle_score_chart(&recommendations, plot_path)?;
        }
    }

    tracing::info!(elapsed_s = start_time.elapsed().as_secs_f64(), "recommendation complete");
    Ok(())
}

/// Write the full pair feature table so it can be labelled for training
fn run_features(args: &FeaturesArgs, config: &EngineConfig) -> Result<()> {
    let transactions = load_csv(&args.transactions.input)
        .with_context(|| format!("Cannot read transactions from '{}'", args.transactions.input.display()))?;

    let candidates = extract_candidates(&transactions, &args.to_request(), config)?;
    let mut frame = candidates_to_frame(&candidates)?;
    write_csv(&mut frame, &args.output)?;

    println!("✓ Wrote {} bundle candidates to {}", candidates.len(), args.output.display());
    Ok(())
}

/// Fit and persist the bundle-success model
fn run_train(args: &TrainArgs, config: &EngineConfig) -> Result<()> {
    let historical = load_csv(&args.input)
        .with_context(|| format!("Cannot read historical bundles from '{}'", args.input.display()))?;

    let store = ModelStore::new(&args.model_dir);
    let path = train_bundle_model(&historical, &args.outcome_column, &store, &config.trainer)?;

    println!("✓ Bundle prediction model saved to {}", path.display());
    Ok(())
}
